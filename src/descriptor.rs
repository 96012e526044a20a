//! API descriptor: the validated backend location and endpoint paths consumed by the client.

/// Builder API for assembling API descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Endpoint paths, relative to the descriptor's base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoints {
	/// Email/password login.
	pub login: String,
	/// Third-party identity login.
	pub identity_login: String,
	/// Account registration.
	pub register: String,
	/// Token rotation.
	pub refresh: String,
	/// Current user profile.
	pub me: String,
	/// Email verification.
	pub verify_email: String,
	/// Paginated feed.
	pub feed: String,
	/// Post collection root (`/posts/{id}`, `/posts/{id}/like`, ...).
	pub posts: String,
}
impl Default for ApiEndpoints {
	fn default() -> Self {
		Self {
			login: "/users/login".into(),
			identity_login: "/users/google".into(),
			register: "/users/register".into(),
			refresh: "/users/refresh".into(),
			me: "/users/me".into(),
			verify_email: "/users/verify-email".into(),
			feed: "/posts/feed".into(),
			posts: "/posts".into(),
		}
	}
}

/// Immutable backend descriptor consumed by the API client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Base URL every endpoint path is joined onto; always ends with `/`.
	pub base_url: Url,
	/// Endpoint definitions.
	pub endpoints: ApiEndpoints,
}
impl ApiDescriptor {
	/// Environment variable naming the backend origin.
	pub const BACKEND_URL_ENV: &'static str = "BACKEND_API_URL";
	/// Backend origin used when the environment does not provide one.
	pub const DEFAULT_BACKEND_URL: &'static str = "http://localhost:8000";
	/// Path prefix under which the backend mounts its API.
	pub const API_PREFIX: &'static str = "api";

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(base_url)
	}

	/// Builds a descriptor for a backend origin, mounting the API under `/api`.
	pub fn from_backend_url(origin: &str) -> Result<Self, ApiDescriptorError> {
		let trimmed = origin.trim().trim_end_matches('/');
		let base = Url::parse(&format!("{trimmed}/{}/", Self::API_PREFIX))
			.map_err(|source| ApiDescriptorError::InvalidBaseUrl { source })?;

		Self::builder(base).build()
	}

	/// Reads the backend origin from `BACKEND_API_URL`, defaulting to the local backend.
	pub fn from_env() -> Result<Self, ApiDescriptorError> {
		let origin = std::env::var(Self::BACKEND_URL_ENV)
			.ok()
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| Self::DEFAULT_BACKEND_URL.into());

		Self::from_backend_url(&origin)
	}

	/// Resolves an endpoint path against the base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn backend_origin_gets_api_prefix() {
		let descriptor = ApiDescriptor::from_backend_url("http://localhost:8000/")
			.expect("Local backend origin should be accepted.");

		assert_eq!(descriptor.base_url.as_str(), "http://localhost:8000/api/");
		assert_eq!(
			descriptor.resolve(&descriptor.endpoints.me).expect("Path should resolve.").as_str(),
			"http://localhost:8000/api/users/me",
		);
	}

	#[test]
	fn nested_origin_keeps_its_path() {
		let descriptor = ApiDescriptor::from_backend_url("https://cooknet.example/backend")
			.expect("Nested origin should be accepted.");

		assert_eq!(
			descriptor.resolve("/posts/feed").expect("Path should resolve.").as_str(),
			"https://cooknet.example/backend/api/posts/feed",
		);
	}

	#[test]
	fn garbage_origin_is_rejected() {
		assert!(matches!(
			ApiDescriptor::from_backend_url("not a url"),
			Err(ApiDescriptorError::InvalidBaseUrl { .. })
		));
	}
}
