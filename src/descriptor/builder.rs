// self
use crate::{
	_prelude::*,
	descriptor::{ApiDescriptor, ApiEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ApiDescriptorError {
	/// Base URL could not be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL must use HTTP or HTTPS.
	#[error("The base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry relative paths (e.g. `mailto:`).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL must not carry a query or fragment.
	#[error("The base URL must not carry a query or fragment: {url}.")]
	DecoratedBase {
		/// URL that failed validation.
		url: String,
	},
	/// Endpoint paths must be absolute (start with `/`).
	#[error("The {endpoint} endpoint path must start with `/`: {path:?}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
	},
}

/// Builder for [`ApiDescriptor`] values.
#[derive(Debug)]
pub struct ApiDescriptorBuilder {
	/// Base URL the endpoints are joined onto.
	pub base_url: Url,
	/// Endpoint paths.
	pub endpoints: ApiEndpoints,
}
impl ApiDescriptorBuilder {
	/// Creates a new builder seeded with the provided base URL and default CookNet paths.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, endpoints: ApiEndpoints::default() }
	}

	/// Overrides the login path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Overrides the identity-login path.
	pub fn identity_login_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.identity_login = path.into();

		self
	}

	/// Overrides the registration path.
	pub fn register_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.register = path.into();

		self
	}

	/// Overrides the refresh path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the current-user path.
	pub fn me_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.me = path.into();

		self
	}

	/// Overrides the email verification path.
	pub fn verify_email_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.verify_email = path.into();

		self
	}

	/// Overrides the feed path.
	pub fn feed_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.feed = path.into();

		self
	}

	/// Overrides the post collection path.
	pub fn posts_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.posts = path.into();

		self
	}

	/// Replaces every endpoint path at once.
	pub fn endpoints(mut self, endpoints: ApiEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, ApiDescriptorError> {
		let mut base_url = self.base_url;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ApiDescriptorError::UnsupportedScheme { url: base_url.to_string() });
		}
		if base_url.cannot_be_a_base() {
			return Err(ApiDescriptorError::CannotBeABase { url: base_url.to_string() });
		}
		if base_url.query().is_some() || base_url.fragment().is_some() {
			return Err(ApiDescriptorError::DecoratedBase { url: base_url.to_string() });
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let descriptor = ApiDescriptor { base_url, endpoints: self.endpoints };

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ApiDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ApiDescriptorError> {
		let ApiEndpoints { login, identity_login, register, refresh, me, verify_email, feed, posts } =
			&self.endpoints;

		validate_endpoint("login", login)?;
		validate_endpoint("identity_login", identity_login)?;
		validate_endpoint("register", register)?;
		validate_endpoint("refresh", refresh)?;
		validate_endpoint("me", me)?;
		validate_endpoint("verify_email", verify_email)?;
		validate_endpoint("feed", feed)?;
		validate_endpoint("posts", posts)?;

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, path: &str) -> Result<(), ApiDescriptorError> {
	if path.starts_with('/') && !path.contains(['?', '#']) {
		Ok(())
	} else {
		Err(ApiDescriptorError::InvalidEndpoint { endpoint: name, path: path.to_owned() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn builder_normalizes_trailing_slash() {
		let descriptor = ApiDescriptor::builder(url("http://127.0.0.1:9000/api"))
			.build()
			.expect("Plain http base should be accepted.");

		assert_eq!(descriptor.base_url.as_str(), "http://127.0.0.1:9000/api/");
		assert_eq!(descriptor.endpoints, ApiEndpoints::default());
	}

	#[test]
	fn builder_rejects_bad_bases_and_paths() {
		assert!(matches!(
			ApiDescriptor::builder(url("ftp://example.com/api")).build(),
			Err(ApiDescriptorError::UnsupportedScheme { .. })
		));
		assert!(matches!(
			ApiDescriptor::builder(url("https://example.com/api?debug=1")).build(),
			Err(ApiDescriptorError::DecoratedBase { .. })
		));
		assert!(matches!(
			ApiDescriptor::builder(url("https://example.com/api"))
				.refresh_path("users/refresh")
				.build(),
			Err(ApiDescriptorError::InvalidEndpoint { endpoint: "refresh", .. })
		));
	}

	#[test]
	fn builder_overrides_paths() {
		let descriptor = ApiDescriptor::builder(url("https://example.com/api/"))
			.identity_login_path("/auth/google")
			.build()
			.expect("Overridden path should be accepted.");

		assert_eq!(
			descriptor
				.resolve(&descriptor.endpoints.identity_login)
				.expect("Path should resolve.")
				.as_str(),
			"https://example.com/api/auth/google",
		);
	}
}
