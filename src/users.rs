//! Typed calls against the `/users` endpoints.

// self
use crate::{
	_prelude::*,
	auth::{IdentityCredential, LoginCredentials, Registration, TokenGrant, UserProfile},
	client::{ApiClient, ApiRequest},
	http::ApiHttpClient,
};

/// Free-form acknowledgement returned by registration and email verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(serde_json::Value);
impl Receipt {
	/// The `message` member, when the backend sent one.
	pub fn message(&self) -> Option<&str> {
		self.0.get("message").and_then(serde_json::Value::as_str)
	}

	/// Raw JSON payload.
	pub fn as_value(&self) -> &serde_json::Value {
		&self.0
	}
}

impl<C> ApiClient<C>
where
	C: ApiHttpClient,
{
	/// Exchanges email/password for a token grant.
	///
	/// The call is anonymous: a `401` here means bad credentials, not an expired session.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenGrant> {
		credentials.validate()?;

		let request = ApiRequest::post(self.descriptor().endpoints.login.as_str())
			.anonymous()
			.with_json(credentials)?;

		self.send_json(request).await
	}

	/// Exchanges a third-party identity credential for a token grant.
	pub async fn login_with_identity(&self, credential: &IdentityCredential) -> Result<TokenGrant> {
		if credential.0.is_blank() {
			return Err(Error::InvalidInput { reason: "identity token is required".into() });
		}

		let request = ApiRequest::post(self.descriptor().endpoints.identity_login.as_str())
			.anonymous()
			.json(credential.body());

		self.send_json(request).await
	}

	/// Creates an account. Registration never logs the user in.
	pub async fn register(&self, registration: &Registration) -> Result<Receipt> {
		registration.validate()?;

		let request = ApiRequest::post(self.descriptor().endpoints.register.as_str())
			.anonymous()
			.with_json(registration)?;

		self.send_json(request).await
	}

	/// Fetches the profile of the user owning the stored access token.
	pub async fn me(&self) -> Result<UserProfile> {
		self.get_json(&self.descriptor().endpoints.me).await
	}

	/// Confirms an email address with the token from the verification link.
	pub async fn verify_email(&self, token: &str) -> Result<Receipt> {
		let token = token.trim();

		if token.is_empty() {
			return Err(Error::InvalidInput { reason: "verification token is required".into() });
		}

		let request = ApiRequest::get(self.descriptor().endpoints.verify_email.as_str())
			.anonymous()
			.query("token", token);

		self.send_json(request).await
	}
}
