//! Login, registration, and third-party identity credentials.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Email/password pair submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl LoginCredentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}

	/// Rejects blank fields before any request is sent.
	pub fn validate(&self) -> Result<()> {
		require("email", &self.email)?;
		require("password", &self.password)
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// New account submitted to the registration endpoint.
#[derive(Clone, Serialize)]
pub struct Registration {
	/// Desired username.
	pub username: String,
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl Registration {
	/// Creates a registration payload.
	pub fn new(
		username: impl Into<String>,
		email: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self { username: username.into(), email: email.into(), password: password.into() }
	}

	/// Rejects blank fields before any request is sent.
	pub fn validate(&self) -> Result<()> {
		require("username", &self.username)?;
		require("email", &self.email)?;
		require("password", &self.password)
	}
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("username", &self.username)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Opaque credential produced by a third-party identity provider (e.g. a Google ID token).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityCredential(pub TokenSecret);
impl IdentityCredential {
	/// Wraps the provider-issued credential.
	pub fn new(value: impl Into<TokenSecret>) -> Self {
		Self(value.into())
	}

	pub(crate) fn body(&self) -> serde_json::Value {
		serde_json::json!({ "token": self.0.expose() })
	}
}

fn require(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		Err(Error::InvalidInput { reason: format!("{field} is required") })
	} else {
		Ok(())
	}
}
