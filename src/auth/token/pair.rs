//! Access/refresh token pairs and the grant payload that carries them.

// self
use crate::{
	_prelude::*,
	auth::{UserProfile, token::secret::TokenSecret},
};

/// Access/refresh credentials issued together by the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Short-lived bearer credential authorizing API requests.
	pub access: TokenSecret,
	/// Longer-lived credential used solely to obtain a new pair.
	pub refresh: TokenSecret,
}
impl TokenPair {
	/// Builds a pair from raw token strings.
	pub fn new(access: impl Into<TokenSecret>, refresh: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: refresh.into() }
	}

	/// Returns `true` when both halves carry a value.
	pub fn is_usable(&self) -> bool {
		!self.access.is_blank() && !self.refresh.is_blank()
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access", &self.access.fingerprint())
			.field("refresh", &self.refresh.fingerprint())
			.finish()
	}
}

/// Token payload returned by the login, identity-login, and refresh endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Newly issued refresh token.
	pub refresh_token: TokenSecret,
	/// Token type label (`bearer`).
	#[serde(default)]
	pub token_type: Option<String>,
	/// Profile of the authenticated user, when the endpoint includes it.
	#[serde(default)]
	pub user: Option<UserProfile>,
}
impl TokenGrant {
	/// Splits the grant into the credential pair and the optional profile.
	pub fn into_parts(self) -> (TokenPair, Option<UserProfile>) {
		(TokenPair { access: self.access_token, refresh: self.refresh_token }, self.user)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grant_decodes_login_payload() {
		let grant: TokenGrant = serde_json::from_str(
			r#"{"access_token":"A1","refresh_token":"R1","token_type":"bearer","user":{"id":1,"username":"alice"}}"#,
		)
		.expect("Login payload should decode.");
		let (pair, user) = grant.into_parts();

		assert_eq!(pair, TokenPair::new("A1", "R1"));
		assert_eq!(user.and_then(|user| user.username().map(ToOwned::to_owned)), Some("alice".into()));
	}

	#[test]
	fn grant_decodes_refresh_payload_without_user() {
		let grant: TokenGrant =
			serde_json::from_str(r#"{"access_token":"A2","refresh_token":"R2"}"#)
				.expect("Refresh payload should decode.");

		assert!(grant.user.is_none());
		assert!(grant.into_parts().0.is_usable());
	}

	#[test]
	fn pair_debug_never_prints_secrets() {
		let rendered = format!("{:?}", TokenPair::new("access-value", "refresh-value"));

		assert!(!rendered.contains("access-value"));
		assert!(!rendered.contains("refresh-value"));
	}
}
