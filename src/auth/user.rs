//! Opaque user profile returned by the identity endpoint.

// self
use crate::_prelude::*;

/// Profile returned by `GET /users/me`.
///
/// Session logic never interprets the payload; the accessors exist for display code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(serde_json::Value);
impl UserProfile {
	/// Wraps a raw JSON profile.
	pub fn new(value: serde_json::Value) -> Self {
		Self(value)
	}

	/// Returns the raw JSON payload.
	pub fn as_value(&self) -> &serde_json::Value {
		&self.0
	}

	/// Looks up a top-level field.
	pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
		self.0.get(field)
	}

	/// Returns the `id` field rendered as a string (numeric or UUID ids alike).
	pub fn id(&self) -> Option<String> {
		match self.get("id")? {
			serde_json::Value::String(id) => Some(id.clone()),
			serde_json::Value::Number(id) => Some(id.to_string()),
			_ => None,
		}
	}

	/// Returns the `username` field.
	pub fn username(&self) -> Option<&str> {
		self.get("username").and_then(serde_json::Value::as_str)
	}
}
impl From<serde_json::Value> for UserProfile {
	fn from(value: serde_json::Value) -> Self {
		Self::new(value)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn accessors_tolerate_id_shapes() {
		let numeric = UserProfile::from(json!({ "id": 1, "username": "alice" }));
		let uuid = UserProfile::from(json!({ "id": "6f1c", "is_active": true }));

		assert_eq!(numeric.id().as_deref(), Some("1"));
		assert_eq!(numeric.username(), Some("alice"));
		assert_eq!(uuid.id().as_deref(), Some("6f1c"));
		assert_eq!(uuid.username(), None);
		assert_eq!(uuid.get("is_active"), Some(&json!(true)));
	}
}
