//! Session-level error types shared across the client, refresh coordinator, stores, and session.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Display text used for server-side failures, regardless of the detail the backend sent.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An Unexpected Error Occurred. Please try again later.";

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Backend answered with a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),

	/// No refresh token is stored; the session must log in again.
	#[error("No refresh token is available.")]
	NoRefreshToken,
	/// The refresh endpoint rejected or failed the rotation; stored credentials were cleared.
	#[error("Token refresh failed.")]
	RefreshFailed {
		/// HTTP status returned by the refresh endpoint, when one was received.
		status: Option<u16>,
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
	/// The stored credentials changed while a refresh was in flight; the rotated pair was
	/// discarded.
	#[error("Stored credentials changed while the refresh was in flight.")]
	CredentialsReplaced {
		/// What the conditional write found in the store.
		outcome: crate::store::CompareAndSwapOutcome,
	},
	/// A session request was rejected with `401` and the credentials could not be renewed.
	#[error("Session expired and could not be renewed.")]
	SessionExpired {
		/// Detail attached to the original `401` response.
		detail: Option<ErrorDetail>,
		/// Refresh failure that ended the session.
		#[source]
		source: Box<Error>,
	},
	/// An authenticated client was requested while the session is loading or anonymous.
	#[error("Session is not authenticated.")]
	Unauthenticated,
	/// Input was rejected locally before any request was sent.
	#[error("Invalid input: {reason}.")]
	InvalidInput {
		/// Human-readable reason.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the error ends the session (credentials are gone or unusable).
	///
	/// A refresh superseded by a logout or a newer login is not fatal; the newer state stands.
	pub fn is_session_fatal(&self) -> bool {
		if self.is_superseded() {
			return false;
		}

		match self {
			Self::NoRefreshToken | Self::RefreshFailed { .. } | Self::SessionExpired { .. } => true,
			Self::Api(err) => err.status == 401,
			_ => false,
		}
	}

	/// Returns `true` when a refresh was abandoned because newer credentials replaced the ones it
	/// rotated.
	pub fn is_superseded(&self) -> bool {
		match self {
			Self::CredentialsReplaced { .. } => true,
			Self::RefreshFailed { source, .. } | Self::SessionExpired { source, .. } =>
				source.is_superseded(),
			_ => false,
		}
	}

	/// Returns the HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(err) => Some(err.status),
			Self::Decode(err) => Some(err.status),
			Self::RefreshFailed { status, .. } => *status,
			Self::SessionExpired { .. } => Some(401),
			_ => None,
		}
	}

	/// Returns the structured detail sent by the backend, if any.
	pub fn detail(&self) -> Option<&ErrorDetail> {
		match self {
			Self::Api(err) => err.detail.as_ref(),
			Self::SessionExpired { detail, .. } => detail.as_ref(),
			_ => None,
		}
	}

	/// Resolves the text shown to the user.
	///
	/// Server errors collapse to [`UNEXPECTED_ERROR_MESSAGE`], client errors show the first
	/// backend-provided message, and everything else falls back to `fallback`.
	pub fn user_message(&self, fallback: &str) -> String {
		match self {
			Self::Api(err) if err.status >= 500 => UNEXPECTED_ERROR_MESSAGE.into(),
			Self::InvalidInput { reason } => reason.clone(),
			_ => self
				.detail()
				.and_then(ErrorDetail::display_message)
				.map(ToOwned::to_owned)
				.unwrap_or_else(|| fallback.to_owned()),
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint path cannot be joined onto the base URL.
	#[error("Endpoint `{path}` cannot be resolved against the base URL.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Response body did not match the expected JSON shape.
#[derive(Debug, ThisError)]
#[error("API returned malformed JSON (status {status}).")]
pub struct DecodeError {
	/// Structured parsing failure including the JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// HTTP status of the decoded response.
	pub status: u16,
}

/// Non-success response returned by the backend.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("API request failed with status {status}{}.", detail_suffix(.detail.as_ref()))]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Parsed `detail` payload, if the backend sent one.
	pub detail: Option<ErrorDetail>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl ApiError {
	/// Builds an error from a status code and the raw response body.
	pub fn from_body(status: u16, body: &[u8], retry_after: Option<Duration>) -> Self {
		Self { status, detail: ErrorDetail::parse(body), retry_after }
	}

	/// Returns `true` for authorization failures.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}
}

fn detail_suffix(detail: Option<&ErrorDetail>) -> String {
	detail.and_then(ErrorDetail::display_message).map(|msg| format!(": {msg}")).unwrap_or_default()
}

/// Backend `detail` payload, resolved once at the response boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
	/// Plain message (`{"detail": "Invalid email or password"}`).
	Message(String),
	/// Field validation errors (`{"detail": [{"msg": "..."}]}`).
	Validation(Vec<FieldMessage>),
}
impl ErrorDetail {
	/// Extracts the `detail` member from a JSON error body.
	pub fn parse(body: &[u8]) -> Option<Self> {
		#[derive(Deserialize)]
		struct Envelope {
			detail: Option<ErrorDetail>,
		}

		serde_json::from_slice::<Envelope>(body).ok().and_then(|envelope| envelope.detail)
	}

	/// Message to display: the plain message, or the first validation message.
	pub fn display_message(&self) -> Option<&str> {
		match self {
			Self::Message(message) if !message.trim().is_empty() => Some(message),
			Self::Message(_) => None,
			Self::Validation(fields) => fields.first().map(|field| field.msg.as_str()),
		}
	}
}

/// Single field validation message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMessage {
	/// Display message.
	pub msg: String,
	/// Location of the offending field, as reported by the backend.
	#[serde(default)]
	pub loc: Vec<serde_json::Value>,
	/// Machine-readable error type.
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
}
