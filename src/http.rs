//! Transport primitives for CookNet API calls.
//!
//! [`ApiHttpClient`] is the crate's only dependency on an HTTP stack. The default
//! [`ReqwestHttpClient`] covers production use; tests and embedders can provide their own
//! implementation and hand it to [`ApiClient::with_http_client`](crate::client::ApiClient).

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Boxed future returned by [`ApiHttpClient::execute`].
pub type TransportFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpReply, E>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing fully prepared API calls.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// API client and the refresh coordinator, and the returned futures must be `Send` so session
/// flows can hop executors. Any HTTP status, including `401`, is a successful transport outcome;
/// only failures to obtain a response are reported as `TransportError`.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `call` and resolves with the raw reply.
	fn execute(&self, call: HttpCall) -> TransportFuture<'_, Self::TransportError>;
}

/// HTTP methods used by the CookNet API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
#[cfg(feature = "reqwest")]
impl From<Method> for reqwest::Method {
	fn from(method: Method) -> Self {
		match method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}

/// Fully resolved outbound call handed to the transport.
#[derive(Clone)]
pub struct HttpCall {
	/// Request method.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Header name/value pairs; names are lowercase.
	pub headers: BTreeMap<String, String>,
	/// Serialized request body.
	pub body: Option<Vec<u8>>,
}
impl HttpCall {
	/// Returns a header value by (lowercase) name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).map(String::as_str)
	}

	/// Returns the bearer credential carried by the call, if any.
	pub fn bearer(&self) -> Option<&str> {
		self.header("authorization").and_then(|value| value.strip_prefix("Bearer "))
	}
}
impl Debug for HttpCall {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpCall")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("authorized", &self.headers.contains_key("authorization"))
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.finish()
	}
}

/// Raw reply returned by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Builds a reply with a JSON body.
	pub fn json(status: u16, body: &serde_json::Value) -> Self {
		Self { status, retry_after: None, body: body.to_string().into_bytes() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, call: HttpCall) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut request = client.request(call.method.into(), call.url);

			for (name, value) in &call.headers {
				request = request.header(name.as_str(), value.as_str());
			}
			if let Some(body) = call.body {
				request = request.body(body);
			}

			let response = request.send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(HttpReply { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn call_debug_hides_credentials() {
		let mut headers = BTreeMap::new();

		headers.insert("authorization".to_string(), "Bearer A1".to_string());

		let call = HttpCall {
			method: Method::Get,
			url: Url::parse("http://localhost/api/users/me").expect("URL should parse."),
			headers,
			body: None,
		};

		assert_eq!(call.bearer(), Some("A1"));
		assert!(!format!("{call:?}").contains("A1"));
	}

	#[test]
	fn reply_success_range() {
		assert!(HttpReply::json(200, &serde_json::json!({})).is_success());
		assert!(HttpReply { status: 204, ..Default::default() }.is_success());
		assert!(!HttpReply { status: 401, ..Default::default() }.is_success());
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, "120".parse().expect("Header value should parse."));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(120)));

		headers.insert(
			RETRY_AFTER,
			"Wed, 21 Oct 2015 07:28:00 GMT".parse().expect("Header value should parse."),
		);

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, "soon".parse().expect("Header value should parse."));

		assert_eq!(parse_retry_after(&headers), None);
	}
}
