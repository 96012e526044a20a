//! Bearer-attaching API client with transparent refresh-and-retry on `401`.
//!
//! Every [`RequestAuth::Session`] request reads the access token from the [`TokenStore`] at send
//! time. When such a request is rejected with `401` the client asks the shared
//! [`RefreshCoordinator`] for a new pair and re-issues the original call exactly once; a second
//! rejection, or any other failure, propagates to the caller unchanged. A refresh that ends the
//! session is also broadcast to [`ApiClient::on_session_expired`] listeners.

mod multipart;

pub use multipart::{FilePart, MultipartForm};

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	descriptor::ApiDescriptor,
	error::{ApiError, ConfigError, DecodeError, TransportError},
	http::{ApiHttpClient, HttpCall, HttpReply, Method},
	notify::{Listeners, Subscription},
	obs::{self, FlowKind, FlowSpan},
	refresh::{RefreshCoordinator, RefreshMetrics, RefreshRequest},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// API client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient>;

/// Credential attached to an outbound request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestAuth {
	/// Stored access token as bearer; `401` responses trigger refresh-and-retry.
	#[default]
	Session,
	/// No credential and no interception (login, registration, email verification).
	Anonymous,
	/// Explicit bearer credential without interception (token rotation).
	Bearer(TokenSecret),
}

/// Payload carried by an [`ApiRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
	/// `application/json`
	Json(serde_json::Value),
	/// `multipart/form-data`
	Multipart(MultipartForm),
}

/// Outbound API call, retained until it resolves so it can be re-issued once after a refresh.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	headers: BTreeMap<String, String>,
	body: Option<RequestBody>,
	auth: RequestAuth,
	retried: bool,
}
impl ApiRequest {
	/// Creates a session request for `path` (relative to the descriptor's base URL).
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: BTreeMap::new(),
			body: None,
			auth: RequestAuth::Session,
			retried: false,
		}
	}

	/// `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query parameter.
	pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((name.into(), value.to_string()));

		self
	}

	/// Sets a raw JSON body.
	pub fn json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(RequestBody::Json(body));

		self
	}

	/// Sets a `multipart/form-data` body.
	pub fn multipart(mut self, form: MultipartForm) -> Self {
		self.body = Some(RequestBody::Multipart(form));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json<T>(self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body).map_err(ConfigError::RequestBody)?;

		Ok(self.json(value))
	}

	/// Adds a header; names are stored lowercase.
	pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Sends the request without any credential and without `401` interception.
	pub fn anonymous(mut self) -> Self {
		self.auth = RequestAuth::Anonymous;

		self
	}

	/// Sends the request with an explicit bearer credential and without `401` interception.
	pub fn bearer(mut self, secret: TokenSecret) -> Self {
		self.auth = RequestAuth::Bearer(secret);

		self
	}

	/// Request method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Endpoint path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Payload, if any.
	pub fn body(&self) -> Option<&RequestBody> {
		self.body.as_ref()
	}

	/// Credential mode.
	pub fn auth(&self) -> &RequestAuth {
		&self.auth
	}

	/// Returns `true` once the request has been re-issued after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	fn intercepts_unauthorized(&self) -> bool {
		self.auth == RequestAuth::Session && !self.retried
	}

	fn into_retry(mut self) -> Self {
		self.retried = true;

		self
	}

	/// Resolves the request into a transport call, returning the bearer credential it carries.
	fn prepare(
		&self,
		descriptor: &ApiDescriptor,
		tokens: &TokenStore,
	) -> Result<(HttpCall, Option<TokenSecret>)> {
		let mut url = descriptor.resolve(&self.path)?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		let presented = match &self.auth {
			RequestAuth::Session => tokens.access_token()?,
			RequestAuth::Anonymous => None,
			RequestAuth::Bearer(secret) => Some(secret.clone()),
		};
		let mut headers = self.headers.clone();

		headers.entry("accept".into()).or_insert_with(|| "application/json".into());

		if let Some(secret) = &presented {
			headers.insert("authorization".into(), secret.bearer_header());
		}

		let body = match &self.body {
			Some(RequestBody::Json(value)) => {
				headers
					.entry("content-type".into())
					.or_insert_with(|| "application/json".into());

				Some(serde_json::to_vec(value).map_err(ConfigError::RequestBody)?)
			},
			Some(RequestBody::Multipart(form)) => {
				let (content_type, bytes) = form.encode();

				headers.insert("content-type".into(), content_type);

				Some(bytes)
			},
			None => None,
		};

		Ok((HttpCall { method: self.method, url, headers, body }, presented))
	}
}

/// Successful (2xx) API response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Converts a transport reply, mapping non-2xx statuses to [`ApiError`].
	pub fn from_reply(reply: HttpReply) -> Result<Self> {
		if reply.is_success() {
			Ok(Self { status: reply.status, body: reply.body })
		} else {
			Err(ApiError::from_body(reply.status, &reply.body, reply.retry_after).into())
		}
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| DecodeError { source, status: self.status }.into())
	}
}

/// HTTP client bound to one backend and one token store.
pub struct ApiClient<C>
where
	C: ApiHttpClient,
{
	http_client: Arc<C>,
	descriptor: Arc<ApiDescriptor>,
	tokens: TokenStore,
	refresher: Arc<RefreshCoordinator<C>>,
	expirations: Listeners<Error>,
}
impl<C> ApiClient<C>
where
	C: ApiHttpClient,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_http_client(
		descriptor: ApiDescriptor,
		tokens: TokenStore,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		let http_client = http_client.into();
		let descriptor = Arc::new(descriptor);
		let refresher = Arc::new(RefreshCoordinator::new(
			http_client.clone(),
			descriptor.clone(),
			tokens.clone(),
		));

		Self { http_client, descriptor, tokens, refresher, expirations: Listeners::default() }
	}

	/// Backend descriptor in use.
	pub fn descriptor(&self) -> &ApiDescriptor {
		&self.descriptor
	}

	/// Token store the client reads credentials from.
	pub fn tokens(&self) -> &TokenStore {
		&self.tokens
	}

	/// Refresh coordinator shared by every clone of this client.
	pub fn refresher(&self) -> &RefreshCoordinator<C> {
		&self.refresher
	}

	/// Counters for refresh attempts.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.refresher.metrics()
	}

	/// Registers `listener` for session-ending refresh failures seen by this client or any clone.
	///
	/// The listener receives the [`Error::SessionExpired`] returned to the caller. Refreshes
	/// superseded by a logout or a newer login are not reported.
	pub fn on_session_expired<F>(&self, listener: F) -> Subscription
	where
		F: 'static + Fn(&Error) + Send + Sync,
	{
		self.expirations.subscribe(listener)
	}

	/// Sends `request`, refreshing and retrying once when a session request is rejected.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		FlowSpan::start(FlowKind::Request, "send").run(self.send_intercepted(request)).await
	}

	/// Sends `request` and decodes the JSON body.
	pub async fn send_json<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send(request).await?.json()
	}

	/// Issues a session `GET` and decodes the JSON body.
	pub async fn get_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send_json(ApiRequest::get(path)).await
	}

	async fn send_intercepted(&self, request: ApiRequest) -> Result<ApiResponse> {
		let (reply, presented) =
			execute(self.http_client.as_ref(), &self.descriptor, &self.tokens, &request).await?;

		if reply.status != 401 || !request.intercepts_unauthorized() {
			return ApiResponse::from_reply(reply);
		}

		let rejected = ApiError::from_body(reply.status, &reply.body, reply.retry_after);

		obs::flow_debug(
			FlowKind::Request,
			"Session request rejected; refreshing credentials.",
			presented.as_ref().map(TokenSecret::fingerprint).as_deref(),
		);

		match self.refresher.refresh(RefreshRequest::after_rejection(presented)).await {
			Ok(_) => {
				let retry = request.into_retry();
				let (reply, _) =
					execute(self.http_client.as_ref(), &self.descriptor, &self.tokens, &retry)
						.await?;

				ApiResponse::from_reply(reply)
			},
			Err(source) => {
				let expired =
					Error::SessionExpired { detail: rejected.detail, source: Box::new(source) };

				if expired.is_session_fatal() {
					self.expirations.emit(&expired);
				}

				Err(expired)
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient> {
	/// Creates a client that provisions its own reqwest transport.
	pub fn new(descriptor: ApiDescriptor, tokens: TokenStore) -> Self {
		Self::with_http_client(descriptor, tokens, ReqwestHttpClient::default())
	}
}
impl<C> Clone for ApiClient<C>
where
	C: ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			descriptor: self.descriptor.clone(),
			tokens: self.tokens.clone(),
			refresher: self.refresher.clone(),
			expirations: self.expirations.clone(),
		}
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.descriptor.base_url.as_str())
			.field("tokens", &self.tokens)
			.finish()
	}
}

/// Resolves and dispatches a single request without interception.
pub(crate) async fn execute<C>(
	http_client: &C,
	descriptor: &ApiDescriptor,
	tokens: &TokenStore,
	request: &ApiRequest,
) -> Result<(HttpReply, Option<TokenSecret>)>
where
	C: ApiHttpClient,
{
	let (call, presented) = request.prepare(descriptor, tokens)?;
	let reply = http_client.execute(call).await.map_err(TransportError::network)?;

	Ok((reply, presented))
}
