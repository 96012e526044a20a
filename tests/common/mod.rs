//! Shared fixtures for integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use async_lock::Mutex as AsyncMutex;
use parking_lot::Mutex;
// self
use cooknet_session::{
	auth::TokenPair,
	client::ApiClient,
	descriptor::ApiDescriptor,
	http::{ApiHttpClient, HttpCall, HttpReply, TransportFuture},
	store::TokenStore,
};

type Handler = Box<dyn Fn(&HttpCall) -> HttpReply + Send + Sync>;

/// In-process backend answering every call through a handler.
///
/// Replies are held back while the gate is locked, which lets tests interleave other session
/// operations with an in-flight request. [`FakeBackend::gate_only`] narrows the gate to one path.
pub struct FakeBackend {
	handler: Handler,
	calls: Mutex<Vec<HttpCall>>,
	gate: Arc<AsyncMutex<()>>,
	gated_path: Option<String>,
}
impl FakeBackend {
	pub fn new<F>(handler: F) -> Self
	where
		F: 'static + Fn(&HttpCall) -> HttpReply + Send + Sync,
	{
		Self {
			handler: Box::new(handler),
			calls: Mutex::default(),
			gate: Default::default(),
			gated_path: None,
		}
	}

	pub fn gate_only(mut self, path: &str) -> Self {
		self.gated_path = Some(path.into());

		self
	}

	pub fn calls(&self) -> Vec<HttpCall> {
		self.calls.lock().clone()
	}

	pub fn calls_to(&self, path: &str) -> usize {
		self.calls.lock().iter().filter(|call| call.url.path() == path).count()
	}

	pub fn gate(&self) -> Arc<AsyncMutex<()>> {
		self.gate.clone()
	}
}
impl ApiHttpClient for FakeBackend {
	type TransportError = std::io::Error;

	fn execute(&self, call: HttpCall) -> TransportFuture<'_, Self::TransportError> {
		let reply = (self.handler)(&call);
		let gate = match &self.gated_path {
			Some(path) if path != call.url.path() => None,
			_ => Some(self.gate.clone()),
		};

		self.calls.lock().push(call);

		Box::pin(async move {
			if let Some(gate) = gate {
				let _open = gate.lock().await;
			}

			Ok(reply)
		})
	}
}

pub fn fake_descriptor() -> ApiDescriptor {
	ApiDescriptor::from_backend_url("http://cooknet.test")
		.expect("Fake backend origin should be accepted.")
}

pub fn seeded_tokens(access: &str, refresh: &str) -> TokenStore {
	let tokens = TokenStore::in_memory();

	tokens.save(&TokenPair::new(access, refresh)).expect("Seeding the token store should succeed.");

	tokens
}

pub fn fake_client(
	tokens: TokenStore,
	backend: FakeBackend,
) -> (ApiClient<FakeBackend>, Arc<FakeBackend>) {
	let backend = Arc::new(backend);

	(ApiClient::with_http_client(fake_descriptor(), tokens, backend.clone()), backend)
}

#[cfg(feature = "reqwest")]
pub fn mock_client(
	server: &httpmock::MockServer,
	tokens: TokenStore,
) -> cooknet_session::client::ReqwestApiClient {
	let descriptor = ApiDescriptor::from_backend_url(&server.base_url())
		.expect("Mock server origin should be accepted.");

	ApiClient::new(descriptor, tokens)
}
