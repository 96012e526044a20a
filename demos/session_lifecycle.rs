//! Walks a CookNet session through bootstrap, login, a guarded navigation, and logout against a
//! mocked backend using the default reqwest transport and the in-memory token store.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use cooknet_session::{
	auth::LoginCredentials,
	client::ApiClient,
	descriptor::ApiDescriptor,
	guard::RouteGuard,
	notify::NotificationHub,
	session::Session,
	store::TokenStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/login");
			then.status(200).json_body(json!({
				"access_token": "demo-access",
				"refresh_token": "demo-refresh",
				"token_type": "bearer",
				"user": { "id": 7, "username": "chef" },
			}));
		})
		.await;
	let descriptor = ApiDescriptor::from_backend_url(&server.base_url())?;
	let client = ApiClient::new(descriptor, TokenStore::in_memory());
	let hub = Arc::new(NotificationHub::default());
	let _toasts = hub.subscribe(|notification| {
		println!("[{:?}] {}: {}", notification.kind, notification.title, notification.message);
	});
	let session = Session::new(client, hub.clone());
	let guard = RouteGuard::default();
	let state = session.bootstrap().await;

	println!("After bootstrap: {:?}, /feed -> {:?}.", state.phase, guard.evaluate(&state, "/feed"));

	session.login(&LoginCredentials::new("chef@cooknet.test", "hunter22")).await?;

	let state = session.state();

	println!("After login: {:?}, /login -> {:?}.", state.phase, guard.evaluate(&state, "/login"));

	session.logout()?;

	let state = session.state();

	println!("After logout: {:?}, /settings -> {:?}.", state.phase, guard.evaluate(&state, "/settings"));

	login_mock.assert_async().await;

	Ok(())
}
