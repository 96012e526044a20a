#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use parking_lot::Mutex;
use serde_json::json;
// self
use common::*;
use cooknet_session::{
	auth::TokenPair,
	guard::{GuardDecision, RouteGuard},
	notify::NoopNotifier,
	session::{Session, SessionPhase},
};

#[tokio::test]
async fn bootstrap_recovers_from_expired_access_token() {
	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header("authorization", "Bearer A1");
			then.status(401).json_body(json!({ "detail": "Token expired" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/refresh").header("authorization", "Bearer R1");
			then.status(200).json_body(json!({ "access_token": "A2", "refresh_token": "R2" }));
		})
		.await;
	let renewed = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header("authorization", "Bearer A2");
			then.status(200).json_body(json!({ "id": 1, "username": "alice" }));
		})
		.await;
	let client = mock_client(&server, seeded_tokens("A1", "R1"));
	let session = Session::new(client.clone(), Arc::new(NoopNotifier));
	let phases = Arc::new(Mutex::new(Vec::new()));
	let sink = phases.clone();
	let _subscription = session.subscribe(move |state| sink.lock().push(state.phase));
	let state = session.bootstrap().await;

	assert_eq!(state.phase, SessionPhase::Authenticated);
	assert_eq!(state.user.as_ref().and_then(|user| user.username()), Some("alice"));
	assert_eq!(
		client.tokens().read().expect("Store should be readable."),
		Some(TokenPair::new("A2", "R2")),
	);
	assert_eq!(*phases.lock(), vec![SessionPhase::Checking, SessionPhase::Authenticated]);
	assert_eq!(
		RouteGuard::default().evaluate(&state, "/home"),
		GuardDecision::Render,
	);
	assert!(session.protected_client().is_ok());

	expired.assert_async().await;
	refresh.assert_async().await;
	renewed.assert_async().await;
}

#[tokio::test]
async fn bootstrap_with_rejected_refresh_ends_anonymous() {
	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me");
			then.status(401).json_body(json!({ "detail": "Token expired" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/refresh");
			then.status(401).json_body(json!({ "detail": "Invalid refresh token" }));
		})
		.await;
	let client = mock_client(&server, seeded_tokens("A1", "R1"));
	let session = Session::new(client.clone(), Arc::new(NoopNotifier));
	let state = session.bootstrap().await;

	assert_eq!(state.phase, SessionPhase::Anonymous);
	assert!(state.user.is_none());
	assert_eq!(client.tokens().read().expect("Store should be readable."), None);
	assert!(!client.tokens().is_partial().expect("Store should be readable."));
	assert_eq!(
		RouteGuard::default().evaluate(&state, "/home"),
		GuardDecision::Redirect { to: "/login".into() },
	);
	assert!(session.protected_client().is_err());

	expired.assert_async().await;
	refresh.assert_async().await;
}

#[tokio::test]
async fn bootstrap_runs_once() {
	let server = MockServer::start_async().await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me");
			then.status(200).json_body(json!({ "id": 1, "username": "alice" }));
		})
		.await;
	let session = Session::new(mock_client(&server, seeded_tokens("A1", "R1")), Arc::new(NoopNotifier));

	session.bootstrap().await;

	let again = session.bootstrap().await;

	assert!(again.is_authenticated());

	me.assert_calls_async(1).await;
}
