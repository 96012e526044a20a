#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use common::*;
use cooknet_session::{
	auth::{TokenPair, UserProfile},
	error::Error,
	http::HttpReply,
	store::TokenStore,
};

async fn mock_refresh<'a>(server: &'a MockServer, refresh: &str, access: &str, rotated: &str) -> httpmock::Mock<'a> {
	let bearer = format!("Bearer {refresh}");
	let body = json!({ "access_token": access, "refresh_token": rotated, "token_type": "bearer" });

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/users/refresh")
				.header("authorization", bearer)
				.json_body(json!({}));
			then.status(200).json_body(body);
		})
		.await
}

async fn mock_me<'a>(server: &'a MockServer, access: &str, status: u16) -> httpmock::Mock<'a> {
	let bearer = format!("Bearer {access}");
	let body = if status == 200 {
		json!({ "id": 1, "username": "alice" })
	} else {
		json!({ "detail": "Could not validate credentials" })
	};

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header("authorization", bearer);
			then.status(status).json_body(body);
		})
		.await
}

#[tokio::test]
async fn unauthorized_request_is_refreshed_and_retried() {
	let server = MockServer::start_async().await;
	let expired = mock_me(&server, "A1", 401).await;
	let renewed = mock_me(&server, "A2", 200).await;
	let refresh = mock_refresh(&server, "R1", "A2", "R2").await;
	let client = mock_client(&server, seeded_tokens("A1", "R1"));
	let user: UserProfile = client.me().await.expect("The retried request should succeed.");

	assert_eq!(user.username(), Some("alice"));
	assert_eq!(
		client.tokens().read().expect("Store should be readable."),
		Some(TokenPair::new("A2", "R2")),
	);
	assert_eq!(client.refresh_metrics().rotations(), 1);

	expired.assert_async().await;
	renewed.assert_async().await;
	refresh.assert_async().await;
}

#[tokio::test]
async fn retried_request_is_not_retried_twice() {
	let server = MockServer::start_async().await;
	let first = mock_me(&server, "A1", 401).await;
	let second = mock_me(&server, "A2", 401).await;
	let refresh = mock_refresh(&server, "R1", "A2", "R2").await;
	let client = mock_client(&server, seeded_tokens("A1", "R1"));
	let err = client.me().await.expect_err("A second 401 should propagate.");

	assert!(matches!(err, Error::Api(ref api) if api.is_unauthorized()));

	first.assert_async().await;
	second.assert_async().await;
	refresh.assert_async().await;
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh() {
	let (client, fake) = fake_client(
		seeded_tokens("A1", "R1"),
		FakeBackend::new(|call| match (call.url.path(), call.bearer()) {
			("/api/users/me", Some("A1")) =>
				HttpReply::json(401, &json!({ "detail": "Could not validate credentials" })),
			("/api/users/me", Some("A2")) => HttpReply::json(200, &json!({ "id": 1 })),
			("/api/users/refresh", Some("R1")) => HttpReply::json(
				200,
				&json!({ "access_token": "A2", "refresh_token": "R2", "token_type": "bearer" }),
			),
			_ => HttpReply::json(404, &json!({ "detail": "Not Found" })),
		})
		.gate_only("/api/users/refresh"),
	);
	let gate = fake.gate();
	let held = gate.lock().await;
	let rejected_with = |fake: &FakeBackend, access: &str| {
		fake.calls()
			.iter()
			.filter(|call| call.url.path() == "/api/users/me" && call.bearer() == Some(access))
			.count()
	};
	let fake_ref = &fake;
	let (first, second, third, ()) =
		tokio::join!(client.me(), client.me(), client.me(), async move {
			while rejected_with(fake_ref, "A1") < 3 {
				tokio::task::yield_now().await;
			}

			drop(held);
		});

	for result in [first, second, third] {
		let user = result.expect("Every concurrent request should succeed after the refresh.");

		assert_eq!(user.id().as_deref(), Some("1"));
	}

	assert_eq!(fake.calls_to("/api/users/refresh"), 1);
	assert_eq!(rejected_with(&fake, "A1"), 3);
	assert_eq!(rejected_with(&fake, "A2"), 3);
	assert_eq!(client.refresh_metrics().attempts(), 3);
	assert_eq!(client.refresh_metrics().rotations(), 1);
	assert_eq!(client.refresh_metrics().coalesced(), 2);
}

#[tokio::test]
async fn rejected_refresh_clears_store_and_expires_session() {
	let server = MockServer::start_async().await;
	let expired = mock_me(&server, "A1", 401).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/refresh");
			then.status(401).json_body(json!({ "detail": "Invalid refresh token" }));
		})
		.await;
	let client = mock_client(&server, seeded_tokens("A1", "R1"));
	let err = client.me().await.expect_err("A rejected refresh should end the session.");

	match &err {
		Error::SessionExpired { detail, source } => {
			assert_eq!(
				detail.as_ref().and_then(|detail| detail.display_message()),
				Some("Could not validate credentials"),
			);
			assert!(matches!(**source, Error::RefreshFailed { status: Some(401), .. }));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(err.is_session_fatal());
	assert_eq!(client.tokens().read().expect("Store should be readable."), None);
	assert_eq!(client.tokens().refresh_token().expect("Store should be readable."), None);
	assert_eq!(client.refresh_metrics().failures(), 1);

	expired.assert_async().await;
	refresh.assert_async().await;
}

#[tokio::test]
async fn forced_refresh_rotates_without_a_rejection() {
	let server = MockServer::start_async().await;
	let refresh = mock_refresh(&server, "R1", "A2", "R2").await;
	let client = mock_client(&server, seeded_tokens("A1", "R1"));
	let pair = client
		.refresher()
		.refresh(cooknet_session::refresh::RefreshRequest::default().force_refresh())
		.await
		.expect("Forced refresh should rotate.");

	assert_eq!(pair, TokenPair::new("A2", "R2"));

	refresh.assert_async().await;

	let empty = mock_client(&server, TokenStore::in_memory());
	let err = empty
		.refresher()
		.refresh(Default::default())
		.await
		.expect_err("Refreshing without a refresh token should fail.");

	assert!(matches!(err, Error::NoRefreshToken));

	refresh.assert_calls_async(1).await;
}
