mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use httpmock::prelude::*;
// self
use common::*;
use graph_broker::{
	auth::IdentityMode,
	cache::CacheState,
	error::{AuthError, ConfigError, Error, TransientError},
	flows::Broker,
	provider::AzureAdStrategy,
	url::form_urlencoded,
};

const APP: IdentityMode = IdentityMode::Application;

#[tokio::test]
async fn application_token_is_acquired_once_and_cached() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let resource = resource_param(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(APP_TOKEN_PATH)
				.body_includes("grant_type=client_credentials")
				.body_includes("client_id=app-client")
				.body_includes("client_secret=app-secret")
				.body_includes(&resource);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"abc123"}"#);
		})
		.await;

	assert_eq!(broker.cache_state(APP), CacheState::Empty);

	let first = broker.token(APP).await.expect("First acquisition should succeed.");
	let second = broker.token(APP).await.expect("Second call should be served from cache.");

	assert_eq!(first.expose(), "abc123");
	assert_eq!(second.expose(), "abc123");
	assert_eq!(first, second);
	assert_eq!(broker.cache_state(APP), CacheState::Cached);
	assert_eq!(broker.cache_state(IdentityMode::DelegatedUser), CacheState::Empty);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unauthorized_response_is_an_auth_failure_and_not_cached() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(401).body("Unauthorized");
		})
		.await;
	let err = broker.token(APP).await.expect_err("HTTP 401 should fail the acquisition.");

	assert!(matches!(err, Error::Auth(AuthError::InvalidClient { mode: APP, .. })));
	assert!(broker.cached(APP).is_none());
	assert_eq!(broker.cache_state(APP), CacheState::Empty);

	let err = broker.token(APP).await.expect_err("The retry should hit the provider again.");

	assert!(err.is_acquisition_failure());

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn failed_acquisition_is_retried_until_it_succeeds() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(
				r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#,
			);
		})
		.await;
	let err = broker.token(APP).await.expect_err("Rejected secret should fail.");

	assert!(matches!(
		err,
		Error::Auth(AuthError::InvalidClient { ref reason, .. }) if reason.contains("AADSTS7000215")
	));

	rejected.assert_calls_async(1).await;
	rejected.delete_async().await;

	let accepted = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"second-try","token_type":"Bearer","expires_in":"3599"}"#);
		})
		.await;
	let token = broker.token(APP).await.expect("The next call should acquire again.");

	assert_eq!(token.expose(), "second-try");
	assert!(token.expires_at.is_some());

	accepted.assert_calls_async(1).await;
}

#[tokio::test]
async fn blank_secret_is_a_configuration_error_without_network_calls() {
	for secret in [None, Some(""), Some("   ")] {
		let server = MockServer::start_async().await;
		let (broker, http_client) = counting_broker(config(&server, secret));
		let err = broker.token(APP).await.expect_err("Missing secret should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingClientSecret)));
		assert!(!err.is_retryable());
		assert_eq!(http_client.calls(), 0);
		assert_eq!(broker.cache_state(APP), CacheState::Empty);
	}
}

#[tokio::test]
async fn transport_failures_surface_as_retryable_auth_failures() {
	let server = MockServer::start_async().await;
	let (broker, http_client) = counting_broker(config(&server, Some(APP_CLIENT_SECRET)));
	let err = broker.token(APP).await.expect_err("Offline transport should fail.");

	assert!(matches!(err, Error::Auth(AuthError::Transport(_))));
	assert!(err.is_retryable());

	let _ = broker.token(APP).await;

	assert_eq!(http_client.calls(), 2);
}

#[tokio::test]
async fn consent_and_parse_failures_are_classified() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let consent = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(400).header("content-type", "application/json").body(
				r#"{"error":"invalid_grant","error_description":"AADSTS65001: The user or administrator has not consented to use the application."}"#,
			);
		})
		.await;
	let err = broker.token(APP).await.expect_err("Missing consent should fail.");

	assert!(matches!(err, Error::Auth(AuthError::ConsentRequired { .. })));

	consent.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(r#"{"token_type":1}"#);
		})
		.await;

	let err = broker.token(APP).await.expect_err("Malformed JSON should fail.");

	assert!(matches!(
		err,
		Error::Auth(AuthError::Transient(TransientError::TokenResponseParse { .. }))
	));
	assert!(err.is_retryable());
}

#[tokio::test]
async fn concurrent_first_use_shares_one_acquisition() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let clone = broker.clone();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200)
				.delay(StdDuration::from_millis(200))
				.header("content-type", "application/json")
				.body(r#"{"access_token":"shared"}"#);
		})
		.await;
	let (first, second, third) =
		tokio::join!(broker.token(APP), broker.token(APP), clone.token(APP));

	for token in [first, second, third] {
		assert_eq!(token.expect("Every caller should receive the token.").expose(), "shared");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn brokers_sharing_a_cache_share_tokens() {
	let server = MockServer::start_async().await;
	let first = broker(&server);
	let second =
		Broker::new(config(&server, Some(APP_CLIENT_SECRET))).with_cache(first.cache.clone());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"memo"}"#);
		})
		.await;

	first.token(APP).await.expect("First broker should acquire.");

	assert_eq!(second.token(APP).await.expect("Second broker should reuse.").expose(), "memo");

	mock.assert_calls_async(1).await;

	let independent = broker(&server);

	assert_eq!(independent.cache_state(APP), CacheState::Empty);
}

#[tokio::test]
async fn brokers_sharing_a_cache_share_one_in_flight_acquisition() {
	let server = MockServer::start_async().await;
	let first = broker(&server);
	let second =
		Broker::new(config(&server, Some(APP_CLIENT_SECRET))).with_cache(first.cache.clone());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200)
				.delay(StdDuration::from_millis(200))
				.header("content-type", "application/json")
				.body(r#"{"access_token":"shared-cache"}"#);
		})
		.await;
	let (from_first, from_second) = tokio::join!(first.token(APP), second.token(APP));

	assert_eq!(from_first.expect("First broker should acquire.").expose(), "shared-cache");
	assert_eq!(from_second.expect("Second broker should wait and reuse.").expose(), "shared-cache");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn out_of_range_lifetime_still_yields_a_token() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"abc123","expires_in":"99999999999999"}"#);
		})
		.await;
	let token = broker.token(APP).await.expect("Oversized lifetime should not fail acquisition.");

	assert_eq!(token.expose(), "abc123");
	assert!(token.expires_at.is_none());
	assert_eq!(broker.cache_state(APP), CacheState::Cached);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn replacement_strategy_decorates_token_requests() {
	let server = MockServer::start_async().await;
	let resource = "https://graph.example/";
	let encoded: String = form_urlencoded::byte_serialize(resource.as_bytes()).collect();
	let broker = broker(&server).with_strategy(Arc::new(AzureAdStrategy::new(resource)));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH).body_includes(format!("resource={encoded}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"other-resource"}"#);
		})
		.await;

	assert_eq!(
		broker.token(APP).await.expect("Custom strategy should acquire.").expose(),
		"other-resource"
	);

	mock.assert_calls_async(1).await;
}
