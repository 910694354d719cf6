use std::sync::{Arc, Mutex};

use globalping_api::{
    ApiError, ClientConfig, GlobalpingClient, MeasurementApi, MeasurementCreate, MeasurementKind,
    MeasurementLocation, MeasurementStatus, PkcePair, Token, TokenObserver,
};
use httpmock::prelude::*;
use serde_json::json;

fn test_config(server: &MockServer, max_retries: usize) -> ClientConfig {
    ClientConfig {
        api_url: format!("{}/v1", server.base_url()),
        auth_url: server.base_url(),
        auth_client_id: "client-id".to_string(),
        auth_client_secret: "client-secret".to_string(),
        request_timeout_ms: 5_000,
        max_retries,
        retry_jitter: false,
        ..ClientConfig::default()
    }
}

fn ping_request() -> MeasurementCreate {
    let mut request = MeasurementCreate::new(MeasurementKind::Ping, "example.com");
    request.limit = Some(1);
    request.locations = vec![MeasurementLocation::magic("world")];
    request
}

#[derive(Default)]
struct RecordingObserver {
    tokens: Mutex<Vec<Token>>,
}

impl TokenObserver for RecordingObserver {
    fn token_refreshed(&self, token: &Token) {
        self.tokens.lock().expect("observer lock").push(token.clone());
    }
}

#[tokio::test]
async fn create_measurement_sends_expected_payload() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .header_exists("x-request-id")
            .header("x-retry-attempt", "0")
            .json_body_includes(
                json!({
                    "type": "ping",
                    "target": "example.com",
                    "limit": 1,
                    "locations": [{"magic": "world"}]
                })
                .to_string(),
            );
        then.status(202)
            .json_body(json!({"id": "nzGzfAGL7sZfUs3c", "probesCount": 1}));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let created = client
        .create_measurement(&ping_request())
        .await
        .expect("create measurement");

    mock.assert();
    assert_eq!(created.id, "nzGzfAGL7sZfUs3c");
    assert_eq!(created.probes_count, 1);
}

#[tokio::test]
async fn create_measurement_retries_transient_server_errors() {
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .header("x-retry-attempt", "0");
        then.status(503).body("busy");
    });
    let succeeding = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .header("x-retry-attempt", "1");
        then.status(202).json_body(json!({"id": "retry-ok", "probesCount": 1}));
    });

    let client = GlobalpingClient::new(test_config(&server, 2), None).expect("client");
    let created = client
        .create_measurement(&ping_request())
        .await
        .expect("retry should succeed");

    failing.assert_calls(1);
    succeeding.assert_calls(1);
    assert_eq!(created.id, "retry-ok");
}

#[tokio::test]
async fn rate_limited_submission_carries_quota_hints() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/measurements");
        then.status(429)
            .header("x-ratelimit-remaining", "0")
            .header("x-ratelimit-reset", "42")
            .header("x-credits-remaining", "5")
            .json_body(json!({
                "error": {"type": "rate_limit_exceeded", "message": "API rate limit exceeded."}
            }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let error = client
        .create_measurement(&ping_request())
        .await
        .expect_err("rate limited");

    let ApiError::RateLimited(info) = error else {
        panic!("expected rate limit error, got {error:?}");
    };
    assert_eq!(info.message, "API rate limit exceeded.");
    assert_eq!(info.remaining, Some(0));
    assert_eq!(info.reset_secs, Some(42));
    assert_eq!(info.credits_remaining, Some(5));
}

#[tokio::test]
async fn validation_and_no_probe_errors_are_distinguished() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .body_includes("\"target\":\"bad target\"");
        then.status(400).json_body(json!({
            "error": {
                "type": "validation_error",
                "message": "Parameter validation failed.",
                "params": {"target": "\"target\" does not match any of the allowed types"}
            }
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .body_includes("\"target\":\"example.com\"");
        then.status(422).json_body(json!({
            "error": {"type": "no_probes_found", "message": "No suitable probes found."}
        }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let invalid = MeasurementCreate::new(MeasurementKind::Ping, "bad target");
    let error = client.create_measurement(&invalid).await.expect_err("400");
    assert!(error
        .to_string()
        .contains("\n - target: \"target\" does not match"));
    let ApiError::Validation { message, params } = error else {
        panic!("expected validation error, got {error:?}");
    };
    assert_eq!(message, "Parameter validation failed.");
    assert!(params["target"].contains("does not match"));

    let error = client
        .create_measurement(&ping_request())
        .await
        .expect_err("422");
    assert!(matches!(error, ApiError::NoProbesFound(ref message) if message == "No suitable probes found."));
}

#[tokio::test]
async fn in_progress_poll_revalidates_with_etag() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/measurements/m1")
            .header_missing("if-none-match");
        then.status(200).header("etag", "\"v1\"").json_body(json!({
            "id": "m1",
            "status": "in-progress",
            "results": [{"probe": {"city": "Berlin"}, "result": {"rawOutput": "partial"}}]
        }));
    });
    let revalidated = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/measurements/m1")
            .header("if-none-match", "\"v1\"");
        then.status(304);
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let initial = client.get_measurement("m1").await.expect("first poll");
    let cached = client.get_measurement("m1").await.expect("second poll");

    first.assert_calls(1);
    revalidated.assert_calls(1);
    assert_eq!(initial, cached);
    assert_eq!(cached.results[0].result.raw_output, "partial");
}

#[tokio::test]
async fn finished_measurement_is_served_from_cache() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/measurements/done1");
        then.status(200).json_body(json!({
            "id": "done1",
            "status": "finished",
            "results": [
                {"probe": {"city": "Berlin", "country": "DE"}, "result": {"rawOutput": "a"}},
                {"probe": {"city": "New York", "country": "US"}, "result": {"rawOutput": "b"}}
            ]
        }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let first = client.get_measurement("done1").await.expect("fetch");
    let second = client.get_measurement("done1").await.expect("cached");

    mock.assert_calls(1);
    assert_eq!(first.status, MeasurementStatus::Finished);
    assert_eq!(second.probes().len(), 2);
}

#[tokio::test]
async fn unknown_measurement_maps_to_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/measurements/missing");
        then.status(404).json_body(json!({
            "error": {"type": "not_found", "message": "Couldn't find the requested measurement."}
        }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let error = client.get_measurement("missing").await.expect_err("404");
    assert!(matches!(error, ApiError::NotFound { .. }), "got {error:?}");
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_reported_to_observer() {
    let server = MockServer::start();
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/oauth/token")
            .body_includes("grant_type=refresh_token")
            .body_includes("refresh_token=refresh-1")
            .body_includes("client_id=client-id");
        then.status(200).json_body(json!({
            "access_token": "access-2",
            "token_type": "Bearer",
            "refresh_token": "refresh-2",
            "expires_in": 3600
        }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .header("authorization", "Bearer access-2");
        then.status(202).json_body(json!({"id": "authed", "probesCount": 1}));
    });

    let expired = Token {
        access_token: "access-1".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_in: 3600,
        expiry_unix: 1,
    };
    let observer = Arc::new(RecordingObserver::default());
    let client = GlobalpingClient::new(test_config(&server, 0), Some(expired))
        .expect("client")
        .with_token_observer(observer.clone());

    client.create_measurement(&ping_request()).await.expect("first create");
    client.create_measurement(&ping_request()).await.expect("second create");

    refresh.assert_calls(1);
    create.assert_calls(2);
    let recorded = observer.tokens.lock().expect("observer lock");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].access_token, "access-2");
    assert_eq!(recorded[0].refresh_token.as_deref(), Some("refresh-2"));
    assert!(recorded[0].expiry_unix > 1);
    let installed = client.current_token().await.expect("installed token");
    assert_eq!(installed.access_token, "access-2");
}

#[tokio::test]
async fn pinned_token_never_triggers_refresh() {
    let server = MockServer::start();
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body(json!({"access_token": "unused", "expires_in": 1}));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/measurements")
            .header("authorization", "Bearer pinned-token");
        then.status(202).json_body(json!({"id": "pinned", "probesCount": 1}));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), Some(Token::pinned("pinned-token")))
        .expect("client");
    client.create_measurement(&ping_request()).await.expect("create");

    refresh.assert_calls(0);
    create.assert_calls(1);
}

#[tokio::test]
async fn refresh_failure_aborts_the_authenticated_call() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(400).json_body(json!({"error": "invalid_grant"}));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/v1/measurements");
        then.status(202).json_body(json!({"id": "never", "probesCount": 1}));
    });

    let expired = Token {
        access_token: "access-1".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_in: 3600,
        expiry_unix: 1,
    };
    let client = GlobalpingClient::new(test_config(&server, 0), Some(expired)).expect("client");
    let error = client
        .create_measurement(&ping_request())
        .await
        .expect_err("refresh failure");

    assert!(error.is_auth_refresh_failure(), "got {error:?}");
    create.assert_calls(0);
}

#[tokio::test]
async fn limits_endpoint_reports_create_quota_and_credits() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/limits");
        then.status(200).json_body(json!({
            "rateLimit": {
                "measurements": {
                    "create": {"type": "ip", "limit": 250, "remaining": 249, "reset": 3300}
                }
            },
            "credits": {"remaining": 1000}
        }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let limits = client.limits().await.expect("limits");
    assert_eq!(limits.create_limit().limit, 250);
    assert_eq!(limits.create_limit().remaining, 249);
    assert_eq!(limits.credits.map(|credits| credits.remaining), Some(1000));
}

#[tokio::test]
async fn authorization_code_login_yields_a_refreshable_token() {
    let server = MockServer::start();
    let exchange = server.mock(|when, then| {
        when.method(POST)
            .path("/oauth/token")
            .body_includes("grant_type=authorization_code")
            .body_includes("code=code-1")
            .body_includes("code_verifier=verifier-1")
            .body_includes("client_id=client-id");
        then.status(200).json_body(json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "refresh_token": "refresh-1",
            "expires_in": 3600
        }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let pkce = PkcePair::from_verifier("verifier-1");
    let url = client
        .authorization_url("http://localhost:4567/callback", &pkce, "state-1")
        .expect("authorization url");
    assert!(url.starts_with(&format!("{}/oauth/authorize?", server.base_url())));
    assert!(url.contains(&format!("code_challenge={}", pkce.challenge)));
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A4567%2Fcallback"));
    assert!(url.contains("state=state-1"));

    let token = client
        .exchange_authorization_code("code-1", "verifier-1", "http://localhost:4567/callback")
        .await
        .expect("exchange");

    exchange.assert_calls(1);
    assert_eq!(token.access_token, "access-1");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!token.is_pinned());
}

#[tokio::test]
async fn rejected_authorization_code_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(401).json_body(json!({
            "error": {"type": "invalid_grant", "message": "Code expired."}
        }));
    });

    let client = GlobalpingClient::new(test_config(&server, 0), None).expect("client");
    let error = client
        .exchange_authorization_code("stale", "verifier-1", "http://localhost:4567/callback")
        .await
        .expect_err("rejected code");
    assert!(matches!(error, ApiError::Unauthorized(_)), "{error:?}");
}
