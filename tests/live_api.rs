// Live integration tests against local mock APIs
//
// Each test spins up a real axum server on an ephemeral port, so the probe,
// the discoverer and workflow test mode all exercise real HTTP round trips.

use std::collections::HashMap;
use std::net::TcpListener;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use chain_reactor::{
    AuthShape, AutomationEngine, ChainReactorError, ConnectionStatus, NewConnection, RuleRegistry,
    TestPhase,
};

const SECRET: &str = "sekrit";

/// Serve a router on an ephemeral local port, returning its base URL
fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service())
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

fn header_is(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    headers.get(name).and_then(|v| v.to_str().ok()) == Some(expected)
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    header_is(headers, "authorization", &format!("Bearer {SECRET}"))
}

/// A mock API that accepts exactly one credential encoding and rejects the
/// other five
fn single_shape_router(shape: AuthShape) -> Router {
    Router::new().route(
        "/",
        get(
            move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                let accepted = match shape {
                    AuthShape::BearerToken => bearer_ok(&headers),
                    AuthShape::XApiKeyHeader => header_is(&headers, "x-api-key", SECRET),
                    AuthShape::BasicAuth => {
                        use base64::Engine as _;
                        let expected = format!(
                            "Basic {}",
                            base64::engine::general_purpose::STANDARD.encode(SECRET)
                        );
                        header_is(&headers, "authorization", &expected)
                    }
                    AuthShape::ApiKeyQuery => {
                        params.get("apiKey").map(String::as_str) == Some(SECRET)
                    }
                    AuthShape::AppIdQuery => {
                        params.get("appid").map(String::as_str) == Some(SECRET)
                    }
                    AuthShape::ApiKeyHeader => header_is(&headers, "api-key", SECRET),
                };
                if accepted {
                    (StatusCode::OK, Json(json!({"status": "ok"})))
                } else {
                    rejected()
                }
            },
        ),
    )
}

fn rejected() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "nope"})))
}

#[tokio::test]
async fn test_probe_negotiates_bearer_token() {
    let router = Router::new().route(
        "/",
        get(|headers: HeaderMap| async move {
            if bearer_ok(&headers) {
                (StatusCode::OK, Json(json!({"status": "ok"})))
            } else {
                rejected()
            }
        }),
    );
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let connection = engine
        .register_connection(NewConnection::new("bearer-api", &base, SECRET))
        .await
        .expect("bearer shape should negotiate");

    assert_eq!(connection.auth_shape, AuthShape::BearerToken);
    assert_eq!(connection.status, ConnectionStatus::Active);
    // No discovery endpoints and no keyword match: the generic fallback pairs
    let event_ids: Vec<&str> = connection.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(event_ids, ["data_update", "status_change"]);
}

#[tokio::test]
async fn test_every_shape_negotiates_to_itself() {
    // One server per shape, each accepting only its own encoding; the probe
    // must walk the fixed order and settle on exactly that shape every time
    for shape in AuthShape::ALL {
        let base = spawn(single_shape_router(shape));

        let engine = AutomationEngine::new();
        let connection = engine
            .register_connection(NewConnection::new("single-shape", &base, SECRET))
            .await
            .unwrap_or_else(|err| panic!("{shape} should negotiate, got: {err}"));

        assert_eq!(connection.auth_shape, shape, "negotiated shape for {shape}");
        assert_eq!(connection.status, ConnectionStatus::Active);
    }
}

#[tokio::test]
async fn test_probe_negotiates_appid_query() {
    // Only the fifth shape in the fixed order is accepted; the probe must
    // walk past bearer, both header keys, basic and apiKey to find it
    let router = Router::new().route(
        "/",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params.get("appid").map(String::as_str) == Some(SECRET) {
                (StatusCode::OK, Json(json!({"name": "London", "weather": []})))
            } else {
                rejected()
            }
        }),
    );
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let connection = engine
        .register_connection(NewConnection::new("owm", &base, SECRET))
        .await
        .unwrap();

    assert_eq!(connection.auth_shape, AuthShape::AppIdQuery);
    // The winning probe body mentions weather, so inference kicks in
    assert_eq!(connection.events[0].id, "weather_change");
    assert_eq!(connection.actions[0].id, "get_weather");
}

#[tokio::test]
async fn test_probe_exhaustion_reports_every_attempt() {
    let router = Router::new().route("/", get(|| async { rejected() }));
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let err = engine
        .register_connection(NewConnection::new("locked", &base, "wrong"))
        .await
        .expect_err("nothing should negotiate");

    match err {
        ChainReactorError::AuthExhausted { url, attempts } => {
            assert_eq!(url, base);
            assert_eq!(attempts.len(), 6);
            assert!(attempts.iter().all(|a| a.contains("HTTP 401")));
        }
        other => panic!("expected AuthExhausted, got {other}"),
    }
    // Nothing was registered
    assert!(engine.list_connections().is_empty());
}

#[tokio::test]
async fn test_discovery_endpoints_beat_inference() {
    let router = Router::new()
        .route("/", get(|| async { Json(json!({"weather": "sunny"})) }))
        .route(
            "/events",
            get(|| async {
                Json(json!([
                    {"id": "issue_opened", "name": "Issue Opened", "description": "A new issue"},
                    {"id": "issue_closed", "name": "Issue Closed", "description": "An issue closed"}
                ]))
            }),
        )
        .route(
            "/api/actions",
            get(|| async {
                Json(json!({"actions": [
                    {"id": "create_comment", "name": "Create Comment", "description": "Post a comment"}
                ]}))
            }),
        );
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let connection = engine
        .register_connection(NewConnection::new("tracker", &base, SECRET))
        .await
        .unwrap();

    // Explicit endpoint listings win even though the probe body says "weather"
    let event_ids: Vec<&str> = connection.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(event_ids, ["issue_opened", "issue_closed"]);
    let action_ids: Vec<&str> = connection.actions.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(action_ids, ["create_comment"]);
}

#[tokio::test]
async fn test_workflow_test_mode_weather_to_notification() {
    // OpenWeatherMap-flavored mock: root and the test-mode endpoints all
    // demand the appid query convention that negotiation settles on
    fn appid_ok(params: &HashMap<String, String>) -> bool {
        params.get("appid").map(String::as_str) == Some(SECRET)
    }

    let router = Router::new()
        .route(
            "/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if appid_ok(&params) {
                    (StatusCode::OK, Json(json!({"weather": []})))
                } else {
                    rejected()
                }
            }),
        )
        .route(
            "/data/2.5/weather",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if appid_ok(&params) && params.contains_key("q") {
                    (
                        StatusCode::OK,
                        Json(json!({"weather": [{"main": "Rain"}], "main": {"temp": 11.2}})),
                    )
                } else {
                    rejected()
                }
            }),
        )
        .route(
            "/notify",
            post(
                |Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    if appid_ok(&params) && body.get("message").is_some() {
                        (StatusCode::OK, Json(json!({"delivered": true})))
                    } else {
                        rejected()
                    }
                },
            ),
        );
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let connection = engine
        .register_connection(NewConnection::new("owm", &base, SECRET))
        .await
        .unwrap();
    assert_eq!(connection.auth_shape, AuthShape::AppIdQuery);

    engine
        .register_trigger(
            "weather.current",
            RuleRegistry::trigger(|| async { Ok(json!({})) }),
        )
        .unwrap();
    engine
        .register_action("notification.push", RuleRegistry::action(|_| async { Ok(()) }))
        .unwrap();

    let link = engine
        .compose_workflow(
            "rain-alert",
            &["weather.current".to_string()],
            RuleRegistry::condition(|_| true),
            &["notification.push".to_string()],
            connection.id,
        )
        .await
        .unwrap();

    let report = engine.test_workflow(link.id).await.unwrap();
    assert_eq!(report.trigger_result["type"], "weather_test");
    assert_eq!(report.trigger_result["endpoint"], "/data/2.5/weather");
    assert_eq!(report.trigger_result["status"], 200);
    assert_eq!(report.trigger_result["data"]["main"]["temp"], 11.2);
    assert_eq!(report.action_result["type"], "notification_test");
    assert_eq!(report.action_result["endpoint"], "/notify");
    assert_eq!(report.action_result["data"]["delivered"], true);

    // The diagnostic run lands in the chain link's bookkeeping
    let stored = engine.get_workflow(link.id).await.unwrap().unwrap();
    assert!(stored.last_run.unwrap().success);
}

#[tokio::test]
async fn test_workflow_test_failure_names_the_phase() {
    let router = Router::new()
        .route("/", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/data/2.5/weather",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))) }),
        );
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let connection = engine
        .register_connection(NewConnection::new("flaky", &base, SECRET))
        .await
        .unwrap();

    engine
        .register_trigger(
            "weather.current",
            RuleRegistry::trigger(|| async { Ok(json!({})) }),
        )
        .unwrap();
    engine
        .register_action("notification.push", RuleRegistry::action(|_| async { Ok(()) }))
        .unwrap();

    let link = engine
        .compose_workflow(
            "broken-weather",
            &["weather.current".to_string()],
            RuleRegistry::condition(|_| true),
            &["notification.push".to_string()],
            connection.id,
        )
        .await
        .unwrap();

    let err = engine.test_workflow(link.id).await.expect_err("trigger 500s");
    match err {
        ChainReactorError::TestFailed { phase, reason } => {
            assert_eq!(phase, TestPhase::Trigger);
            assert!(reason.contains("HTTP 500"));
        }
        other => panic!("expected TestFailed, got {other}"),
    }

    let stored = engine.get_workflow(link.id).await.unwrap().unwrap();
    assert!(!stored.last_run.unwrap().success);
}

#[tokio::test]
async fn test_connection_ids_stay_stable_across_delete() {
    let open = || Router::new().route("/", get(|| async { Json(json!({"status": "ok"})) }));

    let engine = AutomationEngine::new();
    let first = engine
        .register_connection(NewConnection::new("first", &spawn(open()), SECRET))
        .await
        .unwrap();
    let second = engine
        .register_connection(NewConnection::new("second", &spawn(open()), SECRET))
        .await
        .unwrap();

    engine.delete_connection(first.id).unwrap();
    let third = engine
        .register_connection(NewConnection::new("third", &spawn(open()), SECRET))
        .await
        .unwrap();

    // The deleted id is never handed out again and survivors keep theirs
    assert!(third.id > second.id);
    let ids: Vec<u64> = engine.list_connections().iter().map(|c| c.id).collect();
    assert_eq!(ids, [second.id, third.id]);

    // Listing twice returns identical snapshots
    assert_eq!(engine.list_connections(), engine.list_connections());
}

#[tokio::test]
async fn test_retest_flips_health_both_ways() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let healthy = Arc::new(AtomicBool::new(true));
    let flag = healthy.clone();
    let router = Router::new().route(
        "/",
        get(move || {
            let flag = flag.clone();
            async move {
                if flag.load(Ordering::SeqCst) {
                    (StatusCode::OK, Json(json!({"status": "ok"})))
                } else {
                    rejected()
                }
            }
        }),
    );
    let base = spawn(router);

    let engine = AutomationEngine::new();
    let connection = engine
        .register_connection(NewConnection::new("wobbly", &base, SECRET))
        .await
        .unwrap();

    healthy.store(false, Ordering::SeqCst);
    let status = engine.retest_connection(connection.id).await.unwrap();
    assert_eq!(status, ConnectionStatus::Inactive);

    healthy.store(true, Ordering::SeqCst);
    let status = engine.retest_connection(connection.id).await.unwrap();
    assert_eq!(status, ConnectionStatus::Active);
    assert_eq!(
        engine.get_connection(connection.id).unwrap().status,
        ConnectionStatus::Active
    );
}
