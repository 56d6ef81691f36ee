// REST session tests against a wiremock server.

use casambi_cloud::{CasambiError, NetworkSelection, Session, SessionManager};
use chrono::NaiveDate;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const API_KEY: &str = "test-key";

async fn setup() -> (MockServer, SessionManager) {
    let server = MockServer::start().await;
    let rest = SessionManager::with_client(
        reqwest::Client::new(),
        SecretString::from(API_KEY.to_string()),
        server.uri(),
    );
    (server, rest)
}

fn session() -> Session {
    Session::new(
        SecretString::from(API_KEY.to_string()),
        "user-session",
        "net-1",
        "net-session",
    )
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_user() {
    let (server, rest) = setup().await;

    Mock::given(method("POST"))
        .and(path("/users/session/"))
        .and(header("x-casambi-key", API_KEY))
        .and(body_json(json!({"email": "me@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "user-abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let session_id = rest.authenticate_user("me@example.com", "pw").await.unwrap();
    assert_eq!(session_id, "user-abc");
}

#[tokio::test]
async fn test_authenticate_user_failure_keeps_status_and_body() {
    let (server, rest) = setup().await;

    Mock::given(method("POST"))
        .and(path("/users/session/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let err = rest.authenticate_user("me@example.com", "wrong").await.unwrap_err();
    match err {
        CasambiError::Auth { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected Auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_network_selects_first_entry() {
    let (server, rest) = setup().await;

    // Raw body so the key order on the wire is fixed
    let body = r#"{"zz-net": {"sessionId": "s-zz", "name": "Home"}, "aa-net": {"sessionId": "s-aa", "name": "Office"}}"#;
    Mock::given(method("POST"))
        .and(path("/networks/session/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let first = rest
        .authenticate_network("me@example.com", "net-pw", &NetworkSelection::First)
        .await
        .unwrap();
    assert_eq!(first, ("zz-net".to_string(), "s-zz".to_string()));

    let chosen = rest
        .authenticate_network(
            "me@example.com",
            "net-pw",
            &NetworkSelection::Id("aa-net".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(chosen, ("aa-net".to_string(), "s-aa".to_string()));
}

#[tokio::test]
async fn test_login_builds_session() {
    let (server, rest) = setup().await;

    Mock::given(method("POST"))
        .and(path("/users/session/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "user-abc"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/networks/session/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"net-9": {"sessionId": "net-sess"}})),
        )
        .mount(&server)
        .await;

    let session = rest
        .login("me@example.com", "pw", "net-pw", &NetworkSelection::First)
        .await
        .unwrap();
    assert_eq!(session.user_session_id(), "user-abc");
    assert_eq!(session.network_id(), "net-9");
    assert_eq!(session.network_session_id(), "net-sess");
}

#[tokio::test]
async fn test_network_login_failure_is_auth_error() {
    let (server, rest) = setup().await;

    Mock::given(method("POST"))
        .and(path("/networks/session/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .mount(&server)
        .await;

    let err = rest
        .authenticate_network("me@example.com", "net-pw", &NetworkSelection::First)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(matches!(err, CasambiError::Auth { .. }));
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_queries_send_session_headers() {
    let (server, rest) = setup().await;

    Mock::given(method("GET"))
        .and(path("/networks/net-1/units"))
        .and(header("x-casambi-key", API_KEY))
        .and(header("x-casambi-session", "user-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"1": {"name": "Lamp"}})))
        .expect(1)
        .mount(&server)
        .await;

    let units = rest.fetch_unit_list(&session()).await.unwrap();
    assert_eq!(units["1"]["name"], "Lamp");
}

#[tokio::test]
async fn test_query_endpoints() {
    let (server, rest) = setup().await;

    for (p, body) in [
        ("/networks/net-1", json!({"id": "net-1", "name": "Home"})),
        ("/networks/net-1/state", json!({"units": {}})),
        ("/networks/net-1/scenes", json!({"2": {"name": "Evening"}})),
        ("/fixtures/42", json!({"id": 42, "vendor": "Acme"})),
    ] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let session = session();
    assert_eq!(rest.fetch_network_info(&session).await.unwrap()["name"], "Home");
    assert!(rest.fetch_network_state(&session).await.unwrap()["units"].is_object());
    assert_eq!(rest.fetch_scene_list(&session).await.unwrap()["2"]["name"], "Evening");
    assert_eq!(rest.fetch_fixture_info(&session, "42").await.unwrap()["vendor"], "Acme");
}

#[tokio::test]
async fn test_unit_state_capabilities() {
    let (server, rest) = setup().await;

    Mock::given(method("GET"))
        .and(path("/networks/net-1/units/3/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "name": "Desk",
            "controls": [[
                {"type": "Dimmer", "value": 0},
                {"type": "CCT", "min": 2700, "max": 5000, "value": 3000}
            ]]
        })))
        .mount(&server)
        .await;

    let state = rest.fetch_unit_state(&session(), 3.0).await.unwrap();
    assert_eq!(state.name(), Some("Desk"));
    assert!(state.supports_color_temperature());
    assert!(!state.supports_rgb());
    assert_eq!(state.supported_color_temperature_range(), (2700, 5000));
}

#[tokio::test]
async fn test_forbidden_query_is_api_error() {
    let (server, rest) = setup().await;

    Mock::given(method("GET"))
        .and(path("/networks/net-1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("{\"error\":\"forbidden\"}"))
        .mount(&server)
        .await;

    let err = rest.fetch_network_info(&session()).await.unwrap_err();
    match err {
        CasambiError::Api { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "{\"error\":\"forbidden\"}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ── Datapoints ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_datapoints_query_format() {
    let (server, rest) = setup().await;

    Mock::given(method("GET"))
        .and(path("/networks/net-1/datapoints"))
        .and(query_param("sensorType", "1"))
        .and(query_param("from", "202401010000"))
        .and(query_param("to", "202401081230"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let from = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let to = NaiveDate::from_ymd_opt(2024, 1, 8)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();

    let points = rest
        .fetch_datapoints(&session(), Some(from), Some(to), 1)
        .await
        .unwrap();
    assert_eq!(points, json!([]));
}

#[tokio::test]
async fn test_datapoints_rejects_sensor_type_without_request() {
    let (server, rest) = setup().await;

    Mock::given(method("GET"))
        .and(path("/networks/net-1/datapoints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let err = rest
        .fetch_datapoints(&session(), None, None, 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CasambiError::InvalidArgument { argument: "sensor_type", .. }
    ));
}
