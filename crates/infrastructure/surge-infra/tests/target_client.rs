use axum::body::Bytes;
use axum::http::header::{AUTHORIZATION, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use surge_core::{EventFactory, EventParams, EventTypeCatalog};
use surge_infra::signing::{signature_hex, SignError, SIGNATURE_HEADER};
use surge_infra::{default_http_client, LoginIdentity, TargetClient};

const TOKEN: &str = "test-token";
const SECRET: &str = "test-secret";

async fn ingest(headers: HeaderMap, body: Bytes) -> StatusCode {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if bearer != format!("Bearer {TOKEN}") {
        return StatusCode::UNAUTHORIZED;
    }
    let presented = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let expected = signature_hex(&body, SECRET).unwrap();
    if presented != expected {
        return StatusCode::UNAUTHORIZED;
    }
    StatusCode::ACCEPTED
}

async fn dev_login() -> (StatusCode, [(axum::http::HeaderName, &'static str); 2]) {
    (
        StatusCode::SEE_OTHER,
        [(LOCATION, "/"), (SET_COOKIE, "dd_session=mock; Path=/")],
    )
}

async fn start_mock_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/webhooks/cdevents", post(ingest))
        .route("/auth/dev/login", post(dev_login))
        .route("/", get(|| async { "home" }))
        .route("/services/grid", get(|| async { "grid" }))
        .route("/deployments", get(|| async { "deployments" }))
        .route("/s/:service", get(|| async { "detail" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

fn target(addr: SocketAddr) -> TargetClient {
    let http = default_http_client(Duration::from_secs(5)).unwrap();
    TargetClient::new(http, format!("http://{addr}"), TOKEN, SECRET).unwrap()
}

fn sample_event() -> surge_core::DomainEvent {
    let factory = EventFactory::new(Arc::new(EventTypeCatalog::builtin()));
    factory.build(&EventParams {
        sequence: Some(42),
        chain_id: Some("lt-chain-14".to_string()),
        ..EventParams::default()
    })
}

#[tokio::test]
async fn webhook_delivery_is_signed_over_the_transmitted_bytes() {
    let (addr, server) = start_mock_server().await;
    let client = target(addr);

    let outcome = client.post_webhook(&sample_event()).await;
    assert!(outcome.ok, "mock rejected delivery: {:?}", outcome.status);
    assert_eq!(outcome.status, Some(202));
    assert_eq!(outcome.endpoint, "webhook_ingest");
    assert!(outcome.duration > Duration::ZERO);

    server.abort();
}

#[tokio::test]
async fn login_treats_redirect_as_success_without_following_it() {
    let (addr, server) = start_mock_server().await;
    let client = target(addr);

    let outcome = client.dev_login(&LoginIdentity::default()).await;
    assert!(outcome.ok);
    assert_eq!(outcome.status, Some(303));
    assert_eq!(outcome.endpoint, "dev_login");

    server.abort();
}

#[tokio::test]
async fn read_endpoints_report_their_discriminators() {
    let (addr, server) = start_mock_server().await;
    let client = target(addr);

    let home = client.get_home().await;
    assert!(home.ok);
    assert_eq!(home.endpoint, "home");

    let grid = client.get_services_grid("all").await;
    assert!(grid.ok);
    assert_eq!(grid.endpoint, "services_grid");

    let deployments = client.get_deployments().await;
    assert!(deployments.ok);
    assert_eq!(deployments.endpoint, "deployments");

    let detail = client.get_service_detail("orders").await;
    assert!(detail.ok);
    assert_eq!(detail.endpoint, "service_detail");

    server.abort();
}

#[tokio::test]
async fn transport_failure_is_observational_not_fatal() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = target(addr);
    let outcome = client.post_webhook(&sample_event()).await;
    assert!(!outcome.ok);
    assert_eq!(outcome.status, None);
}

#[tokio::test]
async fn empty_credentials_fail_at_construction() {
    let http = default_http_client(Duration::from_secs(5)).unwrap();
    let err = TargetClient::new(http.clone(), "http://localhost:1", TOKEN, "").unwrap_err();
    assert!(matches!(err, SignError::EmptySecret));

    let err = TargetClient::new(http, "http://localhost:1", "", SECRET).unwrap_err();
    assert!(matches!(err, SignError::EmptyToken));
}
