use portal_bff::{AppConfig, build_app, build_state};
use serde_json::Value;
use tokio::task::JoinHandle;
use wiremock::MockServer;

const ORIGIN: &str = "https://portal.example.com";

fn test_config(idp_base: &str) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.cors_allowed_origins = vec![ORIGIN.to_string()];
    cfg.auth.idp.client_id = "portal".into();
    cfg.auth.idp.token_url = format!("{idp_base}/oauth2/token");
    cfg.auth.idp.userinfo_url = format!("{idp_base}/oauth2/userinfo");
    cfg.auth.biometric = cfg
        .auth
        .biometric
        .with_endpoints("http://127.0.0.1:9/token", "http://127.0.0.1:9/info")
        .with_credentials("bff", "secret");
    cfg.auth.relationships = cfg
        .auth
        .relationships
        .with_endpoints("http://127.0.0.1:9/token", "http://127.0.0.1:9/level")
        .with_credentials("bff", "secret");
    cfg
}

async fn start_server(
    cfg: AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let state = build_state(&cfg).await.expect("build state");
    let app = build_app(state, &cfg);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn server_endpoints_work() {
    // Unmatched requests get a 404, which is enough to count as reachable.
    let idp = MockServer::start().await;
    let (base, shutdown_tx, handle) = start_server(test_config(&idp.uri())).await;
    let client = reqwest::Client::new();

    // GET /api/health
    let resp = client.get(format!("{base}/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // GET /api/health/ready
    let resp = client
        .get(format!("{base}/api/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["sessionBackend"], "memory");
    assert_eq!(body["sessionBackendStatus"], "up");
    assert_eq!(body["identityProvider"], "reachable");
    assert_eq!(body["circuits"]["idp"], "closed");
    assert_eq!(body["circuits"]["biometric"], "closed");
    assert_eq!(body["circuits"]["relationships"], "closed");

    // GET /api/auth/session without a cookie
    let resp = client
        .get(format!("{base}/api/auth/session"))
        .header("origin", ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        ORIGIN
    );
    assert_eq!(
        resp.headers().get("access-control-allow-credentials").unwrap(),
        "true"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["isValid"], false);

    // GET /api/auth/user is protected
    let resp = client
        .get(format!("{base}/api/auth/user"))
        .header("cookie", "SESSION_ID=not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(resp.headers().contains_key("www-authenticate"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 401);

    // POST /api/auth/logout works without a session
    let resp = client
        .post(format!("{base}/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Logged out successfully");

    // Unknown origins get no CORS grant
    let resp = client
        .get(format!("{base}/api/health"))
        .header("origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn ready_reports_unreachable_identity_provider() {
    let (base, shutdown_tx, handle) = start_server(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "unavailable");
    assert_eq!(body["sessionBackendStatus"], "up");
    assert_eq!(body["identityProvider"], "unreachable");
    assert_eq!(body["circuits"]["biometric"], "closed");

    // Liveness is unaffected
    let resp = client.get(format!("{base}/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
