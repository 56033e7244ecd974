//! Integration tests for the filter service HTTP API.
//!
//! Each test starts the service on a random port next to a stub language
//! service and a stub asset host, then drives it over real HTTP with reqwest.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header;
use axum::routing::get;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use filter_service::api::{AppState, router};
use filter_service::config::StorageBackend;
use filter_service::oracle::HttpBannedTermOracle;
use filter_service::probe::HttpLinkProbe;
use filter_service::store;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn serve(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    port
}

/// Stub language service and asset host on one port.
async fn start_upstreams() -> u16 {
    let app = Router::new()
        .route(
            "/api/banned",
            get(|| async {
                axum::Json(json!({"updated": Utc::now(), "words": ["adult", "jaw"]}))
            }),
        )
        .route(
            "/cat.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], "") }),
        )
        .route(
            "/page",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
        );
    serve(app).await
}

/// Start the filter service backed by a libsql file in `dir`.
/// Returns the service base URL and the upstream port.
async fn start_server(dir: &tempfile::TempDir) -> (String, u16) {
    let upstream = start_upstreams().await;

    let backend = StorageBackend::LibSql {
        path: dir.path().join("filter.db").to_string_lossy().into_owned(),
    };
    let store = store::open(&backend).await.unwrap();
    let oracle = Arc::new(HttpBannedTermOracle::new(
        &format!("http://127.0.0.1:{upstream}"),
        Duration::from_secs(2),
    ));
    let probe = Arc::new(HttpLinkProbe::new(Duration::from_secs(2)));

    let port = serve(router(AppState::new(store, oracle, probe))).await;

    // Give the servers a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), upstream)
}

async fn post_message(client: &reqwest::Client, base: &str, id: &str, body: &str) -> (u16, Value) {
    let resp = client
        .post(format!("{base}/api/validate"))
        .json(&json!({"id": id, "body": body}))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get_json(client: &reqwest::Client, url: String) -> Value {
    client.get(url).send().await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn submission_outcomes_over_http() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let (base, assets) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let (status, body) =
            post_message(&client, &base, "1", "# Simple Message\n\n\nThis is a simple message.").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "your message has been stored.");

        let (_, body) =
            post_message(&client, &base, "2", "# Title\n\nThis message contains adult content").await;
        assert_eq!(body["status"], "your message has been rejected.");
        assert_eq!(body["reason"], "contains banned words: [adult]");

        let page = format!("# Title\n\n[home](http://127.0.0.1:{assets}/page)");
        let (_, body) = post_message(&client, &base, "3", &page).await;
        assert_eq!(body["reason"], "contains external links");

        let (status, _) = post_message(&client, &base, "1", "# Again\nbody").await;
        assert_eq!(status, 409);

        let (status, _) = post_message(&client, &base, "4", "no heading here").await;
        assert_eq!(status, 400);

        let messages = get_json(&client, format!("{base}/api/messages")).await;
        assert_eq!(messages["messages"].as_array().unwrap().len(), 3);
        let rejected = get_json(&client, format!("{base}/api/rejected")).await;
        assert_eq!(rejected["rejected"].as_array().unwrap().len(), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn image_review_round_trip() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let (base, assets) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let body = format!(
            "# Gallery\n\n![cat](http://127.0.0.1:{assets}/cat.png) and ![dog](http://127.0.0.1:{assets}/cat.png?dog)"
        );
        let (_, resp) = post_message(&client, &base, "g1", &body).await;
        assert_eq!(
            resp["status"],
            "your message is awaiting approval as it contains image links."
        );

        let approvals = get_json(&client, format!("{base}/api/approvals")).await;
        let approvals = approvals["approvals"].as_array().unwrap().clone();
        assert_eq!(approvals.len(), 2);
        assert!(approvals.iter().all(|a| a["messageId"] == "g1"));

        let first = approvals[0]["id"].as_str().unwrap();
        let second = approvals[1]["id"].as_str().unwrap();

        let msg: Value = client
            .post(format!("{base}/api/approvals/{first}/approve"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(msg["status"], "awaiting_approval");

        let msg: Value = client
            .post(format!("{base}/api/approvals/{second}/approve"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(msg["status"], "validated");

        let resp = client
            .post(format!("{base}/api/approvals/{second}/reject"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);

        let approvals = get_json(&client, format!("{base}/api/approvals")).await;
        assert!(approvals["approvals"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn state_survives_restart() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();

        let (base, _) = start_server(&dir).await;
        post_message(&client, &base, "keep", "# Title\nplain").await;

        let (base, _) = start_server(&dir).await;
        let messages = get_json(&client, format!("{base}/api/messages")).await;
        assert_eq!(messages["messages"][0]["id"], "keep");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_route_returns_structured_404() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let (base, _) = start_server(&dir).await;

        let resp = reqwest::get(format!("{base}/nope")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        assert!(resp.headers().contains_key("x-request-id"));
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
        assert_eq!(body["resource"], "/nope");
    })
    .await
    .expect("test timed out");
}
