#![allow(dead_code)]

use civic_reports::config::rate_limit::RateLimitConfig;
use civic_reports::config::LifecycleConfig;
use civic_reports::ReportStore;
use reqwest::Client;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestApp {
    pub addr: String,
    pub client: Client,
    pub store: ReportStore,
    pub data_file: PathBuf,
    pub config: LifecycleConfig,
    dir: Arc<TempDir>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }

    /// Start a fresh server over the same data file, as after a process restart.
    pub async fn restart(&self) -> TestApp {
        serve(self.dir.clone(), self.data_file.clone(), self.config).await
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(LifecycleConfig::default()).await
}

pub async fn spawn_app_with(config: LifecycleConfig) -> TestApp {
    let dir = Arc::new(TempDir::new().expect("Failed to create temp dir"));
    let data_file = dir.path().join("reports.json");
    serve(dir, data_file, config).await
}

async fn serve(dir: Arc<TempDir>, data_file: PathBuf, config: LifecycleConfig) -> TestApp {
    let store = ReportStore::open(&data_file)
        .await
        .expect("Failed to open report store");

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        // Tests fire requests faster than any sane per-IP limit.
        .merge(civic_reports::routes::create_routes_with(&RateLimitConfig {
            enabled: false,
            ..Default::default()
        }))
        .layer(axum::extract::Extension(store.clone()))
        .layer(axum::extract::Extension(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        client: Client::new(),
        store,
        data_file,
        config,
        dir,
    }
}

/// Submit the pothole report and return its id.
pub async fn create_test_report(app: &TestApp) -> String {
    let resp = app
        .client
        .post(app.url("/reports"))
        .json(&serde_json::json!({
            "title": "Pothole",
            "description": "Large pothole",
            "location": "MG Road",
            "category": "Infrastructure"
        }))
        .send()
        .await
        .expect("Failed to create report");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to create report: status={}, body={}", status, body);
    }

    body["data"]["id"]
        .as_str()
        .expect("Response missing id field")
        .to_string()
}

/// Move a report to `status` and return the response body.
pub async fn set_status(app: &TestApp, id: &str, status: &str) -> (u16, Value) {
    let resp = app
        .client
        .put(app.url(&format!("/reports/{}/status", id)))
        .json(&serde_json::json!({ "status": status }))
        .send()
        .await
        .expect("Failed to update status");

    let code = resp.status().as_u16();
    let body: Value = resp.json().await.expect("Failed to parse response");
    (code, body)
}

pub fn read_data_file(app: &TestApp) -> Value {
    let raw = std::fs::read_to_string(&app.data_file).expect("Failed to read data file");
    serde_json::from_str(&raw).expect("Data file is not valid JSON")
}
