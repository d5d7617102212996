#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::routing::{ get, post };
use axum::{ Json, Router };
use crypto_loadtest::Config;
use serde_json::{ json, Value };
use tokio::net::TcpListener;
use tokio::time::Instant;

pub const ENCRYPT_PATH: &str = "/api/crypto/encrypt";
pub const HEALTH_PATH: &str = "/api/crypto/health";

/// How the mock encryption endpoint answers
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// 200 with a valid body after the given delay
    Encrypt(Duration),
    /// 500 with `{"error": ..}`
    ServerError,
    /// 500 with a plain text body
    ServerErrorPlain,
    /// 200 with a body that is not JSON
    Garbage,
}

#[derive(Clone)]
struct MockState {
    behavior: Behavior,
    arrivals: Arc<AtomicUsize>,
    ready_at: Option<Instant>, // None: never healthy
}

/// A mock encryption service listening on a random local port
pub struct MockService {
    pub base_url: String,
    arrivals: Arc<AtomicUsize>,
}

impl MockService {
    /// Healthy from the start
    pub async fn start(behavior: Behavior) -> Self {
        Self::start_with_health(behavior, Some(Duration::ZERO)).await
    }

    /// Health answers 503 until `ready_after` has passed (forever when `None`)
    pub async fn start_with_health(behavior: Behavior, ready_after: Option<Duration>) -> Self {
        let arrivals = Arc::new(AtomicUsize::new(0));
        let state = MockState {
            behavior,
            arrivals: Arc::clone(&arrivals),
            ready_at: ready_after.map(|delay| Instant::now() + delay),
        };

        let router = Router::new()
            .route(ENCRYPT_PATH, post(encrypt))
            .route(HEALTH_PATH, get(health))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { base_url: format!("http://{}", addr), arrivals }
    }

    pub fn encrypt_url(&self) -> String {
        format!("{}{}", self.base_url, ENCRYPT_PATH)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, HEALTH_PATH)
    }

    /// Encrypt requests received so far
    pub fn arrivals(&self) -> usize {
        self.arrivals.load(Ordering::SeqCst)
    }
}

async fn encrypt(State(state): State<MockState>, body: String) -> Response {
    state.arrivals.fetch_add(1, Ordering::SeqCst);

    match state.behavior {
        Behavior::Encrypt(delay) => {
            tokio::time::sleep(delay).await;
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let message = request["message"].as_str().unwrap_or_default();
            (StatusCode::OK, Json(json!({ "encrypted": format!("enc:{}", message) }))).into_response()
        }
        Behavior::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "signing key unavailable" })))
                .into_response()
        }
        Behavior::ServerErrorPlain => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        Behavior::Garbage => (StatusCode::OK, "not json").into_response(),
    }
}

async fn health(State(state): State<MockState>) -> StatusCode {
    match state.ready_at {
        Some(ready_at) if Instant::now() >= ready_at => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// A local URL nothing is listening on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, HEALTH_PATH)
}

pub fn test_config(service: &MockService, results: &Path) -> Config {
    Config {
        target_url: service.encrypt_url(),
        health_url: service.health_url(),
        requests_per_second: 10,
        test_duration: Duration::from_secs(2),
        health_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        workers: 1,
        results_base_path: results.to_path_buf(),
        test_number: "1".to_string(),
        service: "mock".to_string(),
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
