//! A local stand-in for the image provider and the host serving its images.

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;

use crate::{config::ServiceConfig, generator::ImageGenerator, storage::GenerationStore};

pub const TEST_API_KEY: &str = "sk-test";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-pixels";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    reply: Arc<Mutex<(StatusCode, String)>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

pub struct FakeProvider {
    pub base_url: String,
    state: FakeState,
    handle: JoinHandle<()>,
}

impl FakeProvider {
    /// Starts on an ephemeral port. By default every generation call answers
    /// with a URL pointing at `/img.png` on the same server.
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let default_reply = json!({"data": [{"url": format!("{base_url}/img.png")}]});
        let state = FakeState {
            reply: Arc::new(Mutex::new((StatusCode::OK, default_reply.to_string()))),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        let router = Router::new()
            .route("/v1/images/generations", post(generations))
            .route("/img.png", get(image))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self {
            base_url,
            state,
            handle,
        }
    }

    pub fn generations_url(&self) -> String {
        format!("{}/v1/images/generations", self.base_url)
    }

    pub fn image_url(&self) -> String {
        format!("{}/img.png", self.base_url)
    }

    pub fn missing_image_url(&self) -> String {
        format!("{}/missing.png", self.base_url)
    }

    pub fn reply_with(&self, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).unwrap();
        *self.state.reply.lock().unwrap() = (status, body.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }
}

impl Drop for FakeProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn generations(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state
        .calls
        .lock()
        .unwrap()
        .push(RecordedCall { authorization, body });
    let (status, body) = state.reply.lock().unwrap().clone();
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES)
}

pub fn input(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn test_config(provider: &FakeProvider, data_dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::new(TEST_API_KEY, data_dir);
    config.provider_url = provider.generations_url();
    config
}

pub async fn test_generator(provider: &FakeProvider, data_dir: &Path) -> ImageGenerator {
    let config = test_config(provider, data_dir);
    let store = GenerationStore::connect(&config.database_path).await.unwrap();
    ImageGenerator::new(Arc::new(config), store).unwrap()
}
