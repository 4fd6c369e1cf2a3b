use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, RawQuery, State,
        rejection::{BytesRejection, PathRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{Map, Value};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::{
    error::GenerationError,
    generator::{ImageGenerator, RequestMethod},
    storage::GenerationRecord,
};

const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

pub fn router(generator: Arc<ImageGenerator>) -> Router {
    let images_dir = generator.config().images_dir.clone();
    Router::new()
        .route("/health", get(health))
        .route("/api/generate", get(generate_from_query).post(generate_from_body))
        .route("/api/generations", get(list_generations))
        .route("/api/generations/{id}", get(get_generation))
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(generator)
}

async fn health() -> &'static str {
    "ok"
}

async fn generate_from_query(
    State(generator): State<Arc<ImageGenerator>>,
    RawQuery(query): RawQuery,
) -> Response {
    match decode_query(query.as_deref().unwrap_or_default()) {
        Ok(input) => run_generation(&generator, &input, RequestMethod::Get).await,
        Err(err) => {
            warn!("Rejected query string: {}", err);
            err.into_response()
        }
    }
}

async fn generate_from_body(
    State(generator): State<Arc<ImageGenerator>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return GenerationError::InvalidInput(rejection.body_text()).into_response();
        }
    };
    // A body that is not a JSON object carries no prompt.
    let input = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    run_generation(&generator, &input, RequestMethod::Post).await
}

async fn run_generation(
    generator: &ImageGenerator,
    input: &Map<String, Value>,
    method: RequestMethod,
) -> Response {
    match generator.generate(input, method).await {
        Ok(output) => output.into_response(),
        Err(err) => {
            warn!(?method, "Generation failed: {}", err);
            err.into_response()
        }
    }
}

/// Form-urlencoded decoding that refuses invalid UTF-8 instead of
/// substituting replacement characters. Later duplicates win.
fn decode_query(raw: &str) -> Result<Map<String, Value>, GenerationError> {
    let mut input = Map::new();
    for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        input.insert(decode_component(key)?, Value::String(decode_component(value)?));
    }
    Ok(input)
}

fn decode_component(raw: &str) -> Result<String, GenerationError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| {
            GenerationError::InvalidInput("query parameters must be valid UTF-8".to_string())
        })
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<u32>,
}

async fn list_generations(
    State(generator): State<Arc<ImageGenerator>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<GenerationRecord>>, GenerationError> {
    let Query(params) =
        params.map_err(|rejection| GenerationError::InvalidInput(rejection.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let records = generator.store().list_recent(limit).await?;
    Ok(Json(records))
}

async fn get_generation(
    State(generator): State<Arc<ImageGenerator>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<GenerationRecord>, GenerationError> {
    let Path(id) = id.map_err(|rejection| GenerationError::InvalidInput(rejection.body_text()))?;
    generator
        .store()
        .get(id)
        .await?
        .map(Json)
        .ok_or(GenerationError::NotFound(id))
}
