//! Generation orchestration: validate, call the provider, persist, shape.

use std::sync::Arc;

use axum::{
    Json,
    http::header,
    response::{IntoResponse, Response},
};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    config::ServiceConfig,
    error::GenerationError,
    provider::ProviderClient,
    storage::{GenerationStore, LocalImageStorage, NewGenerationRecord, fetch_image_bytes},
    validation::{ResponseFormat, require_prompt, resolve_format},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// Reference to a stored image plus where it landed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedImage {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    PlainText(String),
    Json(SavedImage),
}

impl GenerationOutput {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::PlainText(_) => "text/plain; charset=utf-8",
            Self::Json(_) => "application/json",
        }
    }

    fn shape(method: RequestMethod, format: ResponseFormat, saved: SavedImage) -> Self {
        match (method, format) {
            (RequestMethod::Get, ResponseFormat::Url) => Self::PlainText(saved.url),
            _ => Self::Json(saved),
        }
    }
}

impl IntoResponse for GenerationOutput {
    fn into_response(self) -> Response {
        let content_type = self.content_type();
        match self {
            Self::PlainText(text) => ([(header::CONTENT_TYPE, content_type)], text).into_response(),
            Self::Json(saved) => Json(saved).into_response(),
        }
    }
}

pub struct ImageGenerator {
    config: Arc<ServiceConfig>,
    provider: ProviderClient,
    storage: LocalImageStorage,
    store: GenerationStore,
    http: Client,
}

impl ImageGenerator {
    pub fn new(
        config: Arc<ServiceConfig>,
        store: GenerationStore,
    ) -> Result<Self, GenerationError> {
        let provider = ProviderClient::new(&config)?;
        let http = Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .map_err(|err| GenerationError::Persistence(err.to_string()))?;
        let storage = LocalImageStorage::new(config.images_dir.clone());
        Ok(Self {
            config,
            provider,
            storage,
            store,
            http,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    pub async fn generate(
        &self,
        input: &Map<String, Value>,
        method: RequestMethod,
    ) -> Result<GenerationOutput, GenerationError> {
        let prompt = require_prompt(input, self.config.max_prompt_chars)?;
        let format = resolve_format(input);
        info!(?method, %format, prompt_len = prompt.chars().count(), "Generating image");

        let image = self.provider.generate(&prompt, format).await?;
        let reference = image.image_reference();
        let saved = self.persist(&prompt, &reference).await?;

        Ok(GenerationOutput::shape(method, format, saved))
    }

    async fn persist(&self, prompt: &str, reference: &str) -> Result<SavedImage, GenerationError> {
        let bytes = fetch_image_bytes(&self.http, reference).await?;
        let path = self
            .storage
            .save_png(&bytes)
            .await
            .map_err(|err| GenerationError::Persistence(format!("write image failed: {err}")))?;
        let image_path = path.to_string_lossy().into_owned();

        let record = NewGenerationRecord {
            prompt: prompt.to_string(),
            image_url: reference.to_string(),
            image_path: image_path.clone(),
        };
        let record = match self.store.insert(record).await {
            Ok(record) => record,
            Err(err) => {
                warn!("Generation record insert failed: {}", err);
                self.storage.remove(&path).await;
                return Err(err.into());
            }
        };
        info!(id = record.id, path = %image_path, bytes = bytes.len(), "Generation recorded");

        Ok(SavedImage {
            url: reference.to_string(),
            path: image_path,
        })
    }
}
