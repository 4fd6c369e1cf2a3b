use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::GenerationError;
use crate::validation::ResponseFormat;

pub const IMAGE_COUNT: u32 = 1;
pub const IMAGE_SIZE: &str = "1024x1024";
const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageGenerationData>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationData {
    url: Option<String>,
    image: Option<String>,
    b64_json: Option<String>,
}

/// An image the provider produced, in the format that was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderImage {
    Url(String),
    Base64(String),
}

impl ProviderImage {
    /// A reference that can be resolved back to the image bytes.
    pub fn image_reference(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Base64(payload) => format!("{DATA_URI_PREFIX}{payload}"),
        }
    }
}

pub struct ProviderClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .map_err(|err| GenerationError::ProviderCall(err.to_string()))?;
        info!(endpoint = %config.provider_url, "Image provider configured");
        Ok(Self {
            client,
            endpoint: config.provider_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn generate(
        &self,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<ProviderImage, GenerationError> {
        let body = json!({
            "prompt": prompt,
            "n": IMAGE_COUNT,
            "size": IMAGE_SIZE,
            "response_format": format.as_str(),
        });
        debug!(
            endpoint = %self.endpoint,
            %format,
            prompt_len = prompt.len(),
            "Calling image provider"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!("Image provider request failed: {}", err);
                GenerationError::ProviderCall(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Image provider returned an error");
            return Err(GenerationError::ProviderCall(format!("{status} {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|err| GenerationError::ProviderCall(err.to_string()))?;
        let image = parse_image_response(&text, format)?;
        debug!(%format, "Image provider responded");
        Ok(image)
    }
}

fn parse_image_response(
    text: &str,
    format: ResponseFormat,
) -> Result<ProviderImage, GenerationError> {
    let invalid = || GenerationError::InvalidProviderResponse(format);
    let payload: ImageGenerationResponse = serde_json::from_str(text).map_err(|err| {
        warn!("Unparseable image provider response: {}", err);
        invalid()
    })?;
    let first = payload.data.into_iter().next().ok_or_else(invalid)?;
    let image = match format {
        ResponseFormat::Url => first.url.map(ProviderImage::Url),
        ResponseFormat::B64Json => first.image.or(first.b64_json).map(ProviderImage::Base64),
    };
    match image {
        Some(ProviderImage::Url(value) | ProviderImage::Base64(value)) if value.is_empty() => {
            Err(invalid())
        }
        Some(image) => Ok(image),
        None => Err(invalid()),
    }
}
