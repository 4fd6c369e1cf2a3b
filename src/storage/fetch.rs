use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use url::Url;

use crate::error::GenerationError;

/// Resolves an image reference (`data:` URI or http(s) URL) to its bytes.
pub async fn fetch_image_bytes(
    client: &Client,
    reference: &str,
) -> Result<Vec<u8>, GenerationError> {
    let bytes = if let Some(rest) = reference.strip_prefix("data:") {
        decode_data_uri(rest)?
    } else {
        let url = validate_http_url(reference)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|err| GenerationError::Persistence(format!("fetch image failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Persistence(format!(
                "fetch image failed: HTTP {status}"
            )));
        }
        response
            .bytes()
            .await
            .map_err(|err| GenerationError::Persistence(format!("read image bytes failed: {err}")))?
            .to_vec()
    };
    if bytes.is_empty() {
        return Err(GenerationError::Persistence("image is empty".to_string()));
    }
    Ok(bytes)
}

pub fn validate_http_url(raw: &str) -> Result<Url, GenerationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::Persistence("image url is empty".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| GenerationError::Persistence(format!("invalid image url: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(GenerationError::Persistence(format!(
            "unsupported image url scheme: {scheme}"
        ))),
    }
}

fn decode_data_uri(rest: &str) -> Result<Vec<u8>, GenerationError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| GenerationError::Persistence("malformed data uri".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(GenerationError::Persistence(
            "data uri is not base64 encoded".to_string(),
        ));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|err| GenerationError::Persistence(format!("invalid base64 image: {err}")))
}
