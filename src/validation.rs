//! Input checks for generation requests.
//!
//! Input arrives as a JSON object map. GET query parameters are folded into
//! the same shape as string values before they get here.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::GenerationError;

pub const PROMPT_FIELD: &str = "prompt";
pub const FORMAT_FIELD: &str = "response_format";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Url,
    B64Json,
}

impl ResponseFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::B64Json => "b64_json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strips markup tags and control characters, then trims.
pub fn sanitize(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '<' && chars.peek().is_some_and(|next| starts_tag(*next)) {
            // An unclosed tag swallows the rest of the input.
            for inner in chars.by_ref() {
                if inner == '>' {
                    break;
                }
            }
            continue;
        }
        if ch.is_control() && ch != '\n' && ch != '\t' {
            continue;
        }
        output.push(ch);
    }
    output.trim().to_string()
}

fn starts_tag(ch: char) -> bool {
    ch.is_ascii_alphabetic() || matches!(ch, '/' | '!' | '?')
}

/// Unrecognized or malformed values fall back to `url` without an error.
pub fn resolve_format(input: &Map<String, Value>) -> ResponseFormat {
    let Some(Value::String(raw)) = input.get(FORMAT_FIELD) else {
        return ResponseFormat::Url;
    };
    match sanitize(raw).to_lowercase().as_str() {
        "b64_json" => ResponseFormat::B64Json,
        _ => ResponseFormat::Url,
    }
}

pub fn require_prompt(
    input: &Map<String, Value>,
    max_chars: usize,
) -> Result<String, GenerationError> {
    let raw = match input.get(PROMPT_FIELD) {
        None | Some(Value::Null) => return Err(GenerationError::MissingInput),
        Some(Value::String(raw)) => raw,
        Some(_) => {
            return Err(GenerationError::InvalidInput(
                "prompt must be a string".to_string(),
            ));
        }
    };
    let prompt = sanitize(raw);
    if prompt.is_empty() {
        return Err(GenerationError::MissingInput);
    }
    let length = prompt.chars().count();
    if length > max_chars {
        return Err(GenerationError::InvalidInput(format!(
            "prompt is {length} characters; the limit is {max_chars}"
        )));
    }
    Ok(prompt)
}
