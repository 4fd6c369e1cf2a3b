pub mod config;
pub mod error;
pub mod generator;
pub mod provider;
pub mod routes;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, ServiceConfig};
pub use error::GenerationError;
pub use generator::{GenerationOutput, ImageGenerator, RequestMethod, SavedImage};
pub use validation::ResponseFormat;
