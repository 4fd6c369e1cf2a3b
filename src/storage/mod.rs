pub mod fetch;
pub mod local;
pub mod records;

pub use fetch::{fetch_image_bytes, validate_http_url};
pub use local::LocalImageStorage;
pub use records::{GenerationRecord, GenerationStore, NewGenerationRecord};
