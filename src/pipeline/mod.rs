pub mod crop;
pub mod extractor;
pub mod scale;
pub mod tracking;
pub mod writer;

// Re-exports for convenience
pub use extractor::{ExtractorConfig, HandImageExtractor};
