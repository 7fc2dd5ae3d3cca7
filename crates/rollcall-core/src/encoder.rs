//! Boundary to the external neural encoder.
//!
//! The encoder is an injected capability: constructed once at process
//! start, owned by whoever drives the pipeline, and passed into the
//! selection and live-encoding paths. It is the slow, possibly-hanging
//! dependency — caller-imposed timeouts belong around these calls, not
//! around the matching or scoring arithmetic.

use crate::types::{Detection, Region, Template};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("could not decode image: {0}")]
    InvalidImage(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("embedding failed for requested region")]
    EmbeddingFailed,
}

/// Face detection and embedding extraction over encoded image bytes
/// (PNG/JPEG as captured upstream).
pub trait FaceEncoder {
    /// Find all faces in an image. An empty result is an ordinary
    /// outcome, not an error.
    fn detect(&mut self, image: &[u8]) -> Result<Vec<Detection>, EncoderError>;

    /// Extract a template for exactly the given region of the image.
    fn embed(&mut self, image: &[u8], region: &Region) -> Result<Template, EncoderError>;
}
