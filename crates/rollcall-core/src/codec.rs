//! Template (de)serialization for the persistence edge.
//!
//! Templates cross the storage boundary as opaque blobs: 128 f32
//! values, little-endian, 4 bytes each. The encoding is internal to
//! this system — it only has to round-trip losslessly, not interoperate.

use crate::types::Template;
use thiserror::Error;

/// Embedding dimensionality fixed by the encoder model.
pub const TEMPLATE_DIM: usize = 128;

const BLOB_LEN: usize = TEMPLATE_DIM * 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("corrupt template blob: expected {expected} bytes, got {actual}")]
    CorruptTemplate { expected: usize, actual: usize },
}

/// Serialize a template to its storage blob.
pub fn encode(template: &Template) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(template.values.len() * 4);
    for v in &template.values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Deserialize a storage blob back into a template.
///
/// Rejects anything that is not exactly [`TEMPLATE_DIM`] little-endian
/// f32 values.
pub fn decode(bytes: &[u8]) -> Result<Template, CodecError> {
    if bytes.len() != BLOB_LEN {
        return Err(CodecError::CorruptTemplate {
            expected: BLOB_LEN,
            actual: bytes.len(),
        });
    }

    let values = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(Template { values })
}
