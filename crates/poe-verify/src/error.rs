use thiserror::Error;

use crate::fetch::FetchError;

/// Error types for proof verification
#[derive(Error, Debug)]
pub enum Error {
    /// The proof names a digest family that is not supported
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// A required proof field is missing or invalid
    #[error("Malformed proof: {0}")]
    MalformedProof(String),
    /// A digest is not valid hex
    #[error("Malformed digest: {0}")]
    MalformedDigest(String),
    /// A collaborator failed to retrieve data or a transaction
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    /// Failed to read a proof document
    #[error("Failed to read proof document: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to decode a proof document
    #[error("Failed to decode proof document: {0}")]
    Json(#[from] serde_json::Error),
}
