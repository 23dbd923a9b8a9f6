//! Proof document format and the validated [`Proof`] built from it.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::hash::{digest, HashAlgorithm};

/// One step of an inclusion branch: a sibling digest and the side it sits on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofStep {
    /// Sibling is the left child, the running hash the right one
    Left(String),
    /// Sibling is the right child, the running hash the left one
    Right(String),
}

/// Leaf of the recomputed Merkle tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    /// Payload hashed with the proof's algorithm to obtain the leaf digest
    RawData(Vec<u8>),
    /// Leaf digest used verbatim
    Digest(String),
}

impl Leaf {
    /// Digest of the leaf under `algorithm`
    pub fn digest(&self, algorithm: HashAlgorithm) -> String {
        match self {
            Leaf::RawData(payload) => digest(algorithm, payload),
            Leaf::Digest(digest) => digest.clone(),
        }
    }
}

/// Anchoring details: digest family, anchored root and anchoring transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

/// Target leaf and its inclusion branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_hash: Option<String>,
    #[serde(default)]
    pub target_proof: Vec<ProofStep>,
}

/// Leaf as found in a document: a bare digest or a `{ "data": ... }` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentLeaf {
    Digest(String),
    Record { data: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofExtras {
    #[serde(default)]
    pub leaves: Vec<DocumentLeaf>,
    #[serde(
        default,
        rename = "dataUrl",
        alias = "data_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_url: Option<String>,
}

/// Proof document as stored on disk or served by the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofDocument {
    #[serde(default)]
    pub header: ProofHeader,
    #[serde(default)]
    pub target: ProofTarget,
    #[serde(default)]
    pub extras: ProofExtras,
}

impl ProofDocument {
    /// Decode a JSON proof document, unwrapping an outer `{ "proof": ... }` envelope if present.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(inner) = value.get_mut("proof") {
            value = inner.take();
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// A validated proof. Never mutated by the verification routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub hash_algorithm: HashAlgorithm,
    pub merkle_root: String,
    pub transaction_id: String,
    pub target_hash: String,
    pub target_proof: Vec<ProofStep>,
    pub leaves: Vec<Leaf>,
    pub data_location: Option<String>,
}

impl Proof {
    /// Validate a document, applying defaults for absent optional fields.
    pub fn from_document(document: ProofDocument) -> Result<Self, Error> {
        let ProofDocument {
            header,
            target,
            extras,
        } = document;

        let hash_algorithm = match header.hash_type {
            Some(name) => HashAlgorithm::from_str(&name)?,
            None => HashAlgorithm::default(),
        };
        let merkle_root = required(header.merkle_root, "header.merkle_root")?;
        let transaction_id = required(header.tx_id, "header.tx_id")?;
        let target_hash = required(target.target_hash, "target.target_hash")?;

        let leaves = extras
            .leaves
            .into_iter()
            .map(|leaf| match leaf {
                DocumentLeaf::Digest(digest) => Leaf::Digest(digest),
                DocumentLeaf::Record { data } => Leaf::RawData(data.into_bytes()),
            })
            .collect();

        Ok(Self {
            hash_algorithm,
            merkle_root,
            transaction_id,
            target_hash,
            target_proof: target.target_proof,
            leaves,
            data_location: extras.data_url,
        })
    }

    /// Decode and validate a JSON proof document
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Self::from_document(ProofDocument::from_json(json)?)
    }

    /// Leaf digests in tree order
    pub fn leaf_digests(&self) -> Vec<String> {
        self.leaves
            .iter()
            .map(|leaf| leaf.digest(self.hash_algorithm))
            .collect()
    }

    /// Hash of the registered data, carried by the first leaf.
    ///
    /// A raw first leaf holds the legacy hex digest as its payload. Returns `None` when the
    /// proof has no leaves or the payload is not text.
    pub fn data_hash(&self) -> Option<&str> {
        match self.leaves.first()? {
            Leaf::RawData(payload) => std::str::from_utf8(payload).ok(),
            Leaf::Digest(digest) => Some(digest.as_str()),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, Error> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MalformedProof(format!("{field} is missing"))),
    }
}

/// Read and validate a JSON proof document from `path`
pub fn load_proof(path: &Path) -> Result<Proof, Error> {
    info!("Loading proof from {}", path.display());
    let json = std::fs::read_to_string(path)?;
    Proof::from_json(&json)
}
