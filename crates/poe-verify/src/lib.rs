//! Proof of existence verification library
//!
//! This crate re-derives every claim made by an anchoring proof: the Merkle tree built
//! from the proof leaves, the inclusion branch leading to the anchored root, the hash of
//! the registered data, and the presence of the root in a blockchain transaction.

pub mod error;
pub mod fetch;
pub mod hash;
pub mod merkle;
pub mod proof;
pub mod transaction;
pub mod verify;

pub use error::Error;
pub use fetch::{DataFetcher, FetchError, TransactionFetcher};
pub use hash::HashAlgorithm;
pub use proof::{load_proof, Leaf, Proof, ProofDocument, ProofStep};
pub use transaction::{TransactionLookup, TransactionRecord};
pub use verify::{ProofVerifier, VerificationReport, VerifierConfig};
