//! Digest families a proof can select, and the legacy data hash rule.
//!
//! Older proofs were issued before the digest family became configurable: the registered
//! data was identified by its SHA-1 digest. Every data hash derived from raw bytes therefore
//! goes through SHA-1 first and the configured family second, see [`data_digest`].

use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::{ripemd160, sha1, Hash};
use blake2::{Blake2b512, Blake2s256};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::error::Error;

/// Digest family used by a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_512,
    Blake2b512,
    Blake2s256,
    Ripemd160,
}

impl HashAlgorithm {
    /// Canonical (normalized) name of the family
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha3_256 => "sha3256",
            HashAlgorithm::Sha3_512 => "sha3512",
            HashAlgorithm::Blake2b512 => "blake2b512",
            HashAlgorithm::Blake2s256 => "blake2s256",
            HashAlgorithm::Ripemd160 => "ripemd160",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    /// Parse an algorithm name, ignoring case and hyphens ("SHA-256" == "sha256").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "").to_lowercase();
        match normalized.as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "sha3256" => Ok(HashAlgorithm::Sha3_256),
            "sha3512" => Ok(HashAlgorithm::Sha3_512),
            "blake2b512" => Ok(HashAlgorithm::Blake2b512),
            "blake2s256" => Ok(HashAlgorithm::Blake2s256),
            "ripemd160" => Ok(HashAlgorithm::Ripemd160),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute the raw digest of `bytes`
pub fn digest_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha1 => sha1::Hash::hash(bytes).to_byte_array().to_vec(),
        HashAlgorithm::Sha224 => Sha224::digest(bytes).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(bytes).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
        HashAlgorithm::Sha3_256 => Sha3_256::digest(bytes).to_vec(),
        HashAlgorithm::Sha3_512 => Sha3_512::digest(bytes).to_vec(),
        HashAlgorithm::Blake2b512 => Blake2b512::digest(bytes).to_vec(),
        HashAlgorithm::Blake2s256 => Blake2s256::digest(bytes).to_vec(),
        HashAlgorithm::Ripemd160 => ripemd160::Hash::hash(bytes).to_byte_array().to_vec(),
    }
}

/// Compute the lowercase hex digest of `bytes`
pub fn digest(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    hex::encode(digest_bytes(algorithm, bytes))
}

/// SHA-1 hex digest identifying registered data in legacy proofs
pub fn legacy_digest(bytes: &[u8]) -> String {
    digest(HashAlgorithm::Sha1, bytes)
}

/// Data hash of raw bytes: the hex text of the legacy digest, hashed again with `algorithm`.
pub fn data_digest(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    digest(algorithm, legacy_digest(bytes).as_bytes())
}
