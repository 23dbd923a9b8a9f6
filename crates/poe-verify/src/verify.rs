//! Verification of a single proof: the four independent checks and their aggregation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::fetch::{with_timeout, DataFetcher, TransactionFetcher};
use crate::hash::{data_digest, digest};
use crate::merkle::{merkle_root, verify_inclusion};
use crate::proof::Proof;
use crate::transaction::{self, TransactionCache, TransactionLookup};

/// Default registry endpoint serving registered data by legacy digest
pub const DEFAULT_DATA_BASE_URL: &str = "https://api.binded.com/v1/registrations/sha1";

/// Configuration parameters controlling verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Base URL used to derive the data location when the proof carries none
    pub data_base_url: String,
    /// Limit applied to each network fetch, none means wait indefinitely
    pub fetch_timeout: Option<Duration>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            data_base_url: DEFAULT_DATA_BASE_URL.to_string(),
            fetch_timeout: None,
        }
    }
}

/// Outcome of a full proof analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Leaves hash up to the target hash
    pub target_hash_valid: bool,
    /// Inclusion branch leads from the target hash to the merkle root
    pub merkle_root_valid: bool,
    /// Data at the data location matches the proof's data hash
    pub data_hash_valid: bool,
    /// Anchoring transaction carries the merkle root
    pub transaction_valid: bool,
    /// Confirmations of the anchoring transaction
    pub confirmations: u64,
    /// All four checks passed
    pub overall_valid: bool,
}

impl VerificationReport {
    pub fn new(
        target_hash_valid: bool,
        merkle_root_valid: bool,
        data_hash_valid: bool,
        transaction_valid: bool,
        confirmations: u64,
    ) -> Self {
        Self {
            target_hash_valid,
            merkle_root_valid,
            data_hash_valid,
            transaction_valid,
            confirmations,
            overall_valid: target_hash_valid
                && merkle_root_valid
                && data_hash_valid
                && transaction_valid,
        }
    }
}

/// Verifies one proof.
///
/// Each check can be run on its own. The anchoring transaction is fetched at most once per
/// verifier, whichever checks need it and however many times [`ProofVerifier::analyze`] runs.
pub struct ProofVerifier {
    proof: Proof,
    config: VerifierConfig,
    data_location: String,
    data_fetcher: Arc<dyn DataFetcher>,
    transaction_fetcher: Arc<dyn TransactionFetcher>,
    transaction: TransactionCache,
}

impl ProofVerifier {
    /// Create a verifier, resolving the data location.
    ///
    /// Fails with [`Error::MalformedProof`] when the proof has neither a data location nor a
    /// first leaf to derive one from.
    pub fn new(
        proof: Proof,
        config: VerifierConfig,
        data_fetcher: Arc<dyn DataFetcher>,
        transaction_fetcher: Arc<dyn TransactionFetcher>,
    ) -> Result<Self, Error> {
        let data_location = match (&proof.data_location, proof.data_hash()) {
            (Some(location), _) => location.clone(),
            (None, Some(data_hash)) => format!(
                "{}/{}/download",
                config.data_base_url.trim_end_matches('/'),
                data_hash
            ),
            (None, None) => {
                return Err(Error::MalformedProof(
                    "no data location and no leaf to derive it from".to_string(),
                ))
            }
        };
        debug!("Data location: {}", data_location);

        Ok(Self {
            proof,
            config,
            data_location,
            data_fetcher,
            transaction_fetcher,
            transaction: TransactionCache::new(),
        })
    }

    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    /// Location the registered data is fetched from
    pub fn data_location(&self) -> &str {
        &self.data_location
    }

    /// Check that the tree recomputed from the leaves has the target hash as root
    pub fn is_target_hash_valid(&self) -> bool {
        let leaves = self.proof.leaf_digests();
        match merkle_root(self.proof.hash_algorithm, &leaves) {
            Ok(root) => root.eq_ignore_ascii_case(self.proof.target_hash.trim()),
            Err(err) => {
                warn!("Cannot recompute merkle tree from leaves: {}", err);
                false
            }
        }
    }

    /// Check that the inclusion branch leads from the target hash to the merkle root
    pub fn is_merkle_root_valid(&self) -> bool {
        verify_inclusion(
            self.proof.hash_algorithm,
            &self.proof.target_hash,
            &self.proof.merkle_root,
            &self.proof.target_proof,
        )
    }

    /// Check that the data found at the data location hashes to the proof's data hash.
    ///
    /// Fetch failures are returned as errors, not as an invalid verdict.
    pub async fn is_data_hash_valid(&self) -> Result<bool, Error> {
        let Some(data_hash) = self.proof.data_hash() else {
            warn!("Proof has no data hash to compare against");
            return Ok(false);
        };

        debug!("Fetching data from {} ...", self.data_location);
        let data = with_timeout(
            self.config.fetch_timeout,
            "data fetch",
            self.data_fetcher.fetch(&self.data_location),
        )
        .await?;

        let algorithm = self.proof.hash_algorithm;
        let expected = digest(algorithm, data_hash.as_bytes());
        let actual = data_digest(algorithm, &data);
        debug!("Data hash: expected {}, actual {}", expected, actual);
        Ok(expected == actual)
    }

    async fn lookup_transaction(&self) -> Result<&TransactionLookup, Error> {
        if self.transaction.get().is_some() {
            debug!("Transaction {} already looked up", self.proof.transaction_id);
        }
        let lookup = self
            .transaction
            .get_or_fetch(
                self.transaction_fetcher.as_ref(),
                &self.proof.transaction_id,
                self.config.fetch_timeout,
            )
            .await?;
        Ok(lookup)
    }

    /// Check that the anchoring transaction has an output ending with the merkle root.
    ///
    /// A transaction that does not exist is reported as invalid.
    pub async fn is_transaction_valid(&self) -> Result<bool, Error> {
        Ok(match self.lookup_transaction().await? {
            TransactionLookup::Found(tx) => transaction::is_anchored(tx, &self.proof.merkle_root),
            TransactionLookup::NotFound => false,
        })
    }

    /// Confirmations of the anchoring transaction, zero if it does not exist
    pub async fn confirmations(&self) -> Result<u64, Error> {
        Ok(match self.lookup_transaction().await? {
            TransactionLookup::Found(tx) => transaction::confirmations(tx),
            TransactionLookup::NotFound => 0,
        })
    }

    /// Run all checks and aggregate them into a report.
    ///
    /// The checks run concurrently; the first error aborts the analysis.
    pub async fn analyze(&self) -> Result<VerificationReport, Error> {
        info!(
            "Analyzing proof anchored in transaction {} ...",
            self.proof.transaction_id
        );

        let (target_hash_valid, merkle_root_valid, data_hash_valid, transaction_valid) =
            tokio::try_join!(
                async { Ok::<_, Error>(self.is_target_hash_valid()) },
                async { Ok::<_, Error>(self.is_merkle_root_valid()) },
                self.is_data_hash_valid(),
                self.is_transaction_valid(),
            )?;
        let confirmations = self.confirmations().await?;

        let report = VerificationReport::new(
            target_hash_valid,
            merkle_root_valid,
            data_hash_valid,
            transaction_valid,
            confirmations,
        );
        info!(
            "Analysis done: target hash {}, merkle root {}, data hash {}, transaction {}, {} confirmations",
            target_hash_valid, merkle_root_valid, data_hash_valid, transaction_valid, confirmations
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, MockDataFetcher, MockTransactionFetcher};
    use crate::hash::{legacy_digest, HashAlgorithm};
    use crate::proof::Leaf;
    use crate::transaction::TransactionRecord;

    const DATA: &[u8] = b"registered file contents";

    fn proof() -> Proof {
        let data_hash = legacy_digest(DATA);
        let leaf = digest(HashAlgorithm::Sha256, data_hash.as_bytes());
        Proof {
            hash_algorithm: HashAlgorithm::Sha256,
            merkle_root: leaf.clone(),
            transaction_id: "txid".to_string(),
            target_hash: leaf,
            target_proof: vec![],
            leaves: vec![Leaf::RawData(data_hash.into_bytes())],
            data_location: None,
        }
    }

    fn data_fetcher() -> MockDataFetcher {
        let mut fetcher = MockDataFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(DATA.to_vec()));
        fetcher
    }

    fn anchored(root: &str) -> TransactionRecord {
        TransactionRecord {
            outputs: vec![format!("6a20{root}")],
            confirmations: 7,
        }
    }

    fn verifier(
        proof: Proof,
        data: MockDataFetcher,
        tx: MockTransactionFetcher,
    ) -> ProofVerifier {
        ProofVerifier::new(proof, VerifierConfig::default(), Arc::new(data), Arc::new(tx)).unwrap()
    }

    #[test]
    fn test_derived_data_location() {
        let proof = proof();
        let expected = format!(
            "{}/{}/download",
            DEFAULT_DATA_BASE_URL,
            legacy_digest(DATA)
        );
        let v = verifier(proof, MockDataFetcher::new(), MockTransactionFetcher::new());
        assert_eq!(v.data_location(), expected);
    }

    #[test]
    fn test_configured_data_base_url() {
        let config = VerifierConfig {
            data_base_url: "http://localhost:8080/files/".to_string(),
            fetch_timeout: None,
        };
        let v = ProofVerifier::new(
            proof(),
            config,
            Arc::new(MockDataFetcher::new()),
            Arc::new(MockTransactionFetcher::new()),
        )
        .unwrap();
        assert_eq!(
            v.data_location(),
            format!("http://localhost:8080/files/{}/download", legacy_digest(DATA))
        );
    }

    #[test]
    fn test_explicit_data_location() {
        let mut proof = proof();
        proof.data_location = Some("http://localhost/file".to_string());
        let v = verifier(proof, MockDataFetcher::new(), MockTransactionFetcher::new());
        assert_eq!(v.data_location(), "http://localhost/file");
    }

    #[test]
    fn test_no_data_location_is_malformed() {
        let mut proof = proof();
        proof.leaves.clear();
        let res = ProofVerifier::new(
            proof,
            VerifierConfig::default(),
            Arc::new(MockDataFetcher::new()),
            Arc::new(MockTransactionFetcher::new()),
        );
        assert!(matches!(res, Err(Error::MalformedProof(_))));
    }

    #[tokio::test]
    async fn test_data_hash_without_leaves_skips_fetch() {
        let mut proof = proof();
        proof.leaves.clear();
        proof.data_location = Some("http://localhost/file".to_string());
        let mut data = MockDataFetcher::new();
        data.expect_fetch().never();
        let v = verifier(proof, data, MockTransactionFetcher::new());
        assert!(!v.is_data_hash_valid().await.unwrap());
    }

    #[tokio::test]
    async fn test_confirmations_share_transaction_fetch() {
        let proof = proof();
        let root = proof.merkle_root.clone();
        let mut tx = MockTransactionFetcher::new();
        tx.expect_fetch()
            .withf(|id| id.to_string() == "txid")
            .times(1)
            .returning(move |_| Ok(anchored(&root)));

        let v = verifier(proof, data_fetcher(), tx);
        assert!(v.transaction.get().is_none());
        assert!(v.is_transaction_valid().await.unwrap());
        assert!(matches!(
            v.transaction.get(),
            Some(TransactionLookup::Found(_))
        ));
        assert_eq!(v.confirmations().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_analyze_twice_fetches_transaction_once() {
        let proof = proof();
        let root = proof.merkle_root.clone();
        let mut tx = MockTransactionFetcher::new();
        tx.expect_fetch()
            .times(1)
            .returning(move |_| Ok(anchored(&root)));
        let mut data = MockDataFetcher::new();
        data.expect_fetch().times(2).returning(|_| Ok(DATA.to_vec()));

        let v = verifier(proof, data, tx);
        let first = v.analyze().await.unwrap();
        let second = v.analyze().await.unwrap();
        assert_eq!(first, second);
        assert!(first.overall_valid);
        assert_eq!(first.confirmations, 7);
    }

    #[tokio::test]
    async fn test_not_found_transaction() {
        let mut tx = MockTransactionFetcher::new();
        tx.expect_fetch()
            .times(1)
            .returning(|_| Err(FetchError::NotFound));

        let v = verifier(proof(), data_fetcher(), tx);
        let report = v.analyze().await.unwrap();
        assert!(!report.transaction_valid);
        assert_eq!(report.confirmations, 0);
        assert!(!report.overall_valid);
        assert!(report.target_hash_valid && report.merkle_root_valid && report.data_hash_valid);
    }

    #[tokio::test]
    async fn test_transaction_failure_propagates() {
        let mut tx = MockTransactionFetcher::new();
        tx.expect_fetch().returning(|_| {
            Err(FetchError::Failed {
                status: Some(502),
                body: "bad gateway".to_string(),
            })
        });

        let v = verifier(proof(), data_fetcher(), tx);
        let err = v.analyze().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::Failed {
                status: Some(502),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_data_fetch_failure_propagates() {
        let proof = proof();
        let root = proof.merkle_root.clone();
        let mut data = MockDataFetcher::new();
        data.expect_fetch().returning(|_| {
            Err(FetchError::Failed {
                status: Some(404),
                body: "missing".to_string(),
            })
        });
        let mut tx = MockTransactionFetcher::new();
        tx.expect_fetch().returning(move |_| Ok(anchored(&root)));

        let v = verifier(proof, data, tx);
        assert!(matches!(
            v.is_data_hash_valid().await,
            Err(Error::Fetch(FetchError::Failed { .. }))
        ));
        assert!(v.analyze().await.is_err());
    }

    #[tokio::test]
    async fn test_single_byte_mutation_is_detected() {
        let mut data = MockDataFetcher::new();
        data.expect_fetch().returning(|_| {
            let mut mutated = DATA.to_vec();
            mutated[0] ^= 0x01;
            Ok(mutated)
        });
        let v = verifier(proof(), data, MockTransactionFetcher::new());
        assert!(!v.is_data_hash_valid().await.unwrap());
    }

    #[tokio::test]
    async fn test_data_hash_valid() {
        let v = verifier(proof(), data_fetcher(), MockTransactionFetcher::new());
        assert!(v.is_data_hash_valid().await.unwrap());
    }

    #[test]
    fn test_malformed_leaf_is_invalid_target() {
        let mut proof = proof();
        proof.leaves.push(Leaf::Digest("xyz".to_string()));
        let v = verifier(proof, MockDataFetcher::new(), MockTransactionFetcher::new());
        assert!(!v.is_target_hash_valid());
    }

    #[test]
    fn test_report_overall_validity() {
        assert!(VerificationReport::new(true, true, true, true, 1).overall_valid);
        assert!(!VerificationReport::new(true, false, true, true, 1).overall_valid);
        assert!(!VerificationReport::new(true, true, true, false, 0).overall_valid);
    }
}
