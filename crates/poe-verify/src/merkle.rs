//! Merkle tree recomputation and inclusion branch verification.
//!
//! Internal nodes hash the concatenated bytes of their children with the proof's digest
//! family. A node left without a sibling at the end of a level is promoted unchanged, which
//! is the shape assumed by the `{left}/{right}` inclusion branches found in proofs.

use tracing::debug;

use crate::error::Error;
use crate::hash::{digest, digest_bytes, HashAlgorithm};
use crate::proof::ProofStep;

/// Hash two child nodes into their parent
pub fn hash_pair(algorithm: HashAlgorithm, left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(left.len() + right.len());
    data.extend_from_slice(left);
    data.extend_from_slice(right);
    digest_bytes(algorithm, &data)
}

/// Decode a hex digest, accepting either case
pub fn decode_digest(digest: &str) -> Result<Vec<u8>, Error> {
    hex::decode(digest.trim()).map_err(|_| Error::MalformedDigest(digest.to_string()))
}

/// Compute the root of the tree built over `leaves`, in the given order.
///
/// An empty tree has the digest of the empty string as root, a single leaf is its own root.
pub fn merkle_root(algorithm: HashAlgorithm, leaves: &[String]) -> Result<String, Error> {
    if leaves.is_empty() {
        return Ok(digest(algorithm, &[]));
    }

    let mut level = leaves
        .iter()
        .map(|leaf| decode_digest(leaf))
        .collect::<Result<Vec<_>, _>>()?;

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|chunk| match chunk {
                [left, right] => hash_pair(algorithm, left, right),
                [single] => single.clone(),
                _ => unreachable!("Chunk size is at most 2"),
            })
            .collect();
    }

    Ok(hex::encode(&level[0]))
}

/// Check that walking `steps` from `target_hash` ends at `merkle_root`.
///
/// With no steps the target must equal the root exactly. Malformed digests never verify.
pub fn verify_inclusion(
    algorithm: HashAlgorithm,
    target_hash: &str,
    merkle_root: &str,
    steps: &[ProofStep],
) -> bool {
    if steps.is_empty() {
        return target_hash == merkle_root;
    }

    match fold_branch(algorithm, target_hash, steps) {
        Ok(root) => root.eq_ignore_ascii_case(merkle_root.trim()),
        Err(err) => {
            debug!("Inclusion branch cannot be evaluated: {}", err);
            false
        }
    }
}

fn fold_branch(
    algorithm: HashAlgorithm,
    target_hash: &str,
    steps: &[ProofStep],
) -> Result<String, Error> {
    let mut current = decode_digest(target_hash)?;
    for step in steps {
        current = match step {
            ProofStep::Left(sibling) => hash_pair(algorithm, &decode_digest(sibling)?, &current),
            ProofStep::Right(sibling) => hash_pair(algorithm, &current, &decode_digest(sibling)?),
        };
    }
    Ok(hex::encode(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALG: HashAlgorithm = HashAlgorithm::Sha256;

    fn leaves(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| digest(ALG, format!("leaf-{i}").as_bytes()))
            .collect()
    }

    /// Build the inclusion branch of `leaves[index]`, mirroring the tree shape above.
    fn build_branch(leaves: &[String], mut index: usize) -> Vec<ProofStep> {
        let mut level: Vec<Vec<u8>> = leaves.iter().map(|l| hex::decode(l).unwrap()).collect();
        let mut steps = Vec::new();
        while level.len() > 1 {
            if index % 2 == 1 {
                steps.push(ProofStep::Left(hex::encode(&level[index - 1])));
            } else if index + 1 < level.len() {
                steps.push(ProofStep::Right(hex::encode(&level[index + 1])));
            }
            level = level
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hash_pair(ALG, left, right),
                    [single] => single.clone(),
                    _ => unreachable!(),
                })
                .collect();
            index /= 2;
        }
        steps
    }

    #[test]
    fn test_degenerate_trees() {
        let empty = merkle_root(ALG, &[]).unwrap();
        assert_eq!(empty, merkle_root(ALG, &[]).unwrap());
        assert_eq!(empty, digest(ALG, b""));

        let single = leaves(1);
        assert_eq!(merkle_root(ALG, &single).unwrap(), single[0]);
        assert_eq!(
            merkle_root(ALG, &single).unwrap(),
            merkle_root(ALG, &single).unwrap()
        );
    }

    #[test]
    fn test_single_leaf_root_is_lowercase() {
        let leaf = leaves(1)[0].to_uppercase();
        assert_eq!(merkle_root(ALG, &[leaf.clone()]).unwrap(), leaf.to_lowercase());
    }

    #[test]
    fn test_two_leaves() {
        let l = leaves(2);
        let expected = hex::encode(hash_pair(
            ALG,
            &hex::decode(&l[0]).unwrap(),
            &hex::decode(&l[1]).unwrap(),
        ));
        assert_eq!(merkle_root(ALG, &l).unwrap(), expected);
    }

    #[test]
    fn test_odd_leaf_is_promoted() {
        let l = leaves(3);
        let bytes: Vec<Vec<u8>> = l.iter().map(|x| hex::decode(x).unwrap()).collect();
        let left = hash_pair(ALG, &bytes[0], &bytes[1]);
        let expected = hex::encode(hash_pair(ALG, &left, &bytes[2]));
        assert_eq!(merkle_root(ALG, &l).unwrap(), expected);
    }

    #[test]
    fn test_order_matters() {
        let l = leaves(4);
        let mut reversed = l.clone();
        reversed.reverse();
        assert_ne!(
            merkle_root(ALG, &l).unwrap(),
            merkle_root(ALG, &reversed).unwrap()
        );
    }

    #[test]
    fn test_malformed_leaf() {
        let err = merkle_root(ALG, &["not hex".to_string(), leaves(1)[0].clone()]).unwrap_err();
        assert!(matches!(err, Error::MalformedDigest(_)));
    }

    #[test]
    fn test_empty_branch_law() {
        let h = leaves(1)[0].clone();
        assert!(verify_inclusion(ALG, &h, &h, &[]));
        assert!(!verify_inclusion(ALG, &h, &leaves(2)[1], &[]));
        // Exact comparison, no case folding for the empty branch
        assert!(!verify_inclusion(ALG, &h, &h.to_uppercase(), &[]));
    }

    #[test]
    fn test_branches_verify_against_true_root_only() {
        for size in 1..=9 {
            let l = leaves(size);
            let root = merkle_root(ALG, &l).unwrap();
            let other_root = digest(ALG, b"some other root");
            for index in 0..size {
                let branch = build_branch(&l, index);
                assert!(
                    verify_inclusion(ALG, &l[index], &root, &branch),
                    "leaf {index} of {size} must verify"
                );
                if !branch.is_empty() {
                    assert!(!verify_inclusion(ALG, &l[index], &other_root, &branch));
                }
            }
        }
    }

    #[test]
    fn test_wrong_orientation_fails() {
        let l = leaves(2);
        let root = merkle_root(ALG, &l).unwrap();
        assert!(verify_inclusion(
            ALG,
            &l[0],
            &root,
            &[ProofStep::Right(l[1].clone())]
        ));
        assert!(!verify_inclusion(
            ALG,
            &l[0],
            &root,
            &[ProofStep::Left(l[1].clone())]
        ));
    }

    #[test]
    fn test_malformed_sibling_does_not_verify() {
        let l = leaves(2);
        let root = merkle_root(ALG, &l).unwrap();
        assert!(!verify_inclusion(
            ALG,
            &l[0],
            &root,
            &[ProofStep::Right("zz".to_string())]
        ));
    }
}
