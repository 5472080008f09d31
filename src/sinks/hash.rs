use crate::errors::SinkError;
use crate::scenario::Category;
use crate::sinks::{Evidence, Exposure, Outcome, SinkAdapter, SinkInvocation};
use md5::Md5;
use sha2::{Digest, Sha256};

/// Digest sink. The detection signal is the algorithm identifier itself:
/// MD5 is collision-weak, SHA-256 is the resistant alternative. Both paths
/// succeed for any input; only the algorithm differs.
pub struct HashSink;

impl HashSink {
    pub fn new() -> Self {
        Self
    }
}

impl SinkAdapter for HashSink {
    fn category(&self) -> Category {
        Category::WeakHash
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let digest = hex::encode(Md5::digest(input.as_bytes()));
        Ok(SinkInvocation {
            category: Category::WeakHash,
            exposure: Exposure::Unsafe,
            raw_input: input.to_owned(),
            payload: format!("md5({input})"),
            outcome: Outcome::Value(digest),
            evidence: Evidence::DigestAlgorithm {
                name: "md5",
                weak: true,
            },
        })
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let digest = hex::encode(Sha256::digest(input.as_bytes()));
        Ok(SinkInvocation {
            category: Category::WeakHash,
            exposure: Exposure::Safe,
            raw_input: input.to_owned(),
            payload: format!("sha256({input})"),
            outcome: Outcome::Value(digest),
            evidence: Evidence::DigestAlgorithm {
                name: "sha256",
                weak: false,
            },
        })
    }
}

#[test]
fn md5_is_flagged_weak_and_produces_a_16_byte_digest() {
    let inv = HashSink::new().invoke_unsafe("mySuperSecretPa$$w0rd").unwrap();
    assert!(inv.evidence.injection_observed());
    match inv.outcome {
        Outcome::Value(ref hex) => assert_eq!(hex.len(), 32),
        ref other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn sha256_is_not_flagged_and_produces_a_32_byte_digest() {
    let inv = HashSink::new().invoke_safe("mySuperSecretPa$$w0rd").unwrap();
    assert!(!inv.evidence.injection_observed());
    match inv.outcome {
        Outcome::Value(ref hex) => assert_eq!(hex.len(), 64),
        ref other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn digests_are_deterministic() {
    let a = HashSink::new().invoke_unsafe("same-input").unwrap();
    let b = HashSink::new().invoke_unsafe("same-input").unwrap();
    assert_eq!(a.outcome, b.outcome);
}
