// hasher.rs — Content hashing and constant-time digest verification.
//
// Content is hashed at most once per algorithm per verification, even when
// the metadata lists the same algorithm several times. Expected and actual
// digests are compared with `subtle` so the comparison time does not depend
// on where the first differing byte sits.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::sri::{encode_digest, Algorithm, SriEntry};

/// Hash arbitrary bytes with the given algorithm, returning the raw digest.
///
/// This is deterministic: the same input always produces the same output.
pub fn hash_bytes(algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        Algorithm::Sha256 => Sha256::digest(data).to_vec(),
        Algorithm::Sha384 => Sha384::digest(data).to_vec(),
        Algorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Produce integrity metadata (`sha384-...`) describing `data`.
pub fn digest_sri(algorithm: Algorithm, data: &[u8]) -> String {
    format!("{}-{}", algorithm, encode_digest(&hash_bytes(algorithm, data)))
}

/// Exact byte equality that does not short-circuit on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}

/// Outcome of checking content against a list of integrity entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Index of the first entry the content satisfied, if any.
    pub matched: Option<usize>,
    /// Base64 digests actually computed for the content, per algorithm.
    /// Only algorithms that were tried appear here.
    pub computed: BTreeMap<Algorithm, String>,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

/// Check `content` against every entry, stopping at the first match.
pub fn verify(entries: &[SriEntry], content: &[u8]) -> Verification {
    let mut digests: BTreeMap<Algorithm, Vec<u8>> = BTreeMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let actual = digests
            .entry(entry.algorithm)
            .or_insert_with(|| hash_bytes(entry.algorithm, content));
        if constant_time_eq(actual, entry.expected()) {
            return Verification {
                matched: Some(index),
                computed: encode_all(&digests),
            };
        }
    }

    Verification {
        matched: None,
        computed: encode_all(&digests),
    }
}

fn encode_all(digests: &BTreeMap<Algorithm, Vec<u8>>) -> BTreeMap<Algorithm, String> {
    digests
        .iter()
        .map(|(algorithm, bytes)| (*algorithm, encode_digest(bytes)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sri::parse;

    #[test]
    fn hash_determinism() {
        let input = b"hello world";
        for algorithm in Algorithm::ALL {
            assert_eq!(hash_bytes(algorithm, input), hash_bytes(algorithm, input));
        }
    }

    #[test]
    fn digest_lengths_match_algorithm() {
        for algorithm in Algorithm::ALL {
            assert_eq!(hash_bytes(algorithm, b"x").len(), algorithm.digest_len());
        }
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("") = 47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU= in base64.
        assert_eq!(
            digest_sri(Algorithm::Sha256, b""),
            "sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn verify_accepts_any_matching_entry() {
        let content = b"export default 42;\n";
        let good = digest_sri(Algorithm::Sha384, content);
        let metadata = format!("sha256-AAAA {good}");
        let entries = parse(&metadata).unwrap();

        let verification = verify(&entries, content);
        assert_eq!(verification.matched, Some(1));
        assert!(verification.is_match());
    }

    #[test]
    fn verify_reports_computed_digests_on_mismatch() {
        let content = b"console.log('tampered')";
        let entries = parse("sha256-AAAA sha512-BBBB sha256-CCCC").unwrap();

        let verification = verify(&entries, content);
        assert!(!verification.is_match());
        assert_eq!(verification.computed.len(), 2);
        assert_eq!(
            verification.computed[&Algorithm::Sha256],
            encode_digest(&hash_bytes(Algorithm::Sha256, content))
        );
        assert!(verification.computed.contains_key(&Algorithm::Sha512));
    }

    #[test]
    fn verify_requires_exact_bytes() {
        let content = b"abc";
        let mut digest = hash_bytes(Algorithm::Sha256, content);
        // A truncated or extended digest must not match.
        let truncated = format!("sha256-{}", encode_digest(&digest[..31]));
        digest.push(0);
        let extended = format!("sha256-{}", encode_digest(&digest));

        assert!(!verify(&parse(&truncated).unwrap(), content).is_match());
        assert!(!verify(&parse(&extended).unwrap(), content).is_match());
    }

    #[test]
    fn verify_with_no_entries_never_matches() {
        let verification = verify(&[], b"anything");
        assert!(!verification.is_match());
        assert!(verification.computed.is_empty());
    }

    #[test]
    fn constant_time_eq_checks_length() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
