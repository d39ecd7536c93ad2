// sri.rs — Subresource Integrity metadata parser.
//
// Grammar (per the W3C integrity attribute):
//
//   metadata = *WSP entry *( 1*WSP entry ) *WSP
//   entry    = algorithm "-" base64 [ "?" *VCHAR ]
//
// Entries come back in source order. No algorithm is preferred over
// another: callers try every entry and accept the content if any matches.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IntegrityError;

/// One entry of the metadata: whitespace prefix, algorithm, digest, options.
static SRI_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<ws>[\x20\x09]*)(?P<alg>sha256|sha384|sha512)-(?P<digest>[A-Za-z0-9+/]+={0,2})(?:\?(?P<opts>[\x21-\x7E]*))?",
    )
    .unwrap_or_else(|e| unreachable!("static SRI pattern: {e}"))
});

/// Padding is optional in policy files, so accept digests with or without it.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Hash algorithms accepted in integrity metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// Every supported algorithm, weakest first.
    pub const ALL: [Algorithm; 3] = [Algorithm::Sha256, Algorithm::Sha384, Algorithm::Sha512];

    /// The token used in metadata strings (e.g. "sha384").
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Length of the raw digest in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Algorithm::Sha256 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Algorithm::Sha256),
            "sha384" => Ok(Algorithm::Sha384),
            "sha512" => Ok(Algorithm::Sha512),
            other => Err(IntegrityError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// A single parsed `algorithm-digest[?options]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SriEntry {
    /// Which hash function produced the digest.
    pub algorithm: Algorithm,
    /// The digest exactly as written in the metadata (base64).
    pub digest: String,
    /// Anything after `?`, kept verbatim. No options are interpreted.
    pub options: Option<String>,
    expected: Vec<u8>,
}

impl SriEntry {
    /// Build an entry from its parts, decoding the base64 digest.
    ///
    /// A digest that fits the grammar but does not decode keeps no expected
    /// bytes, so no content ever matches it.
    pub fn new(algorithm: Algorithm, digest: impl Into<String>, options: Option<String>) -> Self {
        let digest = digest.into();
        let expected = LENIENT_BASE64.decode(&digest).unwrap_or_default();
        Self {
            algorithm,
            digest,
            options,
            expected,
        }
    }

    /// The decoded digest bytes the content must hash to.
    pub fn expected(&self) -> &[u8] {
        &self.expected
    }
}

impl fmt::Display for SriEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm, self.digest)?;
        if let Some(options) = &self.options {
            write!(f, "?{options}")?;
        }
        Ok(())
    }
}

/// Parse integrity metadata into its entries.
///
/// Fails with [`IntegrityError::Parse`] when an entry is malformed, when two
/// entries run together without whitespace, or when anything other than
/// whitespace trails the last entry.
pub fn parse(metadata: &str) -> Result<Vec<SriEntry>, IntegrityError> {
    let mut entries = Vec::new();
    let mut position = 0;

    for caps in SRI_ENTRY.captures_iter(metadata) {
        let whole = caps.get(0).ok_or(IntegrityError::Parse { position })?;
        if whole.start() != position {
            return Err(IntegrityError::Parse { position });
        }
        let separated = caps.name("ws").is_some_and(|ws| !ws.as_str().is_empty());
        if !entries.is_empty() && !separated {
            return Err(IntegrityError::Parse { position });
        }

        let algorithm = caps
            .name("alg")
            .ok_or(IntegrityError::Parse { position })?
            .as_str()
            .parse::<Algorithm>()?;
        let digest = caps
            .name("digest")
            .ok_or(IntegrityError::Parse { position })?
            .as_str();
        let options = caps.name("opts").map(|m| m.as_str().to_string());

        entries.push(SriEntry::new(algorithm, digest, options));
        position = whole.end();
    }

    let rest = &metadata[position..];
    if !rest.bytes().all(|b| b == b' ' || b == b'\t') {
        return Err(IntegrityError::Parse { position });
    }
    Ok(entries)
}

/// Encode raw digest bytes the way metadata carries them.
pub fn encode_digest(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
