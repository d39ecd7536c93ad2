// error.rs — Error types for the manifest subsystem.
//
// Configuration errors (unknown `onerror`, malformed fields, bad addresses)
// surface from construction and are never recovered. Integrity mismatches
// are only returned as errors when the manifest's reaction is `throw`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use mp_integrity::{Algorithm, IntegrityError};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The `onerror` field named a reaction other than throw, exit, or log.
    #[error("manifest specified unknown error behavior {value}")]
    UnknownOnError { value: String },

    /// A resource or scope entry has a field of the wrong shape.
    #[error("manifest resource {href} has invalid property value for {field}")]
    InvalidResourceField { href: String, field: &'static str },

    /// The top-level policy document is not shaped like a policy.
    #[error("invalid policy document: {reason}")]
    InvalidDocument { reason: String },

    /// A string could not be turned into an absolute address.
    #[error("invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// The policy file could not be read.
    #[error("failed to read policy at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The policy file is not valid JSON.
    #[error("policy document is not valid JSON: {0}")]
    Document(#[from] serde_json::Error),

    /// A configured integrity string is malformed. Raised on first use.
    #[error(transparent)]
    Sri(#[from] IntegrityError),

    /// Content did not satisfy the configured integrity.
    #[error(transparent)]
    IntegrityMismatch(#[from] IntegrityMismatch),

    /// A requester asked for a specifier the manifest does not permit.
    #[error("manifest does not permit '{specifier}' to be loaded from {requester}")]
    DependencyDenied { requester: String, specifier: String },
}

/// Details of a failed integrity assertion.
///
/// Carries the digests actually computed for the content so operators can
/// update the policy. The expected values are deliberately not repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityMismatch {
    /// Canonical address of the checked resource.
    pub address: String,
    /// Base64 digests of the content, one per algorithm that was tried.
    pub computed: BTreeMap<Algorithm, String>,
}

impl fmt::Display for IntegrityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the content of \"{}\" does not match the expected integrity",
            self.address
        )?;
        if !self.computed.is_empty() {
            f.write_str("; integrities found are:")?;
            for (algorithm, digest) in &self.computed {
                write!(f, " {algorithm}-{digest}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for IntegrityMismatch {}
