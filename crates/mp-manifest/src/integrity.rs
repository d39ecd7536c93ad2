// integrity.rs — Integrity settings for resources and scopes.
//
// Resource digests are stored as the raw metadata string and parsed the
// first time the resource is checked. Most policies list far more
// resources than a single run loads, so startup never pays for parsing.

use std::sync::{Arc, PoisonError, RwLock};

use mp_integrity::{IntegrityError, SriEntry};
use serde_json::Value;

use crate::error::ManifestError;

/// The `integrity` setting of a resource entry.
#[derive(Debug)]
pub enum ResourceIntegrity {
    /// `true`: any content is accepted.
    Allowed,
    /// Absent without cascade: no content is accepted.
    Forbidden,
    /// Absent with `cascade: true`: defer to the enclosing scopes.
    Cascade,
    /// A metadata string, parsed lazily.
    Digests(LazySri),
}

impl ResourceIntegrity {
    /// Parse the `integrity` field of a resource entry.
    pub fn from_json(value: Option<&Value>, cascade: bool, href: &str) -> Result<Self, ManifestError> {
        match value {
            None if cascade => Ok(ResourceIntegrity::Cascade),
            None => Ok(ResourceIntegrity::Forbidden),
            Some(Value::String(metadata)) => Ok(ResourceIntegrity::Digests(LazySri::new(metadata))),
            Some(Value::Bool(true)) => Ok(ResourceIntegrity::Allowed),
            Some(_) => Err(ManifestError::InvalidResourceField {
                href: href.to_string(),
                field: "integrity",
            }),
        }
    }
}

/// The `integrity` setting of a scope entry. Scopes never carry digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeIntegrity {
    Allowed,
    Forbidden,
    Cascade,
}

impl ScopeIntegrity {
    /// Parse the `integrity` field of a scope entry; only `true` is valid.
    pub fn from_json(value: Option<&Value>, cascade: bool, href: &str) -> Result<Self, ManifestError> {
        match value {
            None if cascade => Ok(ScopeIntegrity::Cascade),
            None => Ok(ScopeIntegrity::Forbidden),
            Some(Value::Bool(true)) => Ok(ScopeIntegrity::Allowed),
            Some(_) => Err(ManifestError::InvalidResourceField {
                href: href.to_string(),
                field: "integrity",
            }),
        }
    }
}

#[derive(Debug)]
enum SriState {
    Unparsed(String),
    Parsed(Arc<[SriEntry]>),
}

/// Integrity metadata that upgrades itself from text to entries on first use.
#[derive(Debug)]
pub struct LazySri {
    state: RwLock<SriState>,
}

impl LazySri {
    pub fn new(metadata: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(SriState::Unparsed(metadata.into())),
        }
    }

    /// Parsed entries, parsing and storing them on the first call.
    ///
    /// A parse failure leaves the metadata unparsed, so every later call
    /// reports the same error.
    pub fn entries(&self) -> Result<Arc<[SriEntry]>, IntegrityError> {
        let metadata = match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            SriState::Parsed(entries) => return Ok(Arc::clone(entries)),
            SriState::Unparsed(metadata) => metadata.clone(),
        };

        let parsed: Arc<[SriEntry]> = mp_integrity::parse(&metadata)?.into();

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            // Another caller won the race; both parsed the same text.
            SriState::Parsed(entries) => Ok(Arc::clone(entries)),
            SriState::Unparsed(_) => {
                *state = SriState::Parsed(Arc::clone(&parsed));
                Ok(parsed)
            }
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(
            &*self.state.read().unwrap_or_else(PoisonError::into_inner),
            SriState::Parsed(_)
        )
    }
}
