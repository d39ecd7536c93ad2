// manifest.rs — The policy manifest.
//
// A Manifest is built once from a policy document and then only read. It
// answers two questions for the module loader:
//
// 1. `dependency_mapper(requester).resolve(specifier, conditions)`:
//    is this dependency edge allowed, and where does it point?
// 2. `assert_integrity(address, content)`:
//    does this content satisfy the configured integrity?
//
// Policy document shape:
//
//   {
//     "onerror": "throw" | "exit" | "log",
//     "resources": { "<address>": { "integrity": "<sri>" | true,
//                                   "dependencies": true | null | { ... },
//                                   "cascade": bool } },
//     "scopes":    { "<address>/" | "<scheme>:" | "": { "integrity": true, ... } }
//   }
//
// Resource entries always take precedence over scopes. Cascading only walks
// outward, from a resource to its scope and from a scope to the scope
// enclosing it.
//
// After construction the only state that changes is cache fill: parsed
// addresses, parsed SRI metadata, normalized dependency keys, and the
// enclosing mapper of each cascading entry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::address::{Address, Canonicalizer};
use crate::config::ManifestOptions;
use crate::dependency::{DependencyMap, DependencyMapper, DependencyResolver, MapperKind};
use crate::error::{IntegrityMismatch, ManifestError};
use crate::integrity::{ResourceIntegrity, ScopeIntegrity};
use crate::reaction::{ProcessTerminator, Reaction, Terminate};
use crate::scope::{enclosing_scope, find_scope};

/// Result of an integrity assertion that did not end in an error.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityCheck {
    /// The content is trusted.
    Verified,
    /// The content failed and the `log` reaction recorded the failure.
    /// The content must still not be trusted.
    Rejected(IntegrityMismatch),
}

impl IntegrityCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, IntegrityCheck::Verified)
    }
}

#[derive(Debug)]
struct ResourceEntry {
    integrity: ResourceIntegrity,
    mapper: Arc<DependencyMapper>,
}

#[derive(Debug)]
struct ScopeEntry {
    integrity: ScopeIntegrity,
    mapper: Arc<DependencyMapper>,
}

/// An immutable policy manifest.
pub struct Manifest {
    address: Address,
    resources: HashMap<String, ResourceEntry>,
    scopes: HashMap<String, ScopeEntry>,
    reaction: Reaction,
    options: ManifestOptions,
    canonicalizer: Canonicalizer,
    terminator: Arc<dyn Terminate>,
}

impl Manifest {
    /// Build a manifest from a parsed policy document.
    ///
    /// `href` is the manifest's own address; relative resource addresses and
    /// relative dependency specifiers are resolved against it.
    pub fn new(document: &Value, href: &str, options: ManifestOptions) -> Result<Self, ManifestError> {
        let canonicalizer = Canonicalizer::new();
        let address = canonicalizer.resolve(href, None)?;

        let root = document
            .as_object()
            .ok_or_else(|| ManifestError::InvalidDocument {
                reason: "expected a JSON object at the top level".to_string(),
            })?;

        let reaction = Reaction::from_json(root.get("onerror"))?;

        let mut resources = HashMap::new();
        for (original, descriptor) in table(root, "resources")? {
            let href = canonicalizer.resolve_target(original, &address)?;
            let href = href.as_str();
            let descriptor = descriptor_fields(descriptor, href)?;
            let cascade = cascade_flag(descriptor.get("cascade"), href)?;

            let integrity = ResourceIntegrity::from_json(descriptor.get("integrity"), cascade, href)?;
            if descriptor.contains_key("integrity") {
                debug!(resource = %original, "manifest contains integrity for resource");
            }
            let map = DependencyMap::from_json(descriptor.get("dependencies"), href)?;
            let mapper = DependencyMapper::new(href, MapperKind::Resource, map, cascade);

            resources.insert(
                href.to_string(),
                ResourceEntry {
                    integrity,
                    mapper: Arc::new(mapper),
                },
            );
        }

        let mut scopes = HashMap::new();
        for (original, descriptor) in table(root, "scopes")? {
            let key = canonicalizer.scope_key(original, &address)?;
            let descriptor = descriptor_fields(descriptor, &key)?;
            let cascade = cascade_flag(descriptor.get("cascade"), &key)?;

            let integrity = ScopeIntegrity::from_json(descriptor.get("integrity"), cascade, &key)?;
            if descriptor.contains_key("integrity") {
                debug!(scope = %original, "manifest contains integrity for scope");
            }
            let map = DependencyMap::from_json(descriptor.get("dependencies"), &key)?;
            let mapper = DependencyMapper::new(key.clone(), MapperKind::Scope, map, cascade);

            scopes.insert(
                key,
                ScopeEntry {
                    integrity,
                    mapper: Arc::new(mapper),
                },
            );
        }

        debug!(
            manifest = %address,
            resources = resources.len(),
            scopes = scopes.len(),
            %reaction,
            "manifest loaded"
        );

        Ok(Self {
            address,
            resources,
            scopes,
            reaction,
            options,
            canonicalizer,
            terminator: Arc::new(ProcessTerminator),
        })
    }

    /// Build a manifest from policy JSON text.
    pub fn from_json_str(text: &str, href: &str, options: ManifestOptions) -> Result<Self, ManifestError> {
        let document: Value = serde_json::from_str(text)?;
        Self::new(&document, href, options)
    }

    /// Read a policy file from disk. The manifest's address is the file's
    /// absolute `file://` URL.
    pub fn load(path: impl AsRef<Path>, options: ManifestOptions) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let read_error = |source: std::io::Error| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(read_error)?;
        let absolute = std::fs::canonicalize(path).map_err(read_error)?;
        let href = Url::from_file_path(&absolute).map_err(|()| ManifestError::InvalidAddress {
            input: absolute.display().to_string(),
            reason: "not an absolute file path".to_string(),
        })?;
        Self::from_json_str(&text, href.as_str(), options)
    }

    /// Replace how the `exit` reaction ends the process.
    pub fn with_terminator(mut self, terminator: Arc<dyn Terminate>) -> Self {
        self.terminator = terminator;
        self
    }

    /// The manifest's own address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn href(&self) -> &str {
        self.address.as_str()
    }

    pub fn reaction(&self) -> Reaction {
        self.reaction
    }

    pub fn options(&self) -> &ManifestOptions {
        &self.options
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Route an error through the configured reaction.
    ///
    /// Loaders use this to report denied dependencies the same way the
    /// manifest reports integrity failures.
    pub fn react(&self, error: ManifestError) -> Result<(), ManifestError> {
        self.reaction
            .react(error, self.terminator.as_ref(), self.options.abort_on_exit)
    }

    /// Get the dependency mapper that governs imports made by `requester`.
    ///
    /// A resource entry for the requester wins; otherwise the most specific
    /// covering scope is used. With neither, every specifier is denied.
    pub fn dependency_mapper(&self, requester: &str) -> Result<DependencyResolver<'_>, ManifestError> {
        let requester = self.canonicalizer.resolve(requester, None)?;
        let mapper = match self.resources.get(requester.as_str()) {
            Some(entry) => Some(Arc::clone(&entry.mapper)),
            None => find_scope(requester.url(), |key| self.scopes.contains_key(key))
                .and_then(|key| self.scopes.get(&key))
                .map(|entry| Arc::clone(&entry.mapper)),
        };
        Ok(DependencyResolver::new(self, requester, mapper))
    }

    /// The mapper a cascading entry falls back to.
    pub(crate) fn enclosing_mapper(&self, kind: MapperKind, href: &str) -> Option<Arc<DependencyMapper>> {
        let contains = |key: &str| self.scopes.contains_key(key);
        let key = match kind {
            MapperKind::Resource => Url::parse(href).ok().and_then(|url| find_scope(&url, contains)),
            MapperKind::Scope => enclosing_scope(href, contains),
        };
        key.and_then(|key| self.scopes.get(&key))
            .map(|entry| Arc::clone(&entry.mapper))
    }

    /// Check `content` retrieved from `address` against the manifest.
    ///
    /// Returns `Verified` when trusted. Otherwise the configured reaction
    /// runs: `throw` returns [`ManifestError::IntegrityMismatch`], `log`
    /// returns [`IntegrityCheck::Rejected`], `exit` does not return.
    /// Malformed integrity metadata is reported as [`ManifestError::Sri`]
    /// regardless of the reaction.
    pub fn assert_integrity(&self, address: &str, content: &[u8]) -> Result<IntegrityCheck, ManifestError> {
        let address = self.canonicalizer.resolve(address, None)?;
        debug!(address = %address, "checking integrity");

        if let Some(entry) = self.resources.get(address.as_str()) {
            match &entry.integrity {
                ResourceIntegrity::Allowed => return Ok(IntegrityCheck::Verified),
                ResourceIntegrity::Cascade => {}
                ResourceIntegrity::Forbidden => return self.reject(&address, BTreeMap::new()),
                ResourceIntegrity::Digests(lazy) => {
                    let entries = lazy.entries()?;
                    let verification = mp_integrity::verify(&entries, content);
                    if verification.is_match() {
                        return Ok(IntegrityCheck::Verified);
                    }
                    return self.reject(&address, verification.computed);
                }
            }
        }

        let contains = |key: &str| self.scopes.contains_key(key);
        let mut visited = HashSet::new();
        let mut scope = find_scope(address.url(), contains);
        while let Some(key) = scope {
            // A scope seen twice means the walk stopped moving outward.
            if !visited.insert(key.clone()) {
                warn!(scope = %key, "scope cascade revisited a scope, rejecting");
                break;
            }
            match self.scopes.get(&key).map(|entry| entry.integrity) {
                Some(ScopeIntegrity::Allowed) => return Ok(IntegrityCheck::Verified),
                Some(ScopeIntegrity::Cascade) => scope = enclosing_scope(&key, contains),
                Some(ScopeIntegrity::Forbidden) | None => break,
            }
        }
        self.reject(&address, BTreeMap::new())
    }

    fn reject(
        &self,
        address: &Address,
        computed: BTreeMap<mp_integrity::Algorithm, String>,
    ) -> Result<IntegrityCheck, ManifestError> {
        let mismatch = IntegrityMismatch {
            address: address.to_string(),
            computed,
        };
        self.react(ManifestError::IntegrityMismatch(mismatch.clone()))?;
        Ok(IntegrityCheck::Rejected(mismatch))
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("address", &self.address.as_str())
            .field("reaction", &self.reaction)
            .field("resources", &self.resources.len())
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

/// A top-level table (`resources` or `scopes`); absent or null means empty.
fn table<'a>(root: &'a Map<String, Value>, name: &str) -> Result<Vec<(&'a str, &'a Value)>, ManifestError> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(entries)) => Ok(entries.iter().map(|(k, v)| (k.as_str(), v)).collect()),
        Some(_) => Err(ManifestError::InvalidDocument {
            reason: format!("'{name}' must be an object"),
        }),
    }
}

fn descriptor_fields<'a>(descriptor: &'a Value, href: &str) -> Result<&'a Map<String, Value>, ManifestError> {
    descriptor
        .as_object()
        .ok_or_else(|| ManifestError::InvalidResourceField {
            href: href.to_string(),
            field: "descriptor",
        })
}

fn cascade_flag(value: Option<&Value>, href: &str) -> Result<bool, ManifestError> {
    match value {
        None => Ok(false),
        Some(Value::Bool(cascade)) => Ok(*cascade),
        Some(_) => Err(ManifestError::InvalidResourceField {
            href: href.to_string(),
            field: "cascade",
        }),
    }
}
