// dependency.rs — Dependency maps and conditional targets.
//
// Each resource or scope entry owns a DependencyMapper that answers: "may
// this specifier be loaded from here, and if so, from where?"
//
// Resolution order for one mapper:
// 1. `dependencies: true`  → pass-through (default resolution allowed)
// 2. `dependencies: null`  → denied
// 3. explicit map          → look up the normalized specifier; a found
//    target is resolved against the active conditions
// 4. not found + cascade   → ask the enclosing scope's mapper
// 5. not found, no cascade → denied
//
// Explicit map keys are normalized on first use; the enclosing mapper is
// discovered on first cascade. Both are cached with `OnceLock`, so
// concurrent first calls settle on a single value.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::warn;

use crate::address::{is_scheme_token, Address};
use crate::error::ManifestError;
use crate::manifest::Manifest;

/// A condition that is active no matter what the loader passes in.
pub const DEFAULT_CONDITION: &str = "default";

/// Where a dependency map sends a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An address string, resolved when selected.
    Address(String),
    /// `true`: let default resolution handle the specifier.
    PassThrough,
    /// Condition name → nested target, tried in document order.
    Conditional(Vec<(String, Target)>),
}

/// A leaf chosen from a target tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected<'a> {
    Address(&'a str),
    PassThrough,
}

impl Target {
    /// Parse a target from the policy document, validating every leaf.
    pub fn from_json(value: &Value, href: &str) -> Result<Self, ManifestError> {
        match value {
            Value::String(s) => Ok(Target::Address(s.clone())),
            Value::Bool(true) => Ok(Target::PassThrough),
            Value::Object(branches) => branches
                .iter()
                .map(|(condition, nested)| -> Result<(String, Target), ManifestError> {
                    Ok((condition.clone(), Target::from_json(nested, href)?))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Target::Conditional),
            _ => Err(ManifestError::InvalidResourceField {
                href: href.to_string(),
                field: "dependencies",
            }),
        }
    }

    /// Depth-first search for the first leaf whose conditions are all active.
    ///
    /// Returns `None` when no branch matches.
    pub fn select(&self, conditions: &Conditions) -> Option<Selected<'_>> {
        match self {
            Target::Address(to) => Some(Selected::Address(to)),
            Target::PassThrough => Some(Selected::PassThrough),
            Target::Conditional(branches) => branches
                .iter()
                .filter(|(condition, _)| conditions.contains(condition))
                .find_map(|(_, nested)| nested.select(conditions)),
        }
    }
}

/// The set of active condition names supplied by the loader
/// (e.g. "import", "node"). "default" is always active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(BTreeSet<String>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_CONDITION || self.0.contains(name)
    }
}

impl<S: Into<String>> FromIterator<S> for Conditions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The `dependencies` field of a resource or scope entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyMap {
    /// `true`: any specifier passes through to default resolution.
    AnyAllowed,
    /// `null` or absent: no specifier resolves.
    NoneAllowed,
    /// Specifier → target, in document order, keys not yet normalized.
    Explicit(Vec<(String, Target)>),
}

impl DependencyMap {
    /// Parse the `dependencies` field (`None` when absent).
    pub fn from_json(value: Option<&Value>, href: &str) -> Result<Self, ManifestError> {
        match value {
            None | Some(Value::Null) => Ok(DependencyMap::NoneAllowed),
            Some(Value::Bool(true)) => Ok(DependencyMap::AnyAllowed),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(specifier, target)| -> Result<(String, Target), ManifestError> {
                    Ok((specifier.clone(), Target::from_json(target, href)?))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(DependencyMap::Explicit),
            Some(_) => Err(ManifestError::InvalidResourceField {
                href: href.to_string(),
                field: "dependencies",
            }),
        }
    }
}

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The manifest redirects the specifier to this address.
    Mapped(Address),
    /// The specifier is allowed and resolves normally.
    PassThrough,
    /// The specifier may not be loaded from this requester.
    Denied,
}

/// Whether a mapper belongs to a resource entry or a scope entry.
/// Determines how its enclosing scope is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperKind {
    Resource,
    Scope,
}

/// The dependency map of a single resource or scope, plus its caches.
#[derive(Debug)]
pub struct DependencyMapper {
    href: String,
    kind: MapperKind,
    map: DependencyMap,
    cascade: bool,
    normalized: OnceLock<HashMap<String, Target>>,
    parent: OnceLock<Option<Arc<DependencyMapper>>>,
}

impl DependencyMapper {
    pub fn new(href: impl Into<String>, kind: MapperKind, map: DependencyMap, cascade: bool) -> Self {
        Self {
            href: href.into(),
            kind,
            map,
            cascade,
            normalized: OnceLock::new(),
            parent: OnceLock::new(),
        }
    }

    /// The resource address or scope key this mapper was declared under.
    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn kind(&self) -> MapperKind {
        self.kind
    }

    pub fn cascade(&self) -> bool {
        self.cascade
    }

    pub fn map(&self) -> &DependencyMap {
        &self.map
    }

    /// Resolve a specifier that was already normalized against the requester,
    /// following cascades outward until a mapper decides.
    pub(crate) fn resolve_normalized(
        &self,
        specifier: &str,
        conditions: &Conditions,
        manifest: &Manifest,
    ) -> Result<Resolution, ManifestError> {
        let mut visited = HashSet::new();
        let mut mapper = self;
        loop {
            // A mapper seen twice means the cascade stopped moving outward.
            if !visited.insert((mapper.kind, mapper.href.as_str())) {
                warn!(mapper = %mapper.href, "dependency cascade revisited a mapper, denying");
                return Ok(Resolution::Denied);
            }
            if let Some(resolution) = mapper.lookup(specifier, conditions, manifest)? {
                return Ok(resolution);
            }
            let parent = mapper
                .parent
                .get_or_init(|| manifest.enclosing_mapper(mapper.kind, &mapper.href));
            match parent {
                Some(parent) => mapper = parent.as_ref(),
                None => return Ok(Resolution::Denied),
            }
        }
    }

    /// This mapper's own answer, or `None` when it cascades outward.
    fn lookup(
        &self,
        specifier: &str,
        conditions: &Conditions,
        manifest: &Manifest,
    ) -> Result<Option<Resolution>, ManifestError> {
        let entries = match &self.map {
            DependencyMap::AnyAllowed => return Ok(Some(Resolution::PassThrough)),
            DependencyMap::NoneAllowed => return Ok(Some(Resolution::Denied)),
            DependencyMap::Explicit(entries) => entries,
        };

        let table = self
            .normalized
            .get_or_init(|| normalize_keys(entries, manifest));
        if let Some(target) = table.get(specifier) {
            let resolution = match target.select(conditions) {
                Some(Selected::PassThrough) => Resolution::PassThrough,
                Some(Selected::Address(to)) => {
                    let base = self.target_base(manifest);
                    Resolution::Mapped(manifest.canonicalizer().resolve_target(to, &base)?)
                }
                None => Resolution::Denied,
            };
            return Ok(Some(resolution));
        }

        if self.cascade {
            Ok(None)
        } else {
            Ok(Some(Resolution::Denied))
        }
    }

    /// Relative targets resolve against the entry's own address; scheme and
    /// global scopes have none, so they use the manifest's address.
    fn target_base(&self, manifest: &Manifest) -> Address {
        if self.href.is_empty() || is_scheme_token(&self.href) {
            return manifest.address().clone();
        }
        manifest
            .canonicalizer()
            .resolve(&self.href, None)
            .unwrap_or_else(|_| manifest.address().clone())
    }
}

fn normalize_keys(entries: &[(String, Target)], manifest: &Manifest) -> HashMap<String, Target> {
    entries
        .iter()
        .map(|(specifier, target)| {
            let key = manifest
                .canonicalizer()
                .canonicalize_specifier(specifier, manifest.address());
            (key, target.clone())
        })
        .collect()
}

/// A dependency mapper bound to one requester.
///
/// Obtained from [`Manifest::dependency_mapper`].
#[derive(Debug, Clone)]
pub struct DependencyResolver<'m> {
    manifest: &'m Manifest,
    requester: Address,
    mapper: Option<Arc<DependencyMapper>>,
}

impl<'m> DependencyResolver<'m> {
    pub(crate) fn new(
        manifest: &'m Manifest,
        requester: Address,
        mapper: Option<Arc<DependencyMapper>>,
    ) -> Self {
        Self {
            manifest,
            requester,
            mapper,
        }
    }

    pub fn requester(&self) -> &Address {
        &self.requester
    }

    /// Resolve `specifier` as imported by the requester.
    ///
    /// Relative specifiers are normalized against the requester before lookup.
    pub fn resolve(
        &self,
        specifier: &str,
        conditions: &Conditions,
    ) -> Result<Resolution, ManifestError> {
        let Some(mapper) = &self.mapper else {
            return Ok(Resolution::Denied);
        };
        let normalized = self
            .manifest
            .canonicalizer()
            .canonicalize_specifier(specifier, &self.requester);
        mapper.resolve_normalized(&normalized, conditions, self.manifest)
    }

    /// Build the error a loader reports for a denied specifier.
    pub fn denied(&self, specifier: &str) -> ManifestError {
        ManifestError::DependencyDenied {
            requester: self.requester.to_string(),
            specifier: specifier.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conditions(names: &[&str]) -> Conditions {
        names.iter().copied().collect()
    }

    #[test]
    fn conditional_target_first_active_branch_wins() {
        let target = Target::from_json(&json!({"node": "a.js", "default": "b.js"}), "x").unwrap();
        assert_eq!(target.select(&conditions(&["node"])), Some(Selected::Address("a.js")));
        assert_eq!(target.select(&conditions(&[])), Some(Selected::Address("b.js")));
    }

    #[test]
    fn conditional_target_without_match_selects_nothing() {
        let target = Target::from_json(&json!({"node": "a.js", "browser": "b.js"}), "x").unwrap();
        assert_eq!(target.select(&conditions(&["deno"])), None);
    }

    #[test]
    fn conditional_target_backtracks_into_later_branches() {
        // "import" is active but its subtree has no match, so "require" is tried.
        let target = Target::from_json(
            &json!({"import": {"browser": "web.mjs"}, "require": true}),
            "x",
        )
        .unwrap();
        assert_eq!(
            target.select(&conditions(&["import", "require"])),
            Some(Selected::PassThrough)
        );
    }

    #[test]
    fn conditional_target_keeps_document_order() {
        let target = Target::from_json(&json!({"require": "r.cjs", "import": "i.mjs"}), "x").unwrap();
        assert_eq!(
            target.select(&conditions(&["import", "require"])),
            Some(Selected::Address("r.cjs"))
        );
    }

    #[test]
    fn invalid_leaves_are_rejected() {
        for bad in [json!(false), json!(1), json!(null), json!(["a.js"]), json!({"node": 3})] {
            match Target::from_json(&bad, "file:///app/main.js") {
                Err(ManifestError::InvalidResourceField { field, .. }) => {
                    assert_eq!(field, "dependencies")
                }
                other => panic!("expected InvalidResourceField for {bad}, got {:?}", other),
            }
        }
    }

    #[test]
    fn dependency_map_shapes() {
        assert_eq!(DependencyMap::from_json(None, "x").unwrap(), DependencyMap::NoneAllowed);
        assert_eq!(
            DependencyMap::from_json(Some(&Value::Null), "x").unwrap(),
            DependencyMap::NoneAllowed
        );
        assert_eq!(
            DependencyMap::from_json(Some(&json!(true)), "x").unwrap(),
            DependencyMap::AnyAllowed
        );
        assert!(matches!(
            DependencyMap::from_json(Some(&json!({"foo": "bar"})), "x").unwrap(),
            DependencyMap::Explicit(entries) if entries.len() == 1
        ));
        for bad in [json!(false), json!("foo"), json!([])] {
            assert!(DependencyMap::from_json(Some(&bad), "x").is_err());
        }
    }

    #[test]
    fn cascade_cycle_is_denied() {
        let manifest = Manifest::new(
            &json!({}),
            "file:///app/policy.json",
            crate::config::ManifestOptions::default(),
        )
        .unwrap();
        let map = DependencyMap::Explicit(vec![("a".to_string(), Target::PassThrough)]);
        let mapper = Arc::new(DependencyMapper::new("file:///", MapperKind::Scope, map, true));
        // Point the mapper's enclosing mapper back at itself.
        mapper.parent.set(Some(Arc::clone(&mapper))).unwrap();

        let active = Conditions::new();
        assert_eq!(
            mapper.resolve_normalized("zzz", &active, &manifest).unwrap(),
            Resolution::Denied
        );
        assert_eq!(
            mapper.resolve_normalized("a", &active, &manifest).unwrap(),
            Resolution::PassThrough
        );
    }

    #[test]
    fn default_condition_is_always_active() {
        let active = Conditions::new();
        assert!(active.contains(DEFAULT_CONDITION));
        assert!(!active.contains("node"));
    }
}
