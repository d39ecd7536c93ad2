// address.rs — Canonical resource addresses.
//
// Every resource, scope, and mapped target in a manifest is compared by its
// canonical URL string, so all address parsing funnels through the
// Canonicalizer. Absolute parses are memoized per instance: the cache lives
// as long as the owning Manifest and is never shared between manifests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::Regex;
use url::Url;

use crate::error::ManifestError;

/// A bare scheme token such as `https:` or `blob:`. Digits are accepted
/// after the first letter, as URL scheme syntax allows (e.g. `ipfs2:`).
static SCHEME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+\-.]*:$")
        .unwrap_or_else(|e| unreachable!("static scheme pattern: {e}"))
});

/// A canonical absolute address. Two addresses are equal iff their
/// canonical strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(Url);

impl Address {
    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    /// The scheme without its trailing colon (e.g. "file").
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `./x`, `../x`, and `/x` are resolved against a base; anything else is
/// treated as a candidate absolute address.
pub fn is_relative_specifier(text: &str) -> bool {
    text.starts_with('/') || text.starts_with("./") || text.starts_with("../")
}

/// Whether `key` is a bare scheme scope key like `https:`.
pub fn is_scheme_token(key: &str) -> bool {
    SCHEME_TOKEN.is_match(key)
}

/// Resolves address strings to [`Address`] values, memoizing absolute parses.
#[derive(Debug, Default)]
pub struct Canonicalizer {
    parsed: RwLock<HashMap<String, Address>>,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `text` into an absolute address.
    ///
    /// Relative-looking text (`./`, `../`, `/`) requires a `base`; anything
    /// else must already be absolute.
    pub fn resolve(&self, text: &str, base: Option<&Address>) -> Result<Address, ManifestError> {
        if is_relative_specifier(text) {
            let base = base.ok_or_else(|| ManifestError::InvalidAddress {
                input: text.to_string(),
                reason: "relative address without a base".to_string(),
            })?;
            return join(base, text);
        }
        self.parse_absolute(text)
    }

    /// Resolve a mapped dependency target.
    ///
    /// Like [`resolve`](Self::resolve), but text that is neither relative-looking
    /// nor absolute (e.g. `"lib.js"`) is resolved against `base` as well.
    pub fn resolve_target(&self, text: &str, base: &Address) -> Result<Address, ManifestError> {
        if is_relative_specifier(text) {
            return join(base, text);
        }
        match Url::parse(text) {
            Err(url::ParseError::RelativeUrlWithoutBase) => join(base, text),
            _ => self.parse_absolute(text),
        }
    }

    /// Normalize a specifier before map lookup.
    ///
    /// Relative specifiers resolve against `base`, absolute ones are
    /// canonicalized, and anything that fails to parse (bare names such as
    /// `"lodash"`) is returned unchanged.
    pub fn canonicalize_specifier(&self, specifier: &str, base: &Address) -> String {
        let resolved = if is_relative_specifier(specifier) {
            join(base, specifier)
        } else {
            self.parse_absolute(specifier)
        };
        match resolved {
            Ok(address) => address.as_str().to_string(),
            Err(_) => specifier.to_string(),
        }
    }

    /// Canonicalize a scope key.
    ///
    /// Scope keys may be the empty string (global fallback), a bare scheme
    /// token ending in `:` (after trimming control characters and spaces),
    /// or an ordinary address.
    pub fn scope_key(&self, text: &str, base: &Address) -> Result<String, ManifestError> {
        if text.is_empty() {
            return Ok(String::new());
        }
        if text.ends_with(':') {
            let trimmed: String = text
                .trim_matches(|c: char| c <= '\u{20}')
                .chars()
                .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
                .collect();
            if is_scheme_token(&trimmed) {
                return Ok(trimmed.to_ascii_lowercase());
            }
        }
        Ok(self.resolve_target(text, base)?.as_str().to_string())
    }

    fn parse_absolute(&self, text: &str) -> Result<Address, ManifestError> {
        if let Some(hit) = self
            .parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return Ok(hit.clone());
        }

        let url = Url::parse(text).map_err(|e| ManifestError::InvalidAddress {
            input: text.to_string(),
            reason: e.to_string(),
        })?;
        let address = Address(url);
        // Parsing is deterministic, so a racing writer stores an equal value.
        self.parsed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(text.to_string())
            .or_insert_with(|| address.clone());
        Ok(address)
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn join(base: &Address, text: &str) -> Result<Address, ManifestError> {
    base.0
        .join(text)
        .map(Address)
        .map_err(|e| ManifestError::InvalidAddress {
            input: text.to_string(),
            reason: e.to_string(),
        })
}
