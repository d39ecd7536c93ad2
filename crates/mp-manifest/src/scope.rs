// scope.rs — Longest-prefix scope lookup.
//
// A scope applies to every address beneath it unless a more specific scope
// exists. For hierarchical schemes the lookup trims one path segment at a
// time (`..` resolution) until it reaches the root; after that it tries the
// bare scheme token (e.g. "https:") and finally the global "" scope.
//
//   scopes: "file:///a/", "file:///a/b/"
//   "file:///a/b/c" → "file:///a/b/"
//   "file:///a/x"   → "file:///a/"
//   "file:///z"     → "file:" if present, else "" if present, else none

use url::{Origin, Url};

use crate::address::is_scheme_token;

/// Schemes whose paths are hierarchical and can be trimmed segment by segment.
pub const HIERARCHICAL_SCHEMES: &[&str] = &["file", "ftp", "http", "https", "ws", "wss"];

fn is_hierarchical(scheme: &str) -> bool {
    HIERARCHICAL_SCHEMES.contains(&scheme)
}

/// Find the most specific scope key covering `address`.
///
/// `contains` answers whether a key is configured in the scope table.
pub fn find_scope<F>(address: &Url, contains: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let mut current = address.clone();

    // Blobs with a tuple origin are scoped by that origin.
    if current.scheme() == "blob" {
        if let origin @ Origin::Tuple(..) = current.origin() {
            if let Ok(url) = Url::parse(&origin.ascii_serialization()) {
                current = url;
            }
        }
    }

    if is_hierarchical(current.scheme()) {
        // A trailing slash makes the first ".." a no-op instead of
        // skipping the address's own directory.
        ensure_trailing_slash(&mut current);
        loop {
            if contains(current.as_str()) {
                return Some(current.as_str().to_string());
            }
            match current.join("..") {
                Ok(parent) if parent != current => current = parent,
                _ => break,
            }
        }
    }

    let scheme = format!("{}:", current.scheme());
    if contains(&scheme) {
        return Some(scheme);
    }
    if contains("") {
        return Some(String::new());
    }
    None
}

/// Find the scope strictly enclosing the scope keyed by `key`.
///
/// Never returns `key` itself, so repeated calls always walk outward and
/// terminate at the global scope.
pub fn enclosing_scope<F>(key: &str, contains: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    if key.is_empty() {
        return None;
    }
    let outward = |candidate: &str| candidate != key && contains(candidate);

    // Bare scheme tokens such as "file:" only have the global scope above
    // them. Checked before parsing: "file:" parses as "file:///".
    if is_scheme_token(key) {
        return outward("").then(String::new);
    }
    match Url::parse(key) {
        Ok(mut url) => {
            if is_hierarchical(url.scheme()) {
                ensure_trailing_slash(&mut url);
                if let Ok(parent) = url.join("..") {
                    url = parent;
                }
            }
            find_scope(&url, outward)
        }
        Err(_) => outward("").then(String::new),
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
}
