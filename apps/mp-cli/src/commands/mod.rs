// mod.rs — Subcommand implementations and shared argument helpers.

pub mod check;
pub mod digest;
pub mod integrity;
pub mod resolve;

use std::path::Path;

use anyhow::Context;
use url::Url;

/// The `file://` URL of an existing file.
pub fn file_address(path: &Path) -> anyhow::Result<String> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| anyhow::anyhow!("{} is not an absolute path", absolute.display()))
}

/// Accept either an absolute URL or a path to an existing file.
pub fn address_arg(text: &str) -> anyhow::Result<String> {
    match Url::parse(text) {
        // Single-letter schemes are Windows drive letters, not URLs.
        Ok(url) if url.scheme().len() > 1 => Ok(url.into()),
        _ => file_address(Path::new(text)),
    }
}
