// check.rs — Validate a policy file and summarize it.

use std::path::Path;

use anyhow::Context;
use mp_manifest::{Manifest, ManifestOptions};

pub fn execute(policy: &Path, json: bool, options: &ManifestOptions) -> anyhow::Result<()> {
    let manifest = load(policy, options)?;
    println!("{}", summary(&manifest, json)?);
    Ok(())
}

pub fn load(policy: &Path, options: &ManifestOptions) -> anyhow::Result<Manifest> {
    Manifest::load(policy, options.clone())
        .with_context(|| format!("invalid policy {}", policy.display()))
}

fn summary(manifest: &Manifest, json: bool) -> anyhow::Result<String> {
    if json {
        let value = serde_json::json!({
            "href": manifest.href(),
            "resources": manifest.resource_count(),
            "scopes": manifest.scope_count(),
            "onerror": manifest.reaction(),
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    Ok(format!(
        "Policy {} is valid: {} resource(s), {} scope(s), onerror={}",
        manifest.href(),
        manifest.resource_count(),
        manifest.scope_count(),
        manifest.reaction()
    ))
}
