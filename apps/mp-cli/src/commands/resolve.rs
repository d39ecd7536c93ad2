// resolve.rs — Show where a policy sends an import.
//
// Prints the mapped address or "pass-through". A denied import is routed
// through the manifest's reaction and always exits non-zero.

use std::path::Path;

use mp_manifest::{Conditions, Manifest, ManifestOptions, Resolution};
use tracing::debug;

use super::address_arg;
use super::check::load;

pub fn execute(
    policy: &Path,
    requester: &str,
    specifier: &str,
    conditions: &[String],
    options: &ManifestOptions,
) -> anyhow::Result<()> {
    let manifest = load(policy, options)?;
    let requester = address_arg(requester)?;
    println!("{}", resolve(&manifest, &requester, specifier, conditions)?);
    Ok(())
}

fn resolve(
    manifest: &Manifest,
    requester: &str,
    specifier: &str,
    conditions: &[String],
) -> anyhow::Result<String> {
    let resolver = manifest.dependency_mapper(requester)?;
    let active: Conditions = conditions.iter().map(String::as_str).collect();
    debug!(requester = %resolver.requester(), specifier, ?conditions, "resolving");

    match resolver.resolve(specifier, &active)? {
        Resolution::Mapped(address) => Ok(address.to_string()),
        Resolution::PassThrough => Ok("pass-through".to_string()),
        Resolution::Denied => {
            manifest.react(resolver.denied(specifier))?;
            anyhow::bail!(
                "manifest does not permit '{specifier}' to be loaded from {}",
                resolver.requester()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(onerror: &str) -> Manifest {
        let document = json!({
            "onerror": onerror,
            "resources": {"file:///app/main.js": {
                "dependencies": {"fs": {"node": "./shims/fs.js"}, "path": true}
            }}
        });
        Manifest::new(&document, "file:///app/policy.json", ManifestOptions::default()).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prints_mapped_addresses() {
        let m = manifest("throw");
        assert_eq!(
            resolve(&m, "file:///app/main.js", "fs", &names(&["node"])).unwrap(),
            "file:///app/shims/fs.js"
        );
        assert_eq!(
            resolve(&m, "file:///app/main.js", "path", &[]).unwrap(),
            "pass-through"
        );
    }

    #[test]
    fn denials_fail_under_every_non_exit_reaction() {
        for onerror in ["throw", "log"] {
            let m = manifest(onerror);
            let err = resolve(&m, "file:///app/main.js", "fs", &[]).unwrap_err();
            assert!(err.to_string().contains("does not permit 'fs'"), "{onerror}: {err}");
        }
    }
}
