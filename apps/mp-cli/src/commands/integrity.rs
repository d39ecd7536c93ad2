// integrity.rs — Assert a file's integrity against a policy.
//
// With `onerror: "throw"` a mismatch comes back as an error; with "log" the
// manifest has already logged it and the command still fails. Either way a
// rejected file exits non-zero.

use std::path::Path;

use anyhow::Context;
use mp_manifest::{IntegrityCheck, Manifest, ManifestOptions};

use super::check::load;
use super::{address_arg, file_address};

pub fn execute(
    policy: &Path,
    file: &Path,
    url: Option<&str>,
    options: &ManifestOptions,
) -> anyhow::Result<()> {
    let manifest = load(policy, options)?;
    let address = match url {
        Some(url) => address_arg(url)?,
        None => file_address(file)?,
    };
    println!("{}", verify(&manifest, &address, file)?);
    Ok(())
}

fn verify(manifest: &Manifest, address: &str, file: &Path) -> anyhow::Result<String> {
    let content = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    match manifest.assert_integrity(address, &content)? {
        IntegrityCheck::Verified => Ok(format!("{address}: verified")),
        IntegrityCheck::Rejected(mismatch) => anyhow::bail!("{mismatch}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_integrity::{digest_sri, Algorithm};
    use tempfile::tempdir;

    fn setup(onerror: &str) -> (tempfile::TempDir, Manifest, String) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("lib.js"), "export {};").unwrap();
        let policy = serde_json::json!({
            "onerror": onerror,
            "resources": {"./lib.js": {"integrity": digest_sri(Algorithm::Sha256, b"export {};")}}
        });
        let path = dir.path().join("policy.json");
        std::fs::write(&path, policy.to_string()).unwrap();
        let manifest = load(&path, &ManifestOptions::default()).unwrap();
        let address = file_address(&dir.path().join("lib.js")).unwrap();
        (dir, manifest, address)
    }

    #[test]
    fn matching_file_verifies() {
        let (dir, manifest, address) = setup("throw");
        let line = verify(&manifest, &address, &dir.path().join("lib.js")).unwrap();
        assert!(line.ends_with(": verified"));
    }

    #[test]
    fn tampered_file_fails_under_every_non_exit_reaction() {
        for onerror in ["throw", "log"] {
            let (dir, manifest, address) = setup(onerror);
            std::fs::write(dir.path().join("lib.js"), "export const evil = 1;").unwrap();
            let err = verify(&manifest, &address, &dir.path().join("lib.js")).unwrap_err();
            assert!(
                err.to_string().contains("does not match the expected integrity"),
                "{onerror}: {err}"
            );
        }
    }

    #[test]
    fn unlisted_address_is_rejected() {
        let (dir, manifest, _) = setup("throw");
        assert!(verify(&manifest, "https://cdn.example/lib.js", &dir.path().join("lib.js")).is_err());
    }
}
