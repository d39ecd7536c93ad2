// policy_flow.rs — End-to-end test of a loader consulting a policy file.
//
// The flow mirrors what a module loader does for every module it loads:
//
//   1. Load the policy file from disk (relative keys resolve next to it)
//   2. Read a module's source and assert its integrity
//   3. Resolve each of the module's imports through the dependency mapper
//   4. Assert the integrity of every mapped dependency before trusting it
//   5. Report denied imports through the manifest's reaction
//
// Map keys resolve against the policy file; import specifiers resolve
// against the importing module.
//
// VERIFY:
//   - Trusted modules verify; tampered modules are rejected
//   - Mapped specifiers land on the addresses the policy names
//   - Unlisted specifiers are denied and surface as DependencyDenied

use std::fs;
use std::path::Path;

use mp_integrity::{digest_sri, Algorithm};
use mp_manifest::{Conditions, IntegrityCheck, Manifest, ManifestError, ManifestOptions, Resolution};
use tempfile::tempdir;
use url::Url;

const MAIN: &[u8] = b"import fs from 'fs'; import util from './util.js';";
const SAFE_FS: &[u8] = b"export default { readFile() {} };";
const UTIL: &[u8] = b"export default {};";

fn file_url(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap();
    Url::from_file_path(absolute).unwrap().to_string()
}

fn write_project(root: &Path, onerror: &str) {
    fs::create_dir_all(root.join("src/shims")).unwrap();
    fs::write(root.join("src/main.js"), MAIN).unwrap();
    fs::write(root.join("src/util.js"), UTIL).unwrap();
    fs::write(root.join("src/shims/fs.js"), SAFE_FS).unwrap();

    let policy = serde_json::json!({
        "onerror": onerror,
        "resources": {
            "./src/main.js": {
                "integrity": digest_sri(Algorithm::Sha384, MAIN),
                "dependencies": {
                    "fs": { "node": "./shims/fs.js" },
                    "./src/util.js": true
                },
                "cascade": true
            },
            "./src/shims/fs.js": {
                "integrity": format!(
                    "{} {}",
                    digest_sri(Algorithm::Sha256, b"stale build"),
                    digest_sri(Algorithm::Sha512, SAFE_FS)
                )
            }
        },
        "scopes": {
            "./src/": { "integrity": true, "dependencies": { "path": true } }
        }
    });
    fs::write(root.join("policy.json"), policy.to_string()).unwrap();
}

#[test]
fn loader_flow_with_throw_reaction() {
    let dir = tempdir().unwrap();
    write_project(dir.path(), "throw");

    let manifest = Manifest::load(dir.path().join("policy.json"), ManifestOptions::default()).unwrap();
    assert_eq!(manifest.href(), file_url(&dir.path().join("policy.json")));
    assert_eq!(manifest.resource_count(), 2);
    assert_eq!(manifest.scope_count(), 1);

    // Step 2: the entry module.
    let main = file_url(&dir.path().join("src/main.js"));
    let source = fs::read(dir.path().join("src/main.js")).unwrap();
    assert!(manifest.assert_integrity(&main, &source).unwrap().is_verified());

    // Step 3: its imports.
    let resolver = manifest.dependency_mapper(&main).unwrap();
    let node: Conditions = ["node", "import"].into_iter().collect();

    let shim = match resolver.resolve("fs", &node).unwrap() {
        Resolution::Mapped(address) => address,
        other => panic!("expected fs to be mapped, got {:?}", other),
    };
    assert_eq!(shim.as_str(), file_url(&dir.path().join("src/shims/fs.js")));
    assert_eq!(resolver.resolve("./util.js", &node).unwrap(), Resolution::PassThrough);
    // Not in the resource map; cascades to the "./src/" scope.
    assert_eq!(resolver.resolve("path", &node).unwrap(), Resolution::PassThrough);
    // "fs" has no branch for a browser build.
    assert_eq!(
        resolver.resolve("fs", &Conditions::new()).unwrap(),
        Resolution::Denied
    );

    // Step 4: the mapped dependency, checked against its second digest.
    let shim_source = fs::read(dir.path().join("src/shims/fs.js")).unwrap();
    assert!(manifest.assert_integrity(shim.as_str(), &shim_source).unwrap().is_verified());
    // Scope-level `integrity: true` covers util.js.
    let util = file_url(&dir.path().join("src/util.js"));
    assert!(manifest.assert_integrity(&util, UTIL).unwrap().is_verified());

    // A tampered entry module is rejected with the digest actually found.
    match manifest.assert_integrity(&main, b"import evil from 'evil';") {
        Err(ManifestError::IntegrityMismatch(mismatch)) => {
            assert_eq!(mismatch.address, main);
            assert_eq!(mismatch.computed.len(), 1);
            assert!(mismatch.computed.contains_key(&Algorithm::Sha384));
        }
        other => panic!("expected IntegrityMismatch, got {:?}", other),
    }

    // Step 5: a denied import.
    assert_eq!(resolver.resolve("child_process", &node).unwrap(), Resolution::Denied);
    match manifest.react(resolver.denied("child_process")) {
        Err(ManifestError::DependencyDenied { specifier, .. }) => assert_eq!(specifier, "child_process"),
        other => panic!("expected DependencyDenied, got {:?}", other),
    }
}

#[test]
fn loader_flow_with_log_reaction() {
    let dir = tempdir().unwrap();
    write_project(dir.path(), "log");
    let manifest = Manifest::load(dir.path().join("policy.json"), ManifestOptions::default()).unwrap();

    let main = file_url(&dir.path().join("src/main.js"));
    match manifest.assert_integrity(&main, b"tampered").unwrap() {
        IntegrityCheck::Rejected(mismatch) => assert_eq!(mismatch.address, main),
        IntegrityCheck::Verified => panic!("tampered content must not verify"),
    }
    let resolver = manifest.dependency_mapper(&main).unwrap();
    assert!(manifest.react(resolver.denied("child_process")).is_ok());
}

#[test]
fn missing_policy_file_reports_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    match Manifest::load(&path, ManifestOptions::default()) {
        Err(ManifestError::Read { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Read error, got {:?}", other),
    }
}

#[test]
fn invalid_json_is_a_document_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("policy.json");
    fs::write(&path, "{ \"resources\": ").unwrap();
    assert!(matches!(
        Manifest::load(&path, ManifestOptions::default()),
        Err(ManifestError::Document(_))
    ));
}
