//! # mp-manifest
//!
//! Policy manifest engine for sandboxed module loading.
//!
//! A [`Manifest`] is built once from a policy document and answers two
//! questions for a module loader:
//!
//! - **May `requester` import `specifier`, and where does it point?**
//!   [`Manifest::dependency_mapper`] returns a [`DependencyResolver`] whose
//!   `resolve` yields a mapped [`Address`], pass-through, or a denial.
//! - **Is this content trusted?** [`Manifest::assert_integrity`] checks
//!   bytes against Subresource Integrity metadata or a `true` allowance.
//!
//! ## Key invariants
//!
//! - **Default deny**: no resource entry and no covering scope → denied.
//! - **Resource beats scope**: a resource entry always overrides scopes.
//! - **Most specific scope wins**: `/a/b/` governs `/a/b/c` over `/a/`.
//! - **Cascade only walks outward**: never from a scope into a resource.
//! - **A logged mismatch is still a failure**: the `log` reaction returns
//!   [`IntegrityCheck::Rejected`], never `Verified`.
//!
//! ## Quick Example
//!
//! ```rust
//! use mp_manifest::{Conditions, Manifest, ManifestOptions, Resolution};
//!
//! let policy = r#"{
//!     "resources": {
//!         "file:///app/main.js": { "integrity": true, "dependencies": { "fs": "./safe-fs.js" } }
//!     }
//! }"#;
//! let manifest =
//!     Manifest::from_json_str(policy, "file:///app/policy.json", ManifestOptions::default()).unwrap();
//!
//! assert!(manifest.assert_integrity("file:///app/main.js", b"...").unwrap().is_verified());
//!
//! let resolver = manifest.dependency_mapper("file:///app/main.js").unwrap();
//! match resolver.resolve("fs", &Conditions::new()).unwrap() {
//!     Resolution::Mapped(address) => assert_eq!(address.as_str(), "file:///app/safe-fs.js"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod address;
pub mod config;
pub mod dependency;
pub mod error;
pub mod integrity;
pub mod manifest;
pub mod reaction;
pub mod scope;

pub use address::{Address, Canonicalizer};
pub use config::ManifestOptions;
pub use dependency::{Conditions, DependencyResolver, Resolution, Target, DEFAULT_CONDITION};
pub use error::{IntegrityMismatch, ManifestError};
pub use manifest::{IntegrityCheck, Manifest};
pub use reaction::{ProcessTerminator, Reaction, Terminate};
