//! # mp-integrity
//!
//! Subresource Integrity (SRI) metadata for module policies.
//!
//! [`parse`] turns an integrity string such as
//! `"sha384-oqVuAf... sha512-z4PhNX..."` into ordered [`SriEntry`] values, and
//! [`verify`] checks content bytes against them with a constant-time
//! comparison. Pure and stateless: no I/O, no caching.
//!
//! ## Quick Example
//!
//! ```rust
//! use mp_integrity::{digest_sri, parse, verify, Algorithm};
//!
//! let body = b"export const answer = 42;";
//! let metadata = digest_sri(Algorithm::Sha256, body);
//! let entries = parse(&metadata).unwrap();
//! assert!(verify(&entries, body).is_match());
//! ```

pub mod error;
pub mod hasher;
pub mod sri;

pub use error::IntegrityError;
pub use hasher::{constant_time_eq, digest_sri, hash_bytes, verify, Verification};
pub use sri::{encode_digest, parse, Algorithm, SriEntry};
