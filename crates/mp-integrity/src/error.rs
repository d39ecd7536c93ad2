// error.rs — Error types for integrity metadata.
//
// Uses `thiserror` to derive the standard Rust `Error` trait automatically.
// Parsing errors are configuration errors: they describe a malformed
// integrity string in the policy, never a problem with the content itself.

use thiserror::Error;

/// Errors that can occur while parsing integrity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// The metadata does not follow the `algorithm-digest[?options]` grammar,
    /// or two entries are not separated by whitespace.
    #[error("error parsing subresource integrity at character {position}")]
    Parse { position: usize },

    /// The algorithm name is not one of sha256, sha384, sha512.
    #[error("unsupported integrity algorithm '{0}'")]
    UnknownAlgorithm(String),
}
