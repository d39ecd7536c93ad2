// reaction.rs — What a manifest does when a policy violation is detected.
//
// The reaction is chosen once from the document's `onerror` field:
//
//   "throw" (default) → the error is returned to the caller
//   "exit"            → the error is logged, then the process terminates
//   "log"             → the error is logged and the caller continues, but
//                       the check still reports failure
//
// Termination goes through the `Terminate` trait so embedders (and tests)
// control how the process actually ends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ManifestError;

/// Ends the process on behalf of the `exit` reaction.
pub trait Terminate: Send + Sync {
    /// Exit with the given status code. Never returns.
    fn exit(&self, code: i32) -> !;
    /// Abort immediately (e.g. to produce a core dump). Never returns.
    fn abort(&self) -> !;
}

/// Terminates the real process via `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminate for ProcessTerminator {
    fn exit(&self, code: i32) -> ! {
        std::process::exit(code)
    }

    fn abort(&self) -> ! {
        std::process::abort()
    }
}

/// The configured response to a policy violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    #[default]
    Throw,
    Exit,
    Log,
}

impl Reaction {
    /// Read the `onerror` field of a policy document (`None` when absent).
    pub fn from_json(value: Option<&Value>) -> Result<Self, ManifestError> {
        match value {
            None => Ok(Reaction::Throw),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(ManifestError::UnknownOnError {
                value: other.to_string(),
            }),
        }
    }

    /// Apply the reaction to `error`.
    ///
    /// `Throw` hands the error back; `Log` records it and returns `Ok`;
    /// `Exit` records it and never returns.
    pub fn react(
        self,
        error: ManifestError,
        terminator: &dyn Terminate,
        abort: bool,
    ) -> Result<(), ManifestError> {
        match self {
            Reaction::Throw => Err(error),
            Reaction::Log => {
                tracing::error!(error = %error, "policy violation");
                Ok(())
            }
            Reaction::Exit => {
                tracing::error!(error = %error, abort, "policy violation, terminating");
                if abort {
                    terminator.abort()
                } else {
                    terminator.exit(1)
                }
            }
        }
    }
}

impl FromStr for Reaction {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throw" => Ok(Reaction::Throw),
            "exit" => Ok(Reaction::Exit),
            "log" => Ok(Reaction::Log),
            other => Err(ManifestError::UnknownOnError {
                value: format!("\"{other}\""),
            }),
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reaction::Throw => "throw",
            Reaction::Exit => "exit",
            Reaction::Log => "log",
        })
    }
}
