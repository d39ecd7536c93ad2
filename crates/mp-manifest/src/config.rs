// config.rs — Manifest construction options.
//
// Options that come from the host process rather than the policy document
// itself (the document only chooses *which* reaction to use).

use serde::{Deserialize, Serialize};

/// Options applied when constructing a [`Manifest`](crate::Manifest).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestOptions {
    /// With `onerror: "exit"`, abort the process instead of exiting with
    /// status 1 (mirrors an abort-on-uncaught-exception host flag).
    #[serde(default)]
    pub abort_on_exit: bool,
}

impl ManifestOptions {
    pub fn with_abort_on_exit(mut self, abort: bool) -> Self {
        self.abort_on_exit = abort;
        self
    }
}
