//! Error taxonomy for compiler invocation and batch processing.
//!
//! Unresolvable types have no variant: they degrade to an opaque
//! object type inside the resolver and never surface as errors.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failure to obtain a declaration tree from the compiler.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to spawn compiler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error preparing compilation unit: {0}")]
    Io(#[from] std::io::Error),

    #[error("compiler produced an unparsable declaration tree: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compiler exited with {status} and produced no declaration tree: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("declaration tree parsing was interrupted: {0}")]
    Interrupted(String),
}

/// Per-batch failure reported by the worker pool. Never aborts sibling batches.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("framework `{framework}`: compiler invocation failed for {header}: {source}")]
    Invocation {
        framework: String,
        /// First header of the batch, enough to re-run it in isolation.
        header: PathBuf,
        #[source]
        source: InvokeError,
    },

    #[error("framework `{framework}`: worker panicked: {message}")]
    Panicked { framework: String, message: String },

    #[error("framework `{framework}`: worker pool is shut down")]
    PoolClosed { framework: String },
}

impl BatchError {
    pub fn framework(&self) -> &str {
        match self {
            BatchError::Invocation { framework, .. }
            | BatchError::Panicked { framework, .. }
            | BatchError::PoolClosed { framework } => framework,
        }
    }
}
