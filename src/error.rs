//! Error kinds surfaced by the solver.
//!
//! Walker loops treat their inputs as validated and never construct these;
//! the orchestrator and the load/save paths are where they originate, and
//! `main` maps them to exit codes.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    /// Malformed config file, bad pubkey, or rangeStart > rangeEnd.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Read/write failure on a work file. Fatal on load; on save the flush
    /// is skipped and the live engine continues.
    #[error("i/o failure on {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Wrong magic or version in a work-file header.
    #[error("format mismatch in {path}: {detail}")]
    FormatMismatch { path: PathBuf, detail: String },

    /// Jump-table construction exhausted its redraws.
    #[error("jump table construction failed: mean distance constraint not met after {0} redraws")]
    JumpTableBad(u32),

    /// A loaded public key does not lie on secp256k1.
    #[error("curve mismatch: {0}")]
    CurveMismatch(String),

    /// The requested accelerator backend is not compiled in.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl SolverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SolverError::IoFailure { path: path.into(), source }
    }
}
