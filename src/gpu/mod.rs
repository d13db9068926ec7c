//! Accelerator backends behind a single host-visible contract.
//!
//! The engine talks to a `GpuBackend` trait object; the always-available
//! reference backend models the device contract in software and is what the
//! parity check exercises. CUDA and Metal kinds exist in the factory but
//! surface `BackendUnavailable` in this build.

pub mod adapter;
pub mod backend;
pub mod reference;

use std::str::FromStr;

use crate::error::SolverError;

pub use backend::{Buffers, GpuBackend, GpuConfig};

/// Kangaroos stepped per device thread group.
pub const GPU_GRP_SIZE: usize = 128;

/// Kangaroo steps performed by one `run_once` dispatch.
pub const NB_RUN: u32 = 64;

/// Capacity of the DP ring in items.
pub const MAX_FOUND: u32 = 65536 * 2;

/// u64 words per packed kangaroo: x[4], y[4], dist[2], symClass.
pub const KANGAROO_WORDS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Reference,
    Cuda,
    Metal,
}

impl FromStr for BackendKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" | "cpu" => Ok(BackendKind::Reference),
            "cuda" => Ok(BackendKind::Cuda),
            "metal" => Ok(BackendKind::Metal),
            other => Err(SolverError::ConfigInvalid(format!(
                "unknown gpu backend {:?}",
                other
            ))),
        }
    }
}

/// Instantiate the requested backend. There is no fallback: a missing
/// accelerator is fatal at start.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn GpuBackend>, SolverError> {
    match kind {
        BackendKind::Reference => Ok(Box::new(reference::ReferenceBackend::new())),
        BackendKind::Cuda => Err(SolverError::BackendUnavailable(
            "CUDA backend not compiled in this build".into(),
        )),
        BackendKind::Metal => Err(SolverError::BackendUnavailable(
            "Metal backend not compiled in this build".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_kinds() {
        assert!(create_backend(BackendKind::Reference).is_ok());
        assert!(create_backend(BackendKind::Cuda).is_err());
        assert!(create_backend(BackendKind::Metal).is_err());
        assert_eq!("cuda".parse::<BackendKind>().unwrap(), BackendKind::Cuda);
        assert!("opencl".parse::<BackendKind>().is_err());
    }
}
