//! rangeroo - interval ECDLP solver for secp256k1.
//!
//! Recovers k from Q = k*G when k is known to lie in [A, B], using Pollard's
//! kangaroo method with distinguished points: tame and wild herds perform
//! pseudo-random walks until an inter-herd collision in the DP table reveals
//! the key. Scales across CPU threads and one accelerator backend.

#![deny(unsafe_code)]

pub mod check;
pub mod cli;
pub mod config;
pub mod dp;
pub mod error;
pub mod gpu;
pub mod kangaroo;
pub mod math;
pub mod types;
pub mod utils;
pub mod work;

pub use config::SearchConfig;
pub use error::SolverError;
pub use kangaroo::{Engine, EngineConfig};
pub use math::{Point, Secp256k1, U256};
pub use types::{HerdKind, Solution};
