//! The kangaroo engine: jump table, herds, walkers, collision resolution and
//! the orchestrator.

pub mod collision;
pub mod engine;
pub mod herd;
pub mod jump;
pub mod walker;

/// Number of entries in the jump table.
pub const NB_JUMP: usize = 32;

/// Kangaroos stepped together per CPU worker, amortising one batched field
/// inversion per step.
pub const CPU_GRP_SIZE: usize = 1024;

pub use engine::{Engine, EngineConfig, RangeInfo};
pub use jump::JumpTable;
