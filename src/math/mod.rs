//! Mathematics for the solver: big integers, the secp256k1 field and order
//! rings, group operations, and primality testing for jump construction.

pub mod curve;
pub mod field;
pub mod prime;
pub mod scalar;
pub mod uint;

// Re-export commonly used types
pub use curve::{Point, Secp256k1};
pub use uint::U256;
