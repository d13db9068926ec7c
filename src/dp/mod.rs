//! Distinguished-point storage and collision detection.

pub mod table;

pub use table::{AddResult, DpEntry, HashTable, HASH_SIZE};
