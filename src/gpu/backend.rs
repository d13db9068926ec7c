//! The host-visible accelerator contract, plus the packed kangaroo and
//! distance representations shared by every backend.
//!
//! Device distances are the low 128 bits of the scalar distance mod n, with
//! wild distances biased by the wild offset (width/2, or width/4 under
//! symmetry) at upload so they start non-negative. The host un-biases on
//! drain. Buffer sizes are implied by slice lengths.

use crate::math::{scalar, U256};
use crate::types::{HerdKind, KangarooState};

use super::KANGAROO_WORDS;

/// Dispatch geometry and filter parameters handed to `allocate`.
#[derive(Debug, Clone, Copy)]
pub struct GpuConfig {
    pub threads_per_group: u32,
    pub groups: u32,
    pub iterations_per_dispatch: u32,
    pub jump_count: u32,
    pub dp_mask: u64,
    pub max_found: u32,
    /// Whether the device must apply the symmetry class switch.
    pub use_symmetry: bool,
}

/// Host-side buffer geometry and walk parameters for `allocate`. The wild
/// offset lives here because the device itself re-biases distances.
#[derive(Debug, Clone, Copy)]
pub struct Buffers {
    pub total_kangaroos: u32,
    pub wild_offset: U256,
}

/// A compute accelerator able to run the kangaroo step function over a large
/// herd. One `run_once` performs `iterations_per_dispatch` steps for every
/// kangaroo, applying the symmetry switch and the dpMask DP filter exactly as
/// the CPU walker does.
pub trait GpuBackend: Send {
    fn init(&mut self) -> bool;
    fn allocate(&mut self, buffers: &Buffers, config: &GpuConfig) -> bool;
    /// Upload the jump table (parallel arrays, `dist[i]`, `px[i]`, `py[i]`).
    fn upload_jumps(&mut self, dist: &[u128], px: &[U256], py: &[U256]) -> bool;
    /// Upload the packed herd (`KANGAROO_WORDS` u64 words per kangaroo).
    fn upload_kangaroos(&mut self, host: &[u64]) -> bool;
    /// Download the packed herd into `host`.
    fn download_kangaroos(&self, host: &mut [u64]) -> bool;
    fn run_once(&mut self) -> bool;
    /// Drain the DP ring into `host_ring` (ITEM_SIZE32 u32 words per item);
    /// writes the item count into `out_count`. Items beyond `max_found` were
    /// dropped by the device.
    fn read_dp(&mut self, host_ring: &mut [u32], out_count: &mut u32) -> bool;
    fn reset_dp_count(&mut self);
    fn shutdown(&mut self);
}

/// Bias a scalar distance for the device: wild kangaroos get the wild offset
/// added mod n, then the low 128 bits travel.
pub fn pack_dist(d: &U256, kind: HerdKind, wild_offset: &U256) -> u128 {
    let adjusted = match kind {
        HerdKind::Wild => scalar::add(d, wild_offset),
        HerdKind::Tame => *d,
    };
    adjusted.low_u128()
}

/// Undo `pack_dist`. The upper scalar limbs are reconstructed as zero, which
/// is exact while the biased distance stays below 2^128 (always true for the
/// range widths this engine accepts).
pub fn unpack_dist(v: u128, kind: HerdKind, wild_offset: &U256) -> U256 {
    let raw = U256::from_u128(v);
    match kind {
        HerdKind::Wild => scalar::sub(&raw, wild_offset),
        HerdKind::Tame => raw,
    }
}

/// Pack one kangaroo into its device words.
pub fn pack_kangaroo(k: &KangarooState, idx: u64, wild_offset: &U256, out: &mut [u64]) {
    debug_assert!(out.len() >= KANGAROO_WORDS);
    out[..4].copy_from_slice(&k.x.limbs);
    out[4..8].copy_from_slice(&k.y.limbs);
    let d = pack_dist(&k.d, HerdKind::from_index(idx), wild_offset);
    out[8] = d as u64;
    out[9] = (d >> 64) as u64;
    out[10] = k.sym_class as u64;
}

/// Unpack one kangaroo from its device words.
pub fn unpack_kangaroo(words: &[u64], idx: u64, wild_offset: &U256) -> KangarooState {
    debug_assert!(words.len() >= KANGAROO_WORDS);
    let mut x = U256::ZERO;
    let mut y = U256::ZERO;
    x.limbs.copy_from_slice(&words[..4]);
    y.limbs.copy_from_slice(&words[4..8]);
    let d128 = words[8] as u128 | ((words[9] as u128) << 64);
    let d = unpack_dist(d128, HerdKind::from_index(idx), wild_offset);
    KangarooState { x, y, d, sym_class: words[10] as u8 }
}
