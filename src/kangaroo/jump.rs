//! Jump-table construction.
//!
//! The walk's branch set: NB_JUMP precomputed (distance, distance*G) pairs
//! whose mean log2 sits near rangeBits/2. The generator is seeded with a
//! fixed constant so that every peer sharing a work file derives the same
//! table.

use log::info;

use super::NB_JUMP;
use crate::error::SolverError;
use crate::math::prime::next_prime;
use crate::math::{Secp256k1, U256};

/// Fixed seed; work-file compatibility across peers depends on it.
const JUMP_SEED: u64 = 0x600DCAFE;

const MAX_RETRY: u32 = 100;

/// One jump: a distance and its precomputed curve point.
#[derive(Debug, Clone, Copy)]
pub struct JumpEntry {
    pub dist: u128,
    pub px: U256,
    pub py: U256,
}

#[derive(Debug, Clone)]
pub struct JumpTable {
    pub jumps: [JumpEntry; NB_JUMP],
    pub jump_bit: u32,
}

/// xorshift64* with a fixed multiplier; deterministic across platforms.
struct JumpRng {
    state: u64,
}

impl JumpRng {
    fn new(seed: u64) -> Self {
        JumpRng { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut s = self.state;
        s ^= s >> 12;
        s ^= s << 25;
        s ^= s >> 27;
        self.state = s;
        s.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in [0, 2^bits).
    fn rand_bits(&mut self, bits: u32) -> u128 {
        debug_assert!(bits <= 128);
        if bits == 0 {
            return 0;
        }
        let mut v = self.next_u64() as u128;
        if bits > 64 {
            v |= (self.next_u64() as u128) << 64;
        }
        if bits < 128 {
            v &= (1u128 << bits) - 1;
        }
        v
    }
}

impl JumpTable {
    /// Build the table for a range of the given bit width.
    pub fn build(
        secp: &Secp256k1,
        range_bits: u32,
        use_symmetry: bool,
    ) -> Result<JumpTable, SolverError> {
        let mut jump_bit = if use_symmetry {
            range_bits / 2
        } else {
            range_bits / 2 + 1
        };
        if jump_bit > 128 {
            jump_bit = 128;
        }
        // Degenerate tiny ranges still need a positive jump.
        if jump_bit == 0 {
            jump_bit = 1;
        }

        let mut rng = JumpRng::new(JUMP_SEED);

        // Under symmetry the two halves of the table live in distinct residue
        // classes of two primes near 2^(jumpBit/2), which breaks two-cycles
        // introduced by the class switch.
        let (u, v) = if use_symmetry {
            let u = next_prime((1u128 << (jump_bit / 2)) + 1);
            let v = next_prime(u + 2);
            info!("U= {:X}", u);
            info!("V= {:X}", v);
            (u, v)
        } else {
            (0, 0)
        };

        let min_avg = 2f64.powf(jump_bit as f64 - 1.05);
        let max_avg = 2f64.powf(jump_bit as f64 - 0.95);

        let mut dists = [0u128; NB_JUMP];
        let mut retry = MAX_RETRY;
        loop {
            let mut total = 0f64;
            for (i, d) in dists.iter_mut().enumerate() {
                let raw = if use_symmetry {
                    let m = if i < NB_JUMP / 2 { u } else { v };
                    loop {
                        if let Some(p) = rng.rand_bits(jump_bit / 2).checked_mul(m) {
                            break p;
                        }
                    }
                } else {
                    rng.rand_bits(jump_bit)
                };
                *d = if raw == 0 { 1 } else { raw };
                total += *d as f64;
            }
            let avg = total / NB_JUMP as f64;
            if avg > min_avg && avg < max_avg {
                break;
            }
            retry -= 1;
            if retry == 0 {
                return Err(SolverError::JumpTableBad(MAX_RETRY));
            }
        }

        let points: Vec<_> = dists
            .iter()
            .map(|d| secp.compute_public_key(&U256::from_u128(*d)))
            .collect();

        let mut jumps = [JumpEntry { dist: 0, px: U256::ZERO, py: U256::ZERO }; NB_JUMP];
        for i in 0..NB_JUMP {
            jumps[i] = JumpEntry { dist: dists[i], px: points[i].x, py: points[i].y };
        }

        let avg: f64 = dists.iter().map(|d| *d as f64).sum::<f64>() / NB_JUMP as f64;
        info!("Jump Avg distance: 2^{:.2}", avg.log2());

        Ok(JumpTable { jumps, jump_bit })
    }

    /// Jump index for a walker at x, split by symmetry class when enabled.
    #[inline]
    pub fn index_for(x_limb0: u64, sym_class: u8, use_symmetry: bool) -> usize {
        if use_symmetry {
            (x_limb0 as usize % (NB_JUMP / 2)) + (NB_JUMP / 2) * sym_class as usize
        } else {
            x_limb0 as usize % NB_JUMP
        }
    }
}
