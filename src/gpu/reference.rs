//! Software reference backend: models the accelerator contract exactly,
//! using the same step function as the CPU walker. Always available; this is
//! what `-check` compares against and what `-gpu` drives in builds without a
//! real accelerator.

use log::warn;

use super::backend::{pack_dist, pack_kangaroo, unpack_kangaroo, Buffers, GpuBackend, GpuConfig};
use super::KANGAROO_WORDS;
use crate::kangaroo::jump::{JumpEntry, JumpTable};
use crate::kangaroo::{walker, NB_JUMP};
use crate::math::U256;
use crate::types::{DpItem, HerdKind, KangarooState, ITEM_SIZE32};

pub struct ReferenceBackend {
    config: Option<GpuConfig>,
    wild_offset: U256,
    total: usize,
    jumps: Option<JumpTable>,
    herd: Vec<KangarooState>,
    dx: Vec<U256>,
    ring: Vec<u32>,
    dp_count: u32,
    overflowed: bool,
}

impl ReferenceBackend {
    pub fn new() -> Self {
        ReferenceBackend {
            config: None,
            wild_offset: U256::ZERO,
            total: 0,
            jumps: None,
            herd: Vec::new(),
            dx: Vec::new(),
            ring: Vec::new(),
            dp_count: 0,
            overflowed: false,
        }
    }

    fn scan_dps(&mut self, cfg: &GpuConfig) {
        for (i, k) in self.herd.iter().enumerate() {
            if k.x.limbs[3] & cfg.dp_mask == 0 {
                if self.dp_count < cfg.max_found {
                    let item = DpItem {
                        x: k.x,
                        d: pack_dist(&k.d, HerdKind::from_index(i as u64), &self.wild_offset),
                        kangaroo_idx: i as u64,
                    };
                    let off = self.dp_count as usize * ITEM_SIZE32;
                    item.write_words(&mut self.ring[off..off + ITEM_SIZE32]);
                    self.dp_count += 1;
                } else if !self.overflowed {
                    // Extras are dropped; throughput cost only.
                    warn!("DP ring overflow, extra distinguished points dropped");
                    self.overflowed = true;
                }
            }
        }
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for ReferenceBackend {
    fn init(&mut self) -> bool {
        true
    }

    fn allocate(&mut self, buffers: &Buffers, config: &GpuConfig) -> bool {
        if config.jump_count as usize != NB_JUMP {
            return false;
        }
        self.total = buffers.total_kangaroos as usize;
        self.wild_offset = buffers.wild_offset;
        self.ring = vec![0u32; config.max_found as usize * ITEM_SIZE32];
        self.dx = vec![U256::ZERO; self.total];
        self.config = Some(*config);
        true
    }

    fn upload_jumps(&mut self, dist: &[u128], px: &[U256], py: &[U256]) -> bool {
        if dist.len() != NB_JUMP || px.len() != NB_JUMP || py.len() != NB_JUMP {
            return false;
        }
        let mut jumps = [JumpEntry { dist: 0, px: U256::ZERO, py: U256::ZERO }; NB_JUMP];
        for i in 0..NB_JUMP {
            jumps[i] = JumpEntry { dist: dist[i], px: px[i], py: py[i] };
        }
        self.jumps = Some(JumpTable { jumps, jump_bit: 0 });
        true
    }

    fn upload_kangaroos(&mut self, host: &[u64]) -> bool {
        if host.len() != self.total * KANGAROO_WORDS {
            return false;
        }
        self.herd = host
            .chunks_exact(KANGAROO_WORDS)
            .enumerate()
            .map(|(i, w)| unpack_kangaroo(w, i as u64, &self.wild_offset))
            .collect();
        true
    }

    fn download_kangaroos(&self, host: &mut [u64]) -> bool {
        if host.len() != self.total * KANGAROO_WORDS || self.herd.len() != self.total {
            return false;
        }
        for (i, k) in self.herd.iter().enumerate() {
            pack_kangaroo(
                k,
                i as u64,
                &self.wild_offset,
                &mut host[i * KANGAROO_WORDS..(i + 1) * KANGAROO_WORDS],
            );
        }
        true
    }

    fn run_once(&mut self) -> bool {
        let cfg = match self.config {
            Some(c) => c,
            None => return false,
        };
        let jumps = match self.jumps.take() {
            Some(j) => j,
            None => return false,
        };
        if self.herd.len() != self.total {
            self.jumps = Some(jumps);
            return false;
        }
        self.overflowed = false;
        for _ in 0..cfg.iterations_per_dispatch {
            walker::step_herd(&jumps, cfg.use_symmetry, &mut self.herd, &mut self.dx);
            self.scan_dps(&cfg);
        }
        self.jumps = Some(jumps);
        true
    }

    fn read_dp(&mut self, host_ring: &mut [u32], out_count: &mut u32) -> bool {
        let words = self.dp_count as usize * ITEM_SIZE32;
        if host_ring.len() < words {
            return false;
        }
        host_ring[..words].copy_from_slice(&self.ring[..words]);
        *out_count = self.dp_count;
        true
    }

    fn reset_dp_count(&mut self) {
        self.dp_count = 0;
        self.overflowed = false;
    }

    fn shutdown(&mut self) {
        self.config = None;
        self.jumps = None;
        self.herd.clear();
        self.ring.clear();
        self.dp_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kangaroo::engine::{dp_mask_for, RangeInfo};
    use crate::kangaroo::herd::create_herd;
    use crate::math::Secp256k1;

    fn setup(n: usize, dp_bits: u32) -> (ReferenceBackend, Vec<KangarooState>, JumpTable, U256) {
        let secp = Secp256k1::new();
        let range = RangeInfo::new(&U256::from_u64(0), &U256::from_u64(1 << 32));
        let q = secp.compute_public_key(&U256::from_u64(0x1234567));
        let mut rng = rand::thread_rng();
        let herd = create_herd(&secp, &range, &q, false, n, HerdKind::Tame, &mut rng);
        let jumps = JumpTable::build(&secp, range.power, false).unwrap();
        let offset = range.width_div2;

        let mut be = ReferenceBackend::new();
        assert!(be.init());
        let cfg = GpuConfig {
            threads_per_group: 1,
            groups: n as u32,
            iterations_per_dispatch: 1,
            jump_count: NB_JUMP as u32,
            dp_mask: dp_mask_for(dp_bits),
            max_found: 16,
            use_symmetry: false,
        };
        assert!(be.allocate(&Buffers { total_kangaroos: n as u32, wild_offset: offset }, &cfg));
        let dist: Vec<u128> = jumps.jumps.iter().map(|j| j.dist).collect();
        let px: Vec<U256> = jumps.jumps.iter().map(|j| j.px).collect();
        let py: Vec<U256> = jumps.jumps.iter().map(|j| j.py).collect();
        assert!(be.upload_jumps(&dist, &px, &py));
        (be, herd, jumps, offset)
    }

    #[test]
    fn upload_download_round_trip() {
        let (mut be, herd, _jumps, offset) = setup(8, 8);
        let mut words = vec![0u64; 8 * KANGAROO_WORDS];
        for (i, k) in herd.iter().enumerate() {
            pack_kangaroo(k, i as u64, &offset, &mut words[i * KANGAROO_WORDS..(i + 1) * KANGAROO_WORDS]);
        }
        assert!(be.upload_kangaroos(&words));
        let mut back = vec![0u64; 8 * KANGAROO_WORDS];
        assert!(be.download_kangaroos(&mut back));
        assert_eq!(words, back);
    }

    #[test]
    fn dp_ring_respects_capacity() {
        // dp_bits 0: every kangaroo yields a DP every step, 32 > max_found 16.
        let (mut be, herd, _jumps, offset) = setup(32, 0);
        let mut words = vec![0u64; 32 * KANGAROO_WORDS];
        for (i, k) in herd.iter().enumerate() {
            pack_kangaroo(k, i as u64, &offset, &mut words[i * KANGAROO_WORDS..(i + 1) * KANGAROO_WORDS]);
        }
        assert!(be.upload_kangaroos(&words));
        assert!(be.run_once());
        let mut ring = vec![0u32; 16 * ITEM_SIZE32];
        let mut count = 0u32;
        assert!(be.read_dp(&mut ring, &mut count));
        assert_eq!(count, 16);
        be.reset_dp_count();
        let mut count2 = 0u32;
        assert!(be.read_dp(&mut ring, &mut count2));
        assert_eq!(count2, 0);
    }
}
