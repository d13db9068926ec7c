//! Self-check mode (`-check`): validates the batched group operations and
//! the accelerator backend's parity with CPU stepping.

use anyhow::{bail, Result};
use log::info;
use rand::Rng;

use crate::gpu::backend::{pack_kangaroo, Buffers, GpuConfig};
use crate::gpu::{self, GPU_GRP_SIZE, KANGAROO_WORDS, MAX_FOUND, NB_RUN};
use crate::kangaroo::engine::{dp_mask_for, EngineConfig, RangeInfo};
use crate::kangaroo::{herd, walker, JumpTable, NB_JUMP};
use crate::math::{scalar, Secp256k1, U256};
use crate::types::{HerdKind, KangarooState};

/// Cross-check batched against serial public-key computation.
fn check_batch_keys(secp: &Secp256k1) -> Result<()> {
    let mut rng = rand::thread_rng();
    let nb = 1000;
    let keys: Vec<U256> = (0..nb)
        .map(|_| scalar::reduce(&scalar::rand_bits(&mut rng, 256)))
        .collect();

    let serial: Vec<_> = keys.iter().map(|k| secp.compute_public_key(k)).collect();
    let batch = secp.compute_public_keys(&keys);

    for (i, (a, b)) in serial.iter().zip(batch.iter()).enumerate() {
        if a != b {
            bail!("ComputePublicKeys mismatch at {}", i);
        }
    }
    info!("ComputePublicKeys {}: ok", nb);
    Ok(())
}

fn pack_herd(herd: &[KangarooState], wild_offset: &U256) -> Vec<u64> {
    let mut words = vec![0u64; herd.len() * KANGAROO_WORDS];
    for (i, k) in herd.iter().enumerate() {
        pack_kangaroo(k, i as u64, wild_offset, &mut words[i * KANGAROO_WORDS..(i + 1) * KANGAROO_WORDS]);
    }
    words
}

/// Run the backend for `iterations` steps and compare the downloaded herd
/// with the same herd stepped on the CPU.
fn check_parity(
    cfg: &EngineConfig,
    secp: &Secp256k1,
    iterations: u32,
    grid: (u32, u32),
) -> Result<()> {
    let range = RangeInfo::new(
        &U256::from_hex("5B3F38AF935A3640D158E871CE6E9666DB862636383386EE0000000000000000")?,
        &U256::from_hex("5B3F38AF935A3640D158E871CE6E9666DB862636383386EEFFFFFFFFFFFFFFFF")?,
    );
    let jumps = JumpTable::build(secp, range.power, cfg.use_symmetry)?;

    let mut rng = rand::thread_rng();
    let pk = scalar::reduce(&scalar::rand_bits(&mut rng, 256));
    let key_to_search = secp.compute_public_key(&pk);

    let nb = GPU_GRP_SIZE * grid.0 as usize * grid.1 as usize;
    let mut cpu_herd = herd::create_herd(
        secp,
        &range,
        &key_to_search,
        cfg.use_symmetry,
        nb,
        HerdKind::Tame,
        &mut rng,
    );
    // Mix in one freshly reseeded kangaroo, as a reset would.
    let single = rng.gen_range(0..nb);
    let fresh = herd::create_herd(
        secp,
        &range,
        &key_to_search,
        cfg.use_symmetry,
        1,
        HerdKind::from_index(single as u64),
        &mut rng,
    );
    cpu_herd[single] = fresh[0];

    let wild_offset = if cfg.use_symmetry { range.width_div4 } else { range.width_div2 };
    let words = pack_herd(&cpu_herd, &wild_offset);

    let mut backend = gpu::create_backend(cfg.backend_kind)?;
    if !backend.init() {
        bail!("gpu backend: init failed");
    }
    let config = GpuConfig {
        threads_per_group: grid.1,
        groups: grid.0,
        iterations_per_dispatch: iterations,
        jump_count: NB_JUMP as u32,
        dp_mask: dp_mask_for(8),
        max_found: MAX_FOUND,
        use_symmetry: cfg.use_symmetry,
    };
    if !backend.allocate(&Buffers { total_kangaroos: nb as u32, wild_offset }, &config) {
        bail!("gpu backend: allocate failed");
    }
    let dist: Vec<u128> = jumps.jumps.iter().map(|j| j.dist).collect();
    let px: Vec<U256> = jumps.jumps.iter().map(|j| j.px).collect();
    let py: Vec<U256> = jumps.jumps.iter().map(|j| j.py).collect();
    if !backend.upload_jumps(&dist, &px, &py) {
        bail!("gpu backend: uploadJumps failed");
    }
    if !backend.upload_kangaroos(&words) {
        bail!("gpu backend: uploadKangaroos failed");
    }
    backend.reset_dp_count();

    if !backend.run_once() {
        bail!("gpu backend: runOnce failed");
    }
    let mut device_words = vec![0u64; nb * KANGAROO_WORDS];
    if !backend.download_kangaroos(&mut device_words) {
        bail!("gpu backend: downloadKangaroos failed");
    }
    backend.shutdown();

    let mut dx = vec![U256::ZERO; nb];
    for _ in 0..iterations {
        walker::step_herd(&jumps, cfg.use_symmetry, &mut cpu_herd, &mut dx);
    }
    let cpu_words = pack_herd(&cpu_herd, &wild_offset);

    let mismatches = cpu_words
        .chunks_exact(KANGAROO_WORDS)
        .zip(device_words.chunks_exact(KANGAROO_WORDS))
        .filter(|(a, b)| a != b)
        .count();
    if mismatches != 0 {
        bail!(
            "gpu/cpu parity failed for {} of {} kangaroos after {} iteration(s)",
            mismatches,
            nb,
            iterations
        );
    }
    info!("GPU/CPU parity ({} iteration(s), {} kangaroos): ok", iterations, nb);
    Ok(())
}

/// Entry point for `-check`.
pub fn run_check(cfg: &EngineConfig) -> Result<()> {
    let secp = Secp256k1::new();

    check_batch_keys(&secp)?;

    if cfg.use_gpu {
        // Keep the software-modelled herd small enough to finish promptly.
        let grid = (cfg.gpu_grid.0.min(4), cfg.gpu_grid.1.min(4));
        check_parity(cfg, &secp, 1, grid)?;
        check_parity(cfg, &secp, NB_RUN, grid)?;
    }

    Ok(())
}
