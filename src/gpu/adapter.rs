//! Host-side accelerator adapter: owns the backend, feeds drained DPs into
//! the shared ingestion path and keeps the device herd in sync with resets
//! and snapshots.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{error, info};

use super::backend::{pack_kangaroo, unpack_dist, unpack_kangaroo, Buffers, GpuBackend, GpuConfig};
use super::{GPU_GRP_SIZE, KANGAROO_WORDS, MAX_FOUND, NB_RUN};
use crate::kangaroo::engine::SearchCtx;
use crate::kangaroo::{herd, NB_JUMP};
use crate::math::U256;
use crate::types::{DpItem, HerdKind, ITEM_SIZE32};

/// Adapter thread body. `slot_idx` is the adapter's slot and counter index.
pub fn solve_key_gpu(
    ctx: Arc<SearchCtx>,
    mut backend: Box<dyn GpuBackend>,
    grid: (u32, u32),
    slot_idx: usize,
) {
    let slot = &ctx.slots[slot_idx];
    let nb_kangaroo = GPU_GRP_SIZE as u64 * grid.0 as u64 * grid.1 as u64;

    // A failed device setup marks the worker finished so the orchestrator
    // never blocks on it.
    macro_rules! fail {
        ($msg:expr) => {{
            error!($msg);
            slot.has_started.store(true, Ordering::SeqCst);
            slot.is_waiting.store(true, Ordering::SeqCst);
            slot.is_running.store(false, Ordering::SeqCst);
            backend.shutdown();
            return;
        }};
    }

    if !backend.init() {
        fail!("gpu backend: init failed");
    }

    let wild_offset = if ctx.use_symmetry {
        ctx.range.width_div4
    } else {
        ctx.range.width_div2
    };

    let mut rng = rand::thread_rng();
    let mut host_herd = {
        let mut seed = slot.seed_herd.lock().unwrap();
        if seed.is_empty() {
            if ctx.key_idx == 0 {
                info!("SolveKeyGPU: creating 2^{:.2} kangaroos", (nb_kangaroo as f64).log2());
            }
            herd::create_herd(
                &ctx.secp,
                &ctx.range,
                &ctx.key_to_search,
                ctx.use_symmetry,
                nb_kangaroo as usize,
                HerdKind::Tame,
                &mut rng,
            )
        } else {
            std::mem::take(&mut *seed)
        }
    };

    let config = GpuConfig {
        threads_per_group: grid.1,
        groups: grid.0,
        iterations_per_dispatch: NB_RUN,
        jump_count: NB_JUMP as u32,
        dp_mask: ctx.dp_mask,
        max_found: MAX_FOUND,
        use_symmetry: ctx.use_symmetry,
    };
    let buffers = Buffers { total_kangaroos: nb_kangaroo as u32, wild_offset };
    if !backend.allocate(&buffers, &config) {
        fail!("gpu backend: allocate failed");
    }

    let dist: Vec<u128> = ctx.jumps.jumps.iter().map(|j| j.dist).collect();
    let px: Vec<U256> = ctx.jumps.jumps.iter().map(|j| j.px).collect();
    let py: Vec<U256> = ctx.jumps.jumps.iter().map(|j| j.py).collect();
    if !backend.upload_jumps(&dist, &px, &py) {
        fail!("gpu backend: uploadJumps failed");
    }

    let mut words = vec![0u64; nb_kangaroo as usize * KANGAROO_WORDS];
    for (i, k) in host_herd.iter().enumerate() {
        pack_kangaroo(k, i as u64, &wild_offset, &mut words[i * KANGAROO_WORDS..(i + 1) * KANGAROO_WORDS]);
    }
    if !backend.upload_kangaroos(&words) {
        fail!("gpu backend: uploadKangaroos failed");
    }
    backend.reset_dp_count();

    // The host copy is only needed again when kangaroos are persisted.
    if !ctx.save_kangaroo {
        host_herd.clear();
    }

    slot.has_started.store(true, Ordering::SeqCst);

    let mut ring = vec![0u32; MAX_FOUND as usize * ITEM_SIZE32];

    while !ctx.end_of_search.load(Ordering::Acquire) {
        if !backend.run_once() {
            error!("gpu backend: runOnce failed");
            break;
        }
        ctx.counters[slot_idx].fetch_add(nb_kangaroo * NB_RUN as u64, Ordering::Relaxed);

        let mut found = 0u32;
        if !backend.read_dp(&mut ring, &mut found) {
            error!("gpu backend: readDP failed");
            break;
        }
        backend.reset_dp_count();

        for i in 0..found as usize {
            if ctx.end_of_search.load(Ordering::Acquire) {
                break;
            }
            let item = DpItem::read_words(&ring[i * ITEM_SIZE32..(i + 1) * ITEM_SIZE32]);
            let kind = HerdKind::from_index(item.kangaroo_idx);
            let d = unpack_dist(item.d, kind, &wild_offset);

            if !ctx.ingest_dp(&item.x, &d, kind) {
                // Reset the dead kangaroo on the device.
                let fresh = herd::create_herd(
                    &ctx.secp,
                    &ctx.range,
                    &ctx.key_to_search,
                    ctx.use_symmetry,
                    1,
                    kind,
                    &mut rng,
                );
                if backend.download_kangaroos(&mut words) {
                    let off = item.kangaroo_idx as usize * KANGAROO_WORDS;
                    pack_kangaroo(
                        &fresh[0],
                        item.kangaroo_idx,
                        &wild_offset,
                        &mut words[off..off + KANGAROO_WORDS],
                    );
                    if !backend.upload_kangaroos(&words) {
                        error!("gpu backend: uploadKangaroos failed during reset");
                    }
                } else {
                    error!("gpu backend: downloadKangaroos failed during reset");
                }
                ctx.dead_kangaroos.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Snapshot barrier.
        if ctx.save_request.load(Ordering::Acquire) && !ctx.end_of_search.load(Ordering::Acquire) {
            if ctx.save_kangaroo {
                if backend.download_kangaroos(&mut words) {
                    host_herd = words
                        .chunks_exact(KANGAROO_WORDS)
                        .enumerate()
                        .map(|(i, w)| unpack_kangaroo(w, i as u64, &wild_offset))
                        .collect();
                    *slot.saved_herd.lock().unwrap() = host_herd.clone();
                } else {
                    error!("gpu backend: downloadKangaroos failed during save");
                }
            }
            slot.is_waiting.store(true, Ordering::SeqCst);
            drop(ctx.save_mutex.lock().unwrap());
            slot.is_waiting.store(false, Ordering::SeqCst);
        }
    }

    backend.shutdown();
    slot.is_running.store(false, Ordering::SeqCst);
}
