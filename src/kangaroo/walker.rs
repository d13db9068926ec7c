//! The CPU herd walker: one thread advancing CPU_GRP_SIZE kangaroos per
//! step, paying a single batched field inversion per group step.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::info;

use super::engine::SearchCtx;
use super::herd;
use super::jump::JumpTable;
use crate::math::{field, scalar, U256};
use crate::types::HerdKind;

/// Advance every kangaroo of the herd by one jump. `dx` is caller-provided
/// scratch of the same length; one batched inversion serves the whole herd.
/// This is the step function the accelerator contract must reproduce.
pub fn step_herd(
    jumps: &JumpTable,
    use_symmetry: bool,
    herd: &mut [crate::types::KangarooState],
    dx: &mut [U256],
) {
    debug_assert_eq!(herd.len(), dx.len());

    for (g, kang) in herd.iter().enumerate() {
        let jmp = JumpTable::index_for(kang.x.limbs[0], kang.sym_class, use_symmetry);
        dx[g] = field::sub(&kang.x, &jumps.jumps[jmp].px);
    }
    field::batch_inverse(dx);

    for (g, kang) in herd.iter_mut().enumerate() {
        let jmp = JumpTable::index_for(kang.x.limbs[0], kang.sym_class, use_symmetry);
        let jp = &jumps.jumps[jmp];

        let s = field::mul(&field::sub(&kang.y, &jp.py), &dx[g]);
        let rx = field::sub(&field::sub(&field::sqr(&s), &jp.px), &kang.x);
        let mut ry = field::sub(&field::mul(&s, &field::sub(&kang.x, &rx)), &kang.y);

        kang.d = scalar::add(&kang.d, &U256::from_u128(jp.dist));

        if use_symmetry && field::normalize_sign(&mut ry) {
            kang.d = scalar::neg(&kang.d);
            kang.sym_class ^= 1;
        }

        kang.x = rx;
        kang.y = ry;
    }
}

/// Worker entry point. `thread_id` indexes this worker's slot and counter.
pub(crate) fn solve_key_cpu(ctx: Arc<SearchCtx>, thread_id: usize) {
    let grp = ctx.grp_size;
    let mut rng = rand::thread_rng();

    let mut herd = {
        let mut seed = ctx.slots[thread_id].seed_herd.lock().unwrap();
        if seed.is_empty() {
            herd::create_herd(
                &ctx.secp,
                &ctx.range,
                &ctx.key_to_search,
                ctx.use_symmetry,
                grp,
                HerdKind::Tame,
                &mut rng,
            )
        } else {
            std::mem::take(&mut *seed)
        }
    };

    if ctx.key_idx == 0 && thread_id == 0 {
        info!("SolveKeyCPU: {} kangaroos per thread", grp);
    }

    let slot = &ctx.slots[thread_id];
    slot.has_started.store(true, Ordering::SeqCst);

    let mut dx = vec![U256::ZERO; grp];

    while !ctx.end_of_search.load(Ordering::Acquire) {
        step_herd(&ctx.jumps, ctx.use_symmetry, &mut herd, &mut dx);

        // DP filter and table ingestion.
        for g in 0..grp {
            if ctx.end_of_search.load(Ordering::Acquire) {
                break;
            }
            if ctx.is_dp(herd[g].x.limbs[3]) {
                let kind = HerdKind::from_index(g as u64);
                if !ctx.ingest_dp(&herd[g].x, &herd[g].d, kind) {
                    // Walked onto a recorded track of its own herd: respawn
                    // with the same kind.
                    let fresh = herd::create_herd(
                        &ctx.secp,
                        &ctx.range,
                        &ctx.key_to_search,
                        ctx.use_symmetry,
                        1,
                        kind,
                        &mut rng,
                    );
                    herd[g] = fresh[0];
                    ctx.dead_kangaroos.fetch_add(1, Ordering::Relaxed);
                }
            }
            if !ctx.end_of_search.load(Ordering::Relaxed) {
                ctx.counters[thread_id].fetch_add(1, Ordering::Relaxed);
            }
        }

        // Snapshot barrier: publish the herd if asked, then park on the save
        // mutex until the capture is over.
        if ctx.save_request.load(Ordering::Acquire) && !ctx.end_of_search.load(Ordering::Acquire) {
            if ctx.save_kangaroo {
                *slot.saved_herd.lock().unwrap() = herd.clone();
            }
            slot.is_waiting.store(true, Ordering::SeqCst);
            drop(ctx.save_mutex.lock().unwrap());
            slot.is_waiting.store(false, Ordering::SeqCst);
        }
    }

    slot.is_running.store(false, Ordering::SeqCst);
}
