//! Herd creation and rehydration.
//!
//! Tame kangaroos start at d*G with d drawn across the (rebased) range; wild
//! ones start at Q' + d*G with d recentred on zero. Kinds alternate with the
//! kangaroo index so that every group carries both herds.

use rand::Rng;

use super::engine::RangeInfo;
use crate::math::{curve::Point, field, scalar, Secp256k1, U256};
use crate::types::{HerdKind, KangarooState};

/// Create `n` kangaroos with kinds alternating from `first_kind`.
pub fn create_herd<R: Rng>(
    secp: &Secp256k1,
    range: &RangeInfo,
    key_to_search: &Point,
    use_symmetry: bool,
    n: usize,
    first_kind: HerdKind,
    rng: &mut R,
) -> Vec<KangarooState> {
    let mut dists: Vec<U256> = Vec::with_capacity(n);

    for j in 0..n {
        let kind = HerdKind::from_index(j as u64 + first_kind as u64);
        let d = if use_symmetry {
            // Tame in [0, width/2), wild recentred to [-width/4, width/4).
            let d = scalar::rand_bits(rng, range.power.saturating_sub(1));
            if kind == HerdKind::Wild {
                scalar::sub(&d, &range.width_div4)
            } else {
                d
            }
        } else {
            // Tame in [0, width), wild recentred to [-width/2, width/2).
            let d = scalar::rand_bits(rng, range.power);
            if kind == HerdKind::Wild {
                scalar::sub(&d, &range.width_div2)
            } else {
                d
            }
        };
        dists.push(d);
    }

    let starts = secp.compute_public_keys(&dists);

    let bases: Vec<Point> = (0..n)
        .map(|j| {
            if HerdKind::from_index(j as u64 + first_kind as u64) == HerdKind::Tame {
                Point::INFINITY
            } else {
                *key_to_search
            }
        })
        .collect();

    let positions = secp.add_points(&bases, &starts);

    positions
        .into_iter()
        .zip(dists)
        .map(|(p, d)| {
            let mut y = p.y;
            let mut d = d;
            if use_symmetry && field::normalize_sign(&mut y) {
                d = scalar::neg(&d);
            }
            KangarooState { x: p.x, y, d, sym_class: 0 }
        })
        .collect()
}

/// Rebuild walker state from persisted (x, y, d) triples, topping up with
/// fresh kangaroos when fewer were saved than the worker needs. Symmetry
/// classes restart at zero, as they are not persisted.
pub fn rehydrate<R: Rng>(
    secp: &Secp256k1,
    range: &RangeInfo,
    key_to_search: &Point,
    use_symmetry: bool,
    n: usize,
    loaded: &mut Vec<KangarooState>,
    rng: &mut R,
) -> Vec<KangarooState> {
    let take = loaded.len().min(n);
    let mut herd: Vec<KangarooState> = loaded.drain(..take).collect();
    if herd.len() < n {
        let missing = n - herd.len();
        // Keep the tame/wild alternation aligned with the slot index.
        let first = HerdKind::from_index(herd.len() as u64);
        herd.extend(create_herd(
            secp,
            range,
            key_to_search,
            use_symmetry,
            missing,
            first,
            rng,
        ));
    }
    herd
}
