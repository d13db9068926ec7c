//! Collision resolution: turning a (tame, wild) distance pair into a private
//! key candidate and verifying it against the target.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use log::warn;

use crate::math::{curve::Point, scalar, Secp256k1, U256};

/// Everything the resolver needs to know about the current search.
pub struct ResolveCtx<'a> {
    pub secp: &'a Secp256k1,
    /// The rebased target Q' = Q - (rangeStart [+ width/2])*G.
    pub key_to_search: &'a Point,
    pub key_to_search_neg: &'a Point,
    pub range_start: &'a U256,
    pub width_div2: &'a U256,
    pub use_symmetry: bool,
}

/// A resolved collision: the recovered key plus which of the eight checks
/// matched (sign info for the report line).
pub struct Resolution {
    pub private_key: U256,
    pub sign_info: char,
    pub check_type: u8,
}

/// Try one sign combination: negate d1 when bit 0 of `ty` is set, d2 when
/// bit 1 is. Returns the full private key on a match.
fn check_key(ctx: &ResolveCtx, d1: &U256, d2: &U256, ty: u8) -> Option<Resolution> {
    let d1 = if ty & 1 != 0 { scalar::neg(d1) } else { *d1 };
    let d2 = if ty & 2 != 0 { scalar::neg(d2) } else { *d2 };

    let mut pk = scalar::add(&d1, &d2);
    let p = ctx.secp.compute_public_key(&pk);

    if p == *ctx.key_to_search {
        if ctx.use_symmetry {
            pk = scalar::add(&pk, ctx.width_div2);
        }
        pk = scalar::add(&pk, ctx.range_start);
        return Some(Resolution { private_key: pk, sign_info: 'N', check_type: ty });
    }

    if p == *ctx.key_to_search_neg {
        let mut pk = scalar::neg(&pk);
        if ctx.use_symmetry {
            pk = scalar::add(&pk, ctx.width_div2);
        }
        pk = scalar::add(&pk, ctx.range_start);
        return Some(Resolution { private_key: pk, sign_info: 'S', check_type: ty });
    }

    None
}

/// Resolve a tame/wild collision by trying all four sign combinations
/// against the target and its negation. `None` means the collision was
/// spurious: the caller resets the walker and the search continues.
pub fn resolve(ctx: &ResolveCtx, d_tame: &U256, d_wild: &U256) -> Option<Resolution> {
    for ty in 0..4u8 {
        if let Some(r) = check_key(ctx, d_tame, d_wild, ty) {
            return Some(r);
        }
    }

    let fmt_signed = |d: &U256| {
        let (mag, neg) = scalar::abs(d);
        if neg {
            format!("-{}", mag.to_hex())
        } else {
            mag.to_hex()
        }
    };
    warn!(
        "unexpected wrong collision, resetting kangaroo (Td {} / Wd {})",
        fmt_signed(d_tame),
        fmt_signed(d_wild)
    );
    None
}

/// Print the solved key, echo the matching public key, and optionally append
/// to the output file. Returns false if the recomputed public key does not
/// match the target (resolution bug, never expected).
pub fn output_solution(
    secp: &Secp256k1,
    target: &Point,
    resolution: &Resolution,
    key_idx: usize,
    output_file: Option<&Path>,
) -> bool {
    let pr = secp.compute_public_key(&resolution.private_key);
    let ok = pr == *target;

    let mut lines = format!(
        "Key#{:2} [{}{}]Pub:  0x{}\n",
        key_idx,
        resolution.check_type,
        resolution.sign_info,
        secp.format_public_key(true, target)
    );
    if ok {
        lines.push_str(&format!("       Priv: 0x{}\n", resolution.private_key.to_hex()));
    } else {
        lines.push_str("       Failed !\n");
    }

    print!("\n{}", lines);

    if let Some(path) = output_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(mut f) => {
                if let Err(e) = f.write_all(lines.as_bytes()) {
                    warn!("cannot write result to {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("cannot open {} for writing: {}", path.display(), e),
        }
    }

    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        secp: &'a Secp256k1,
        key: &'a Point,
        key_neg: &'a Point,
        start: &'a U256,
        wd2: &'a U256,
    ) -> ResolveCtx<'a> {
        ResolveCtx {
            secp,
            key_to_search: key,
            key_to_search_neg: key_neg,
            range_start: start,
            width_div2: wd2,
            use_symmetry: false,
        }
    }

    #[test]
    fn resolves_sign_combination_collision() {
        // k = 5, tame lands on 8G, wild carries d = -3 so Q + dG = 2G...
        // the matching combination is d_tame + d_wild = 8 - 3 = 5.
        let secp = Secp256k1::new();
        let k = U256::from_u64(5);
        let q = secp.compute_public_key(&k);
        let q_neg = q.negate();
        let start = U256::ZERO;
        let wd2 = U256::ZERO;
        let rc = ctx(&secp, &q, &q_neg, &start, &wd2);

        let d_tame = U256::from_u64(8);
        let d_wild = scalar::neg(&U256::from_u64(3));
        let r = resolve(&rc, &d_tame, &d_wild).expect("collision must resolve");
        assert_eq!(r.private_key, k);
    }

    #[test]
    fn resolves_negated_target() {
        // Tame at 2G, Q = 7G, wild d = -9: d_tame + d_wild = -7, so the
        // candidate matches -Q and the key is the negation.
        let secp = Secp256k1::new();
        let k = U256::from_u64(7);
        let q = secp.compute_public_key(&k);
        let q_neg = q.negate();
        let start = U256::ZERO;
        let wd2 = U256::ZERO;
        let rc = ctx(&secp, &q, &q_neg, &start, &wd2);

        let d_tame = U256::from_u64(2);
        let d_wild = scalar::neg(&U256::from_u64(9));
        let r = resolve(&rc, &d_tame, &d_wild).expect("collision must resolve");
        assert_eq!(r.private_key, k);
        assert_eq!(r.sign_info, 'S');
    }

    #[test]
    fn range_start_is_added_back() {
        let secp = Secp256k1::new();
        let start = U256::from_u64(1000);
        let k_full = U256::from_u64(1005);
        let q = secp.compute_public_key(&k_full);
        // Rebased target Q' = Q - start*G.
        let shift = secp.compute_public_key(&start).negate();
        let q_prime = secp.add(&q, &shift);
        let q_prime_neg = q_prime.negate();
        let wd2 = U256::ZERO;
        let rc = ctx(&secp, &q_prime, &q_prime_neg, &start, &wd2);

        let d_tame = U256::from_u64(3);
        let d_wild = U256::from_u64(2);
        let r = resolve(&rc, &d_tame, &d_wild).expect("collision must resolve");
        assert_eq!(r.private_key, k_full);
    }

    #[test]
    fn spurious_collision_returns_none() {
        let secp = Secp256k1::new();
        let q = secp.compute_public_key(&U256::from_u64(123456));
        let q_neg = q.negate();
        let start = U256::ZERO;
        let wd2 = U256::ZERO;
        let rc = ctx(&secp, &q, &q_neg, &start, &wd2);
        assert!(resolve(&rc, &U256::from_u64(1), &U256::from_u64(2)).is_none());
    }

    #[test]
    fn output_verifies_recovered_key() {
        let secp = Secp256k1::new();
        let k = U256::from_u64(42);
        let q = secp.compute_public_key(&k);
        let r = Resolution { private_key: k, sign_info: 'N', check_type: 0 };
        assert!(output_solution(&secp, &q, &r, 0, None));
        let bad = Resolution { private_key: U256::from_u64(43), sign_info: 'N', check_type: 0 };
        assert!(!output_solution(&secp, &q, &bad, 0, None));
    }
}
