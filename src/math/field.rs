//! Arithmetic modulo the secp256k1 field prime p = 2^256 - 2^32 - 977.
//!
//! Elements are reduced `U256` values. Multiplication computes the full
//! 512-bit product then folds the high half with 2^256 ≡ 0x1000003D1 (mod p).
//! The batch inversion here is the walker's per-step primitive: one field
//! inversion plus 3(m-1) multiplications for a group of m elements.

use super::uint::U256;

/// The field prime p.
pub const P: U256 = U256::new([
    0xFFFFFFFEFFFFFC2F,
    0xFFFFFFFFFFFFFFFF,
    0xFFFFFFFFFFFFFFFF,
    0xFFFFFFFFFFFFFFFF,
]);

/// (p - 1) / 2, the boundary between the two symmetry classes of y.
const P_HALF: U256 = U256::new([
    0xFFFFFFFF7FFFFE17,
    0xFFFFFFFFFFFFFFFF,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
]);

/// 2^256 mod p.
const FOLD: u64 = 0x1000003D1;

#[inline]
pub fn add(a: &U256, b: &U256) -> U256 {
    let (s, carry) = a.overflowing_add(b);
    if carry || s >= P {
        s.wrapping_sub(&P)
    } else {
        s
    }
}

#[inline]
pub fn sub(a: &U256, b: &U256) -> U256 {
    let (d, borrow) = a.overflowing_sub(b);
    if borrow {
        d.wrapping_add(&P)
    } else {
        d
    }
}

#[inline]
pub fn neg(a: &U256) -> U256 {
    if a.is_zero() {
        U256::ZERO
    } else {
        P.wrapping_sub(a)
    }
}

/// Reduce a 512-bit product modulo p by folding the high half twice.
fn reduce_wide(w: [u64; 8]) -> U256 {
    let low = U256::new([w[0], w[1], w[2], w[3]]);
    let high = U256::new([w[4], w[5], w[6], w[7]]);

    // low + high * FOLD; the product of the high half with the 33-bit fold
    // constant spills at most one limb.
    let (m, m_top) = high.overflowing_mul_u64(FOLD);
    let (mut s, c1) = low.overflowing_add(&m);
    let spill = m_top + c1 as u64;

    if spill != 0 {
        let t = U256::from_u128(spill as u128 * FOLD as u128);
        let (s2, c2) = s.overflowing_add(&t);
        s = s2;
        if c2 {
            // A second wrap leaves a tiny value; one more fold settles it.
            s = s.wrapping_add(&U256::from_u64(FOLD));
        }
    }

    while s >= P {
        s = s.wrapping_sub(&P);
    }
    s
}

#[inline]
pub fn mul(a: &U256, b: &U256) -> U256 {
    reduce_wide(a.mul_wide(b))
}

#[inline]
pub fn sqr(a: &U256) -> U256 {
    reduce_wide(a.mul_wide(a))
}

/// a^e mod p, square-and-multiply from the top bit down.
fn pow(a: &U256, e: &U256) -> U256 {
    let mut r = U256::ONE;
    let bits = e.bit_length();
    for i in (0..bits).rev() {
        r = sqr(&r);
        if e.bit(i) {
            r = mul(&r, a);
        }
    }
    r
}

/// Modular inverse by Fermat's little theorem: a^(p-2) mod p.
/// Returns zero for zero.
pub fn inverse(a: &U256) -> U256 {
    let e = P.wrapping_sub(&U256::from_u64(2));
    pow(a, &e)
}

/// Modular square root via a^((p+1)/4) (valid since p ≡ 3 mod 4).
/// Returns None when a is not a quadratic residue.
pub fn sqrt(a: &U256) -> Option<U256> {
    let e = P.wrapping_add(&U256::ONE).shr1().shr1();
    let r = pow(a, &e);
    if sqr(&r) == *a {
        Some(r)
    } else {
        None
    }
}

/// Invert every element of the slice in place using Montgomery's trick.
/// All elements must be non-zero.
pub fn batch_inverse(vals: &mut [U256]) {
    let m = vals.len();
    if m == 0 {
        return;
    }
    let mut prefix = Vec::with_capacity(m);
    let mut acc = U256::ONE;
    for v in vals.iter() {
        prefix.push(acc);
        acc = mul(&acc, v);
    }
    let mut inv = inverse(&acc);
    for i in (0..m).rev() {
        let orig = vals[i];
        vals[i] = mul(&inv, &prefix[i]);
        inv = mul(&inv, &orig);
    }
}

/// Force y into the canonical symmetry class (y ≤ (p-1)/2), returning
/// whether it was flipped.
#[inline]
pub fn normalize_sign(y: &mut U256) -> bool {
    if *y > P_HALF {
        *y = P.wrapping_sub(y);
        true
    } else {
        false
    }
}

/// True when y is even, used for compressed pubkey prefixes.
#[inline]
pub fn is_even(y: &U256) -> bool {
    y.limbs[0] & 1 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_wrap_at_p() {
        let one = U256::ONE;
        let pm1 = P.wrapping_sub(&one);
        assert_eq!(add(&pm1, &one), U256::ZERO);
        assert_eq!(sub(&U256::ZERO, &one), pm1);
        assert_eq!(neg(&one), pm1);
        assert_eq!(neg(&U256::ZERO), U256::ZERO);
    }

    #[test]
    fn mul_small_values() {
        let a = U256::from_u64(1 << 40);
        let b = U256::from_u64(1 << 30);
        assert_eq!(mul(&a, &b), U256::from_u128(1u128 << 70));
    }

    #[test]
    fn mul_wraps_with_fold_constant() {
        // (p-1)^2 mod p = 1
        let pm1 = P.wrapping_sub(&U256::ONE);
        assert_eq!(mul(&pm1, &pm1), U256::ONE);
        assert_eq!(sqr(&pm1), U256::ONE);
    }

    #[test]
    fn inverse_round_trip() {
        let a = U256::from_hex("0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF").unwrap();
        let inv = inverse(&a);
        assert_eq!(mul(&a, &inv), U256::ONE);
    }

    #[test]
    fn batch_inverse_matches_serial() {
        let mut vals: Vec<U256> = (1u64..=17).map(|i| U256::from_u64(i * 0x1234567)).collect();
        let expect: Vec<U256> = vals.iter().map(inverse).collect();
        batch_inverse(&mut vals);
        assert_eq!(vals, expect);
    }

    #[test]
    fn sqrt_of_square() {
        let a = U256::from_u64(0xC0FFEE);
        let a2 = sqr(&a);
        let r = sqrt(&a2).unwrap();
        assert!(r == a || r == neg(&a));
    }

    #[test]
    fn sign_normalization_is_involutive() {
        let mut y = P.wrapping_sub(&U256::from_u64(5));
        assert!(normalize_sign(&mut y));
        assert_eq!(y, U256::from_u64(5));
        assert!(!normalize_sign(&mut y));
    }
}
