//! Arithmetic modulo the secp256k1 group order n.
//!
//! Kangaroo distances live here: they are scalars mod n, where values above
//! n/2 represent negative travel. Only add/sub/neg are needed on the walk
//! hot path; there is no modular multiplication in this ring.

use rand::Rng;

use super::uint::U256;

/// The group order n.
pub const N: U256 = U256::new([
    0xBFD25E8CD0364141,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0xFFFFFFFFFFFFFFFF,
]);

/// n / 2, the boundary between positive and negative distances.
pub const N_HALF: U256 = U256::new([
    0xDFE92F46681B20A0,
    0x5D576E7357A4501D,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
]);

#[inline]
pub fn add(a: &U256, b: &U256) -> U256 {
    let (s, carry) = a.overflowing_add(b);
    if carry || s >= N {
        s.wrapping_sub(&N)
    } else {
        s
    }
}

#[inline]
pub fn sub(a: &U256, b: &U256) -> U256 {
    let (d, borrow) = a.overflowing_sub(b);
    if borrow {
        d.wrapping_add(&N)
    } else {
        d
    }
}

#[inline]
pub fn neg(a: &U256) -> U256 {
    if a.is_zero() {
        U256::ZERO
    } else {
        N.wrapping_sub(a)
    }
}

/// Reduce an arbitrary 256-bit value mod n.
pub fn reduce(a: &U256) -> U256 {
    let mut r = *a;
    while r >= N {
        r = r.wrapping_sub(&N);
    }
    r
}

/// True when the scalar encodes a negative distance (above n/2).
#[inline]
pub fn is_negative(a: &U256) -> bool {
    *a > N_HALF
}

/// Split a distance into magnitude and sign. Magnitudes stay below n/2,
/// which fits 128 bits for every range this engine accepts.
pub fn abs(a: &U256) -> (U256, bool) {
    if is_negative(a) {
        (neg(a), true)
    } else {
        (*a, false)
    }
}

/// Uniform random value in [0, 2^bits).
pub fn rand_bits<R: Rng>(rng: &mut R, bits: u32) -> U256 {
    if bits == 0 {
        return U256::ZERO;
    }
    let bits = bits.min(256);
    let mut limbs = [0u64; 4];
    let full = (bits / 64) as usize;
    for limb in limbs.iter_mut().take(full) {
        *limb = rng.gen();
    }
    let rem = bits % 64;
    if rem > 0 {
        limbs[full] = rng.gen::<u64>() & ((1u64 << rem) - 1);
    }
    U256::new(limbs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_half_is_half_of_n() {
        let twice = N_HALF.wrapping_add(&N_HALF).wrapping_add(&U256::ONE);
        assert_eq!(twice, N);
    }

    #[test]
    fn add_wraps_at_n() {
        let nm1 = N.wrapping_sub(&U256::ONE);
        assert_eq!(add(&nm1, &U256::ONE), U256::ZERO);
        assert_eq!(add(&nm1, &U256::from_u64(3)), U256::from_u64(2));
    }

    #[test]
    fn sub_and_neg_agree() {
        let a = U256::from_u64(10);
        let b = U256::from_u64(25);
        assert_eq!(sub(&a, &b), add(&a, &neg(&b)));
        assert_eq!(neg(&neg(&a)), a);
    }

    #[test]
    fn signed_magnitude_round_trip() {
        let d = U256::from_u64(123456);
        let negd = neg(&d);
        assert!(is_negative(&negd));
        let (mag, sign) = abs(&negd);
        assert!(sign);
        assert_eq!(mag, d);
        let (mag2, sign2) = abs(&d);
        assert!(!sign2);
        assert_eq!(mag2, d);
    }

    #[test]
    fn rand_bits_respects_bound() {
        let mut rng = rand::thread_rng();
        for bits in [0u32, 1, 17, 64, 65, 127] {
            for _ in 0..16 {
                let v = rand_bits(&mut rng, bits);
                assert!(v.bit_length() <= bits);
            }
        }
    }
}
