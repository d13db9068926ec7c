//! secp256k1 group operations.
//!
//! Points are affine with an all-zero sentinel for the identity; scalar
//! multiplication and additions run through Jacobian coordinates internally
//! so that only one field inversion is paid per batch of results.

use anyhow::Result;

use super::field;
use super::uint::U256;
use crate::error::SolverError;

/// Affine secp256k1 point. `x = y = 0` encodes the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: U256,
    pub y: U256,
}

impl Point {
    pub const INFINITY: Point = Point { x: U256::ZERO, y: U256::ZERO };

    #[inline]
    pub fn is_infinity(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    /// The point with the same x and negated y.
    pub fn negate(&self) -> Point {
        if self.is_infinity() {
            *self
        } else {
            Point { x: self.x, y: field::neg(&self.y) }
        }
    }
}

/// Jacobian representation used internally; `z = 0` is the identity.
#[derive(Debug, Clone, Copy)]
struct Jacobian {
    x: U256,
    y: U256,
    z: U256,
}

impl Jacobian {
    const INFINITY: Jacobian = Jacobian { x: U256::ONE, y: U256::ONE, z: U256::ZERO };

    fn from_affine(p: &Point) -> Jacobian {
        if p.is_infinity() {
            Jacobian::INFINITY
        } else {
            Jacobian { x: p.x, y: p.y, z: U256::ONE }
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    fn double(&self) -> Jacobian {
        if self.is_infinity() || self.y.is_zero() {
            return Jacobian::INFINITY;
        }
        let y2 = field::sqr(&self.y);
        let s = {
            let xy2 = field::mul(&self.x, &y2);
            let t = field::add(&xy2, &xy2);
            field::add(&t, &t)
        };
        let m = {
            let x2 = field::sqr(&self.x);
            field::add(&field::add(&x2, &x2), &x2)
        };
        let x3 = field::sub(&field::sqr(&m), &field::add(&s, &s));
        let y4 = field::sqr(&y2);
        let y4_8 = {
            let t = field::add(&y4, &y4);
            let t = field::add(&t, &t);
            field::add(&t, &t)
        };
        let y3 = field::sub(&field::mul(&m, &field::sub(&s, &x3)), &y4_8);
        let z3 = {
            let yz = field::mul(&self.y, &self.z);
            field::add(&yz, &yz)
        };
        Jacobian { x: x3, y: y3, z: z3 }
    }

    /// Mixed addition of an affine point.
    fn add_affine(&self, q: &Point) -> Jacobian {
        if q.is_infinity() {
            return *self;
        }
        if self.is_infinity() {
            return Jacobian::from_affine(q);
        }
        let z1z1 = field::sqr(&self.z);
        let u2 = field::mul(&q.x, &z1z1);
        let s2 = field::mul(&q.y, &field::mul(&self.z, &z1z1));
        let h = field::sub(&u2, &self.x);
        let r = field::sub(&s2, &self.y);
        if h.is_zero() {
            return if r.is_zero() { self.double() } else { Jacobian::INFINITY };
        }
        let hh = field::sqr(&h);
        let hhh = field::mul(&h, &hh);
        let v = field::mul(&self.x, &hh);
        let x3 = field::sub(&field::sub(&field::sqr(&r), &hhh), &field::add(&v, &v));
        let y3 = field::sub(&field::mul(&r, &field::sub(&v, &x3)), &field::mul(&self.y, &hhh));
        let z3 = field::mul(&self.z, &h);
        Jacobian { x: x3, y: y3, z: z3 }
    }

    fn to_affine(&self) -> Point {
        if self.is_infinity() {
            return Point::INFINITY;
        }
        let zinv = field::inverse(&self.z);
        self.to_affine_with(&zinv)
    }

    fn to_affine_with(&self, zinv: &U256) -> Point {
        let zinv2 = field::sqr(zinv);
        let zinv3 = field::mul(&zinv2, zinv);
        Point {
            x: field::mul(&self.x, &zinv2),
            y: field::mul(&self.y, &zinv3),
        }
    }
}

/// The curve context: generator and the curve equation helpers.
#[derive(Debug, Clone)]
pub struct Secp256k1 {
    pub g: Point,
}

impl Default for Secp256k1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Secp256k1 {
    pub fn new() -> Self {
        Secp256k1 {
            g: Point {
                x: U256::new([
                    0x59F2815B16F81798,
                    0x029BFCDB2DCE28D9,
                    0x55A06295CE870B07,
                    0x79BE667EF9DCBBAC,
                ]),
                y: U256::new([
                    0x9C47D08FFB10D4B8,
                    0xFD17B448A6855419,
                    0x5DA4FBFC0E1108A8,
                    0x483ADA7726A3C465,
                ]),
            },
        }
    }

    /// k * p, plain double-and-add.
    pub fn mul(&self, k: &U256, p: &Point) -> Point {
        let mut acc = Jacobian::INFINITY;
        let bits = k.bit_length();
        for i in (0..bits).rev() {
            acc = acc.double();
            if k.bit(i) {
                acc = acc.add_affine(p);
            }
        }
        acc.to_affine()
    }

    /// k * G.
    pub fn compute_public_key(&self, k: &U256) -> Point {
        self.mul(k, &self.g)
    }

    /// One public key per scalar, normalised with a single batch inversion.
    pub fn compute_public_keys(&self, ks: &[U256]) -> Vec<Point> {
        let jacs: Vec<Jacobian> = ks
            .iter()
            .map(|k| {
                let mut acc = Jacobian::INFINITY;
                for i in (0..k.bit_length()).rev() {
                    acc = acc.double();
                    if k.bit(i) {
                        acc = acc.add_affine(&self.g);
                    }
                }
                acc
            })
            .collect();

        let mut zs: Vec<U256> = Vec::with_capacity(jacs.len());
        for j in &jacs {
            // Identity elements get a placeholder so the batch stays invertible.
            zs.push(if j.is_infinity() { U256::ONE } else { j.z });
        }
        field::batch_inverse(&mut zs);

        jacs.iter()
            .zip(zs.iter())
            .map(|(j, zinv)| {
                if j.is_infinity() {
                    Point::INFINITY
                } else {
                    j.to_affine_with(zinv)
                }
            })
            .collect()
    }

    /// p + q in affine coordinates.
    pub fn add(&self, p: &Point, q: &Point) -> Point {
        Jacobian::from_affine(p).add_affine(q).to_affine()
    }

    /// Element-wise p[i] + q[i] with one batch inversion for the chords.
    pub fn add_points(&self, ps: &[Point], qs: &[Point]) -> Vec<Point> {
        assert_eq!(ps.len(), qs.len());
        let mut out = vec![Point::INFINITY; ps.len()];
        let mut dx: Vec<U256> = Vec::with_capacity(ps.len());
        let mut chord_idx: Vec<usize> = Vec::with_capacity(ps.len());

        for (i, (p, q)) in ps.iter().zip(qs.iter()).enumerate() {
            if p.is_infinity() || q.is_infinity() || p.x == q.x {
                // Degenerate cases go through the generic path.
                out[i] = self.add(p, q);
            } else {
                dx.push(field::sub(&q.x, &p.x));
                chord_idx.push(i);
            }
        }

        field::batch_inverse(&mut dx);

        for (inv, &i) in dx.iter().zip(chord_idx.iter()) {
            let (p, q) = (&ps[i], &qs[i]);
            let s = field::mul(&field::sub(&q.y, &p.y), inv);
            let rx = field::sub(&field::sub(&field::sqr(&s), &p.x), &q.x);
            let ry = field::sub(&field::mul(&s, &field::sub(&p.x, &rx)), &p.y);
            out[i] = Point { x: rx, y: ry };
        }
        out
    }

    /// y² == x³ + 7.
    pub fn is_on_curve(&self, p: &Point) -> bool {
        if p.is_infinity() {
            return true;
        }
        let y2 = field::sqr(&p.y);
        let x3 = field::mul(&field::sqr(&p.x), &p.x);
        y2 == field::add(&x3, &U256::from_u64(7))
    }

    /// Parse a compressed (66 hex chars, 02/03) or uncompressed (130 hex
    /// chars, 04) public key. Returns the point and whether it was compressed.
    pub fn parse_public_key(&self, s: &str) -> Result<(Point, bool)> {
        let s = s.trim();
        let (point, compressed) = match s.len() {
            66 => {
                let prefix = &s[..2];
                if prefix != "02" && prefix != "03" {
                    return Err(SolverError::ConfigInvalid(format!(
                        "bad compressed pubkey prefix {:?}",
                        prefix
                    ))
                    .into());
                }
                let x = U256::from_hex(&s[2..])?;
                let y2 = field::add(&field::mul(&field::sqr(&x), &x), &U256::from_u64(7));
                let mut y = field::sqrt(&y2).ok_or_else(|| {
                    SolverError::CurveMismatch(format!("x has no curve point: {}", &s[2..66]))
                })?;
                let want_even = prefix == "02";
                if field::is_even(&y) != want_even {
                    y = field::neg(&y);
                }
                (Point { x, y }, true)
            }
            130 => {
                if &s[..2] != "04" {
                    return Err(SolverError::ConfigInvalid(format!(
                        "bad uncompressed pubkey prefix {:?}",
                        &s[..2]
                    ))
                    .into());
                }
                let x = U256::from_hex(&s[2..66])?;
                let y = U256::from_hex(&s[66..])?;
                (Point { x, y }, false)
            }
            n => {
                return Err(SolverError::ConfigInvalid(format!(
                    "pubkey must be 66 or 130 hex chars, got {}",
                    n
                ))
                .into())
            }
        };
        if !self.is_on_curve(&point) {
            return Err(SolverError::CurveMismatch(
                "point does not lie on secp256k1".to_string(),
            )
            .into());
        }
        Ok((point, compressed))
    }

    /// Hex encoding, compressed (02/03 prefix) or uncompressed (04 prefix).
    pub fn format_public_key(&self, compressed: bool, p: &Point) -> String {
        if compressed {
            let prefix = if field::is_even(&p.y) { "02" } else { "03" };
            format!("{}{}", prefix, p.x.to_hex())
        } else {
            format!("04{}{}", p.x.to_hex(), p.y.to_hex())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::scalar;

    #[test]
    fn generator_is_on_curve() {
        let secp = Secp256k1::new();
        assert!(secp.is_on_curve(&secp.g));
        assert!(secp.is_on_curve(&Point::INFINITY));
    }

    #[test]
    fn small_multiples_agree_with_addition() {
        let secp = Secp256k1::new();
        let g2 = secp.add(&secp.g, &secp.g);
        let g3 = secp.add(&g2, &secp.g);
        assert_eq!(secp.compute_public_key(&U256::from_u64(2)), g2);
        assert_eq!(secp.compute_public_key(&U256::from_u64(3)), g3);
        assert!(secp.is_on_curve(&g3));
    }

    #[test]
    fn mul_by_order_gives_identity() {
        let secp = Secp256k1::new();
        assert!(secp.mul(&scalar::N, &secp.g).is_infinity());
        assert!(secp.mul(&U256::ZERO, &secp.g).is_infinity());
        assert_eq!(secp.mul(&U256::ONE, &secp.g), secp.g);
    }

    #[test]
    fn negation_cancels() {
        let secp = Secp256k1::new();
        let p = secp.compute_public_key(&U256::from_u64(1234));
        assert!(secp.add(&p, &p.negate()).is_infinity());
    }

    #[test]
    fn batch_public_keys_match_serial() {
        let secp = Secp256k1::new();
        let ks: Vec<U256> = (1u64..=9).map(U256::from_u64).collect();
        let batch = secp.compute_public_keys(&ks);
        for (k, p) in ks.iter().zip(batch.iter()) {
            assert_eq!(*p, secp.compute_public_key(k));
        }
    }

    #[test]
    fn batch_point_addition() {
        let secp = Secp256k1::new();
        let ps = vec![
            Point::INFINITY,
            secp.compute_public_key(&U256::from_u64(5)),
            secp.compute_public_key(&U256::from_u64(7)),
        ];
        let qs = vec![
            secp.g,
            secp.compute_public_key(&U256::from_u64(11)),
            secp.compute_public_key(&U256::from_u64(7)),
        ];
        let sums = secp.add_points(&ps, &qs);
        assert_eq!(sums[0], secp.g);
        assert_eq!(sums[1], secp.compute_public_key(&U256::from_u64(16)));
        assert_eq!(sums[2], secp.compute_public_key(&U256::from_u64(14)));
    }

    #[test]
    fn pubkey_parse_round_trip() {
        let secp = Secp256k1::new();
        let p = secp.compute_public_key(&U256::from_u64(0xDEADBEEF));
        let compressed = secp.format_public_key(true, &p);
        let (parsed, was_compressed) = secp.parse_public_key(&compressed).unwrap();
        assert!(was_compressed);
        assert_eq!(parsed, p);

        let full = secp.format_public_key(false, &p);
        let (parsed2, was_compressed2) = secp.parse_public_key(&full).unwrap();
        assert!(!was_compressed2);
        assert_eq!(parsed2, p);
    }

    #[test]
    fn pubkey_rejects_garbage() {
        let secp = Secp256k1::new();
        assert!(secp.parse_public_key("01abcd").is_err());
        // Valid-length string whose x is not on the curve for prefix 02.
        let off_curve = format!("04{}{}", U256::from_u64(1).to_hex(), U256::from_u64(1).to_hex());
        assert!(secp.parse_public_key(&off_curve).is_err());
    }
}
