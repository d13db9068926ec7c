//! Cross-validation of the hand-rolled secp256k1 arithmetic against k256.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{ProjectivePoint, Scalar};
use rangeroo::math::{field, scalar, Secp256k1, U256};

fn k256_scalar(v: &U256) -> Scalar {
    let bytes = v.to_bytes_be();
    Scalar::from_repr(bytes.into()).unwrap()
}

fn k256_pubkey(v: &U256) -> ([u8; 32], [u8; 32]) {
    let p = (ProjectivePoint::GENERATOR * k256_scalar(v)).to_affine();
    let enc = p.to_encoded_point(false);
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(enc.x().unwrap());
    y.copy_from_slice(enc.y().unwrap());
    (x, y)
}

#[test]
fn generator_matches_k256() {
    let secp = Secp256k1::new();
    let (x, y) = k256_pubkey(&U256::ONE);
    assert_eq!(secp.g.x.to_bytes_be(), x);
    assert_eq!(secp.g.y.to_bytes_be(), y);
}

#[test]
fn public_keys_match_k256() {
    let secp = Secp256k1::new();
    let cases = [
        U256::from_u64(2),
        U256::from_u64(0x0123456789ABCDEF),
        U256::from_hex("00000000000000000000000000000000DEADBEEF00112233445566778899AABB").unwrap(),
        scalar::N.wrapping_sub(&U256::ONE),
    ];
    for k in &cases {
        let p = secp.compute_public_key(k);
        let (x, y) = k256_pubkey(k);
        assert_eq!(p.x.to_bytes_be(), x, "x mismatch for {}", k);
        assert_eq!(p.y.to_bytes_be(), y, "y mismatch for {}", k);
    }
}

#[test]
fn random_public_keys_match_k256() {
    let secp = Secp256k1::new();
    let mut rng = rand::thread_rng();
    for _ in 0..16 {
        let k = scalar::reduce(&scalar::rand_bits(&mut rng, 256));
        if k.is_zero() {
            continue;
        }
        let p = secp.compute_public_key(&k);
        let (x, y) = k256_pubkey(&k);
        assert_eq!(p.x.to_bytes_be(), x);
        assert_eq!(p.y.to_bytes_be(), y);
    }
}

#[test]
fn point_addition_matches_scalar_addition() {
    let secp = Secp256k1::new();
    let a = U256::from_u64(123456789);
    let b = U256::from_u64(987654321);
    let pa = secp.compute_public_key(&a);
    let pb = secp.compute_public_key(&b);
    let sum = secp.add(&pa, &pb);
    let expect = secp.compute_public_key(&scalar::add(&a, &b));
    assert_eq!(sum, expect);
}

#[test]
fn compressed_encoding_matches_k256() {
    let secp = Secp256k1::new();
    let k = U256::from_u64(0xC0FFEE);
    let p = secp.compute_public_key(&k);
    let ours = secp.format_public_key(true, &p);

    let theirs = (ProjectivePoint::GENERATOR * k256_scalar(&k))
        .to_affine()
        .to_encoded_point(true);
    assert_eq!(ours.to_lowercase(), hex::encode(theirs.as_bytes()));
}

#[test]
fn field_inverse_agrees_with_multiplication() {
    // Batch inversion of chord denominators is the walk's core primitive;
    // validate it over values derived from real point coordinates.
    let secp = Secp256k1::new();
    let mut vals: Vec<U256> = (1u64..=32)
        .map(|i| secp.compute_public_key(&U256::from_u64(i)).x)
        .collect();
    let orig = vals.clone();
    field::batch_inverse(&mut vals);
    for (v, inv) in orig.iter().zip(vals.iter()) {
        assert_eq!(field::mul(v, inv), U256::ONE);
    }
}
