//! Benchmarks for the walk's hot path: the group step and its batched
//! inversion.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rangeroo::kangaroo::engine::RangeInfo;
use rangeroo::kangaroo::herd::create_herd;
use rangeroo::kangaroo::walker::step_herd;
use rangeroo::kangaroo::{JumpTable, CPU_GRP_SIZE};
use rangeroo::math::{field, Secp256k1, U256};
use rangeroo::types::HerdKind;

fn bench_group_step(c: &mut Criterion) {
    let secp = Secp256k1::new();
    let range = RangeInfo::new(&U256::from_u64(0), &U256::new([0, 1, 0, 0]));
    let q = secp.compute_public_key(&U256::from_u64(0xC0FFEE));
    let jumps = JumpTable::build(&secp, range.power, false).unwrap();
    let mut rng = rand::thread_rng();
    let herd = create_herd(&secp, &range, &q, false, CPU_GRP_SIZE, HerdKind::Tame, &mut rng);

    c.bench_function("group_step_1024", |b| {
        b.iter_batched(
            || (herd.clone(), vec![U256::ZERO; CPU_GRP_SIZE]),
            |(mut herd, mut dx)| step_herd(&jumps, false, &mut herd, &mut dx),
            BatchSize::LargeInput,
        )
    });
}

fn bench_batch_inverse(c: &mut Criterion) {
    let secp = Secp256k1::new();
    let vals: Vec<U256> = (1u64..=CPU_GRP_SIZE as u64)
        .map(|i| secp.compute_public_key(&U256::from_u64(i)).x)
        .collect();

    c.bench_function("batch_inverse_1024", |b| {
        b.iter_batched(
            || vals.clone(),
            |mut v| field::batch_inverse(&mut v),
            BatchSize::LargeInput,
        )
    });

    c.bench_function("single_inverse", |b| {
        b.iter(|| field::inverse(&vals[0]))
    });
}

criterion_group!(benches, bench_group_step, bench_batch_inverse);
criterion_main!(benches);
