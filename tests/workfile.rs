//! Work-file persistence: round-trips, merges, partitioned layout and the
//! engine's save/resume path.

use std::time::Duration;

use rangeroo::dp::{AddResult, HashTable};
use rangeroo::kangaroo::{Engine, EngineConfig};
use rangeroo::math::{scalar, Secp256k1, U256};
use rangeroo::types::{DpDist, HerdKind, KangarooState};
use rangeroo::work::partition;
use rangeroo::work::snapshot::{load_work, write_work_file, WorkHeader};

fn sample_header(secp: &Secp256k1, key_scalar: u64) -> WorkHeader {
    WorkHeader {
        dp_bits: 8,
        range_start: U256::from_u64(0x1000),
        range_end: U256::from_u64(0x1FFF),
        key: secp.compute_public_key(&U256::from_u64(key_scalar)),
        total_count: 123456,
        total_time: 42.5,
    }
}

fn x_in_bucket(bucket: u64, salt: u64) -> U256 {
    U256::new([salt, salt.wrapping_mul(7919), (bucket << 42) | (salt & 0xFFFF), 0])
}

fn dist(v: u64, kind: HerdKind) -> DpDist {
    DpDist { d_abs: v as u128, neg: false, kind }
}

#[test]
fn binary_round_trip_is_byte_identical() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let p1 = dir.path().join("work1.bin");
    let p2 = dir.path().join("work2.bin");

    let mut table = HashTable::new();
    for i in 0..1000u64 {
        table.add(&x_in_bucket(i % 97, i + 1), dist(i, HerdKind::from_index(i)));
    }
    let walks = vec![
        KangarooState {
            x: U256::from_u64(11),
            y: U256::from_u64(22),
            d: U256::from_u64(33),
            sym_class: 0,
        };
        4
    ];

    let header = sample_header(&secp, 0x1234);
    write_work_file(&p1, &header, &table, &walks).unwrap();

    let loaded = load_work(&secp, &p1).unwrap();
    assert_eq!(loaded.dp_bits, 8);
    assert_eq!(loaded.range_start, header.range_start);
    assert_eq!(loaded.range_end, header.range_end);
    assert_eq!(loaded.key, header.key);
    assert_eq!(loaded.total_count, 123456);
    assert_eq!(loaded.table.n_items(), table.n_items());
    assert_eq!(loaded.walks.len(), 4);

    // Saving the loaded state again reproduces the file byte for byte.
    let header2 = WorkHeader {
        dp_bits: loaded.dp_bits,
        range_start: loaded.range_start,
        range_end: loaded.range_end,
        key: loaded.key,
        total_count: header.total_count,
        total_time: header.total_time,
    };
    write_work_file(&p2, &header2, &loaded.table, &loaded.walks).unwrap();
    assert_eq!(std::fs::read(&p1).unwrap(), std::fs::read(&p2).unwrap());
}

#[test]
fn load_rejects_garbage_and_bad_keys() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();

    let garbage = dir.path().join("garbage.bin");
    std::fs::write(&garbage, b"not a work file at all").unwrap();
    assert!(load_work(&secp, &garbage).is_err());

    let missing = dir.path().join("missing.bin");
    assert!(load_work(&secp, &missing).is_err());
}

#[test]
fn merge_accumulates_and_dedups() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let f1 = dir.path().join("a.bin");
    let f2 = dir.path().join("b.bin");
    let dest = dir.path().join("merged.bin");

    let header = sample_header(&secp, 0x1234);

    let mut t1 = HashTable::new();
    let mut t2 = HashTable::new();
    for i in 0..100u64 {
        t1.add(&x_in_bucket(i, i + 1), dist(i, HerdKind::Tame));
    }
    for i in 50..150u64 {
        // Same x derivation: entries 50..100 duplicate t1's.
        t2.add(&x_in_bucket(i, i + 1), dist(i, HerdKind::Tame));
    }

    write_work_file(&f1, &header, &t1, &[]).unwrap();
    write_work_file(&f2, &header, &t2, &[]).unwrap();

    let solved = partition::merge_work(&secp, &f1, &f2, &dest).unwrap();
    assert!(!solved);

    let merged = load_work(&secp, &dest).unwrap();
    assert_eq!(merged.table.n_items(), 150);
    assert_eq!(merged.total_count, 123456 * 2);
}

#[test]
fn merge_rejects_mismatched_headers() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let f1 = dir.path().join("a.bin");
    let f2 = dir.path().join("b.bin");

    let t = HashTable::new();
    write_work_file(&f1, &sample_header(&secp, 0x1234), &t, &[]).unwrap();
    write_work_file(&f2, &sample_header(&secp, 0x5678), &t, &[]).unwrap();

    assert!(partition::merge_work(&secp, &f1, &f2, &dir.path().join("out.bin")).is_err());
}

#[test]
fn merge_can_solve_the_key() {
    // Two halves of a real collision: tame distance 0x234 at k*G means the
    // wild walker sits at the same x with wild distance 0, since
    // Q' + 0*G = (k - start)*G = tame position for start + 0x234 = k.
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let f1 = dir.path().join("a.bin");
    let f2 = dir.path().join("b.bin");
    let dest = dir.path().join("merged.bin");

    let k = U256::from_u64(0x1234);
    let header = WorkHeader {
        dp_bits: 0,
        range_start: U256::from_u64(0x1000),
        range_end: U256::from_u64(0x1FFF),
        key: secp.compute_public_key(&k),
        total_count: 0,
        total_time: 0.0,
    };

    // Both walkers sit on the same point: d_tame*G with d_tame = k - start.
    let d_tame = U256::from_u64(0x234);
    let pos = secp.compute_public_key(&d_tame);

    let mut t1 = HashTable::new();
    assert_eq!(t1.add(&pos.x, DpDist::from_scalar(&d_tame, HerdKind::Tame)), AddResult::Ok);
    let mut t2 = HashTable::new();
    assert_eq!(
        t2.add(&pos.x, DpDist::from_scalar(&U256::ZERO, HerdKind::Wild)),
        AddResult::Ok
    );

    write_work_file(&f1, &header, &t1, &[]).unwrap();
    write_work_file(&f2, &header, &t2, &[]).unwrap();

    let solved = partition::merge_work(&secp, &f1, &f2, &dest).unwrap();
    assert!(solved, "merging the two collision halves must solve the key");
}

#[test]
fn work_check_validates_entries() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.bin");
    let bad = dir.path().join("bad.bin");

    let start = U256::from_u64(0x1000);
    let k = U256::from_u64(0x1777);
    let header = WorkHeader {
        dp_bits: 0,
        range_start: start,
        range_end: U256::from_u64(0x1FFF),
        key: secp.compute_public_key(&k),
        total_count: 0,
        total_time: 0.0,
    };
    let shift = secp.compute_public_key(&start).negate();
    let key_to_search = secp.add(&header.key, &shift);

    let mut table = HashTable::new();
    for i in 1..40u64 {
        let d = U256::from_u64(i * 3);
        let kind = HerdKind::from_index(i);
        let pos = match kind {
            HerdKind::Tame => secp.compute_public_key(&d),
            HerdKind::Wild => secp.add(&key_to_search, &secp.compute_public_key(&d)),
        };
        table.add(&pos.x, DpDist::from_scalar(&d, kind));
    }
    write_work_file(&good, &header, &table, &[]).unwrap();
    assert_eq!(partition::check_work_file(&secp, &good).unwrap(), 0);

    // Corrupt one entry: same x, inconsistent distance.
    let mut corrupt = HashTable::new();
    let pos = secp.compute_public_key(&U256::from_u64(3));
    corrupt.add(&pos.x, dist(999, HerdKind::Tame));
    write_work_file(&bad, &header, &corrupt, &[]).unwrap();
    assert_eq!(partition::check_work_file(&secp, &bad).unwrap(), 1);
}

#[test]
fn partition_round_trip() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("parts");

    partition::create_partition(&part_dir).unwrap();
    assert!(part_dir.join("header").exists());
    assert!(part_dir.join("part000").exists());
    assert!(part_dir.join("part255").exists());

    // An empty partition loads as an empty table.
    let empty = partition::load_partition(&secp, &part_dir).unwrap();
    assert_eq!(empty.table.n_items(), 0);

    // Fill, save into the partition, reload.
    let mut table = HashTable::new();
    for i in 0..500u64 {
        table.add(&x_in_bucket(i * 8191 % (1 << 22), i + 1), dist(i, HerdKind::from_index(i)));
    }
    let n = table.n_items();
    let header = sample_header(&secp, 0x1234);
    let loaded = rangeroo::work::snapshot::LoadedWork {
        dp_bits: header.dp_bits,
        range_start: header.range_start,
        range_end: header.range_end,
        key: header.key,
        total_count: header.total_count,
        total_time: header.total_time,
        table,
        walks: Vec::new(),
    };
    partition::save_to_partition(&loaded, &part_dir).unwrap();

    let back = partition::load_partition(&secp, &part_dir).unwrap();
    assert_eq!(back.table.n_items(), n);
    assert_eq!(back.key, header.key);
}

#[test]
fn engine_saves_and_resumes() {
    // Abort an unsolvable search after it has flushed one snapshot, then
    // resume from the snapshot and verify range, key and DP count survive.
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("resume.bin");

    let q = secp.compute_public_key(&U256::from_u64(3)); // outside the range
    let start =
        U256::from_hex("0000000000000000000000000000000000000000000000010000000000000000")
            .unwrap();
    let end =
        U256::from_hex("0000000000000000000000000000000000000000000000010000000100000000")
            .unwrap();

    let cfg = EngineConfig {
        nb_thread: 1,
        dp_bits: Some(4),
        grp_size: 16,
        work_file: Some(work.clone()),
        save_period: Duration::from_secs(1),
        save_kangaroo: true,
        max_step: 0.001,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(cfg, start, end, vec![q]);
    assert!(engine.run().unwrap().is_none(), "must abort");
    assert!(work.exists(), "snapshot must have been flushed before the abort");

    let loaded = load_work(&secp, &work).unwrap();
    assert_eq!(loaded.dp_bits, 4);
    assert_eq!(loaded.range_start, start);
    assert_eq!(loaded.range_end, end);
    assert_eq!(loaded.key, q);
    assert!(loaded.walks.len() >= 16, "kangaroos must be persisted with -ws");

    // A resumed engine picks the persisted parameters up.
    let cfg2 = EngineConfig {
        nb_thread: 1,
        grp_size: 16,
        max_step: 0.001,
        ..EngineConfig::default()
    };
    let mut engine2 = Engine::new(cfg2, U256::ZERO, U256::ZERO, Vec::new());
    engine2.load_work(&work).unwrap();
    assert!(engine2.run().unwrap().is_none(), "resumed search aborts again");
}

#[test]
fn negative_distances_survive_persistence() {
    let secp = Secp256k1::new();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("neg.bin");

    let mut table = HashTable::new();
    let x = x_in_bucket(77, 12345);
    let d = DpDist::from_scalar(&scalar::neg(&U256::from_u64(0xABCDEF)), HerdKind::Wild);
    assert!(d.neg);
    table.add(&x, d);

    write_work_file(&p, &sample_header(&secp, 0x1234), &table, &[]).unwrap();
    let loaded = load_work(&secp, &p).unwrap();
    let entry = loaded.table.seek(&x).expect("entry must survive");
    assert_eq!(entry.dist, d);
    assert_eq!(entry.dist.to_scalar(), scalar::neg(&U256::from_u64(0xABCDEF)));
}
