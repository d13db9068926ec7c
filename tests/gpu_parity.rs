//! Accelerator contract tests: parity with CPU stepping and the adapter's
//! end-to-end ingestion path.

use std::time::Duration;

use rangeroo::check::run_check;
use rangeroo::gpu::BackendKind;
use rangeroo::kangaroo::{Engine, EngineConfig};
use rangeroo::math::{Secp256k1, U256};

#[test]
fn reference_backend_matches_cpu_stepping() {
    // Runs the single-iteration and NB_RUN-iteration parity scenarios.
    let cfg = EngineConfig {
        use_gpu: true,
        backend_kind: BackendKind::Reference,
        gpu_grid: (1, 1),
        ..EngineConfig::default()
    };
    run_check(&cfg).unwrap();
}

#[test]
fn parity_holds_under_symmetry() {
    let cfg = EngineConfig {
        use_gpu: true,
        backend_kind: BackendKind::Reference,
        gpu_grid: (1, 1),
        use_symmetry: true,
        ..EngineConfig::default()
    };
    run_check(&cfg).unwrap();
}

#[test]
fn unavailable_backends_are_fatal() {
    let cfg = EngineConfig {
        use_gpu: true,
        backend_kind: BackendKind::Cuda,
        gpu_grid: (1, 1),
        nb_thread: 1,
        grp_size: 16,
        ..EngineConfig::default()
    };
    let secp = Secp256k1::new();
    let q = secp.compute_public_key(&U256::from_u64(2));
    let mut engine = Engine::new(cfg, U256::ONE, U256::from_u64(0xFF), vec![q]);
    assert!(engine.run().is_err());
}

#[test]
fn gpu_only_search_solves_small_range() {
    let secp = Secp256k1::new();
    let k = U256::from_u64(0x3AB);
    let q = secp.compute_public_key(&k);
    let cfg = EngineConfig {
        nb_thread: 0,
        use_gpu: true,
        backend_kind: BackendKind::Reference,
        gpu_grid: (1, 1),
        dp_bits: Some(0),
        save_period: Duration::from_secs(3600),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(cfg, U256::from_u64(0x200), U256::from_u64(0x3FF), vec![q]);
    let sol = engine.run().unwrap().expect("accelerator-only search must solve");
    assert_eq!(sol.private_key, k);
}
