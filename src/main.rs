//! rangeroo binary entry point: flag dispatch and exit-code mapping.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::error;

use rangeroo::cli::{parse_grid, Cli};
use rangeroo::config::SearchConfig;
use rangeroo::error::SolverError;
use rangeroo::kangaroo::{Engine, EngineConfig};
use rangeroo::math::{Secp256k1, U256};
use rangeroo::utils::logging::setup_logging;
use rangeroo::work::partition;
use rangeroo::{check, gpu};

fn main() {
    setup_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {}
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(-1);
        }
    }
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let grid = match &cli.grid {
        Some(s) => parse_grid(s)?,
        None => (64, 32),
    };
    Ok(EngineConfig {
        nb_thread: cli.nb_thread.unwrap_or_else(num_cpus::get),
        dp_bits: cli.dp_bits,
        use_gpu: cli.gpu,
        backend_kind: cli.gpu_backend.parse::<gpu::BackendKind>()?,
        gpu_grid: grid,
        work_file: cli.work_file.clone(),
        work_text_file: cli.work_text_file.clone(),
        save_period: Duration::from_secs(cli.work_interval.max(1)),
        save_kangaroo: cli.save_kangaroo,
        split_workfile: cli.split_workfile,
        max_step: cli.max_step,
        output_file: cli.output_file.clone(),
        ..EngineConfig::default()
    })
}

fn run(cli: Cli) -> Result<()> {
    let secp = Secp256k1::new();

    // Offline work-file operations run and exit.
    if let Some(dir) = &cli.part_create {
        return partition::create_partition(dir);
    }
    if let Some(path) = &cli.work_info {
        return partition::work_info(&secp, path);
    }
    if let Some(path) = &cli.check_work {
        let bad = if path.is_dir() {
            partition::check_partition(&secp, path)?
        } else {
            partition::check_work_file(&secp, path)?
        };
        if bad > 0 {
            return Err(SolverError::FormatMismatch {
                path: path.clone(),
                detail: format!("{} corrupt entries", bad),
            }
            .into());
        }
        return Ok(());
    }
    if let Some(files) = &cli.merge {
        partition::merge_work(&secp, &files[0], &files[1], &files[2])?;
        return Ok(());
    }
    if let Some(args) = &cli.merge_dir {
        partition::merge_dir(&secp, &args[0], &args[1])?;
        return Ok(());
    }

    let cfg = engine_config(&cli)?;

    if cli.check {
        let mut check_cfg = cfg.clone();
        check_cfg.use_gpu = true;
        return check::run_check(&check_cfg);
    }

    if cli.server || cli.client.is_some() {
        return Err(SolverError::ConfigInvalid(
            "the client/server distribution layer is not available in this build".into(),
        )
        .into());
    }

    if cli.save_kangaroo_server {
        return Err(SolverError::ConfigInvalid(
            "-wss requires client mode, which is not available in this build".into(),
        )
        .into());
    }

    let mut engine = if let Some(input) = &cli.input_file {
        let mut engine = Engine::new(cfg, U256::ZERO, U256::ZERO, Vec::new());
        engine.load_work(Path::new(input))?;
        engine
    } else if cli.has_cli_range() {
        let search = SearchConfig::from_cli_range(
            &secp,
            cli.start_dec.as_deref(),
            cli.end_dec.as_deref(),
            cli.start_hex.as_deref(),
            cli.end_hex.as_deref(),
            cli.pubkey.as_deref(),
        )?;
        Engine::new(cfg, search.range_start, search.range_end, search.keys)
    } else if let Some(config_file) = &cli.config_file {
        let search = SearchConfig::from_file(&secp, config_file)?;
        Engine::new(cfg, search.range_start, search.range_end, search.keys)
    } else {
        return Err(SolverError::ConfigInvalid(
            "no configuration: give a config file, -i, or an ephemeral range".into(),
        )
        .into());
    };

    // A solved key prints itself; an aborted search printed "Aborted".
    engine.run()?;
    Ok(())
}
