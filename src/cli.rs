//! Command-line surface.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::error::SolverError;

/// Interval ECDLP solver for secp256k1 (Pollard's kangaroo method).
#[derive(Parser, Debug, Clone)]
#[command(name = "rangeroo", version, about, long_about = None)]
pub struct Cli {
    /// Worker thread count (default: all cores)
    #[arg(short = 't', long = "threads")]
    pub nb_thread: Option<usize>,

    /// Distinguished-point bits (0..64, default: auto)
    #[arg(short = 'd', long = "dp")]
    pub dp_bits: Option<u32>,

    /// Enable the accelerator backend
    #[arg(long)]
    pub gpu: bool,

    /// Accelerator backend kind: reference|cuda|metal
    #[arg(long = "gpu-backend", default_value = "reference")]
    pub gpu_backend: String,

    /// Accelerator grid size as gx,gy
    #[arg(short = 'g', long = "grid")]
    pub grid: Option<String>,

    /// File to save work into
    #[arg(short = 'w', long = "work")]
    pub work_file: Option<PathBuf>,

    /// File to save a textual work export into
    #[arg(long = "wtext")]
    pub work_text_file: Option<PathBuf>,

    /// Work file to resume from
    #[arg(short = 'i', long = "input")]
    pub input_file: Option<PathBuf>,

    /// Periodic save interval in seconds
    #[arg(long = "wi", value_name = "SECONDS", default_value_t = 60)]
    pub work_interval: u64,

    /// Save kangaroos in the work file
    #[arg(long = "ws")]
    pub save_kangaroo: bool,

    /// Save kangaroos via the server (client mode only)
    #[arg(long = "wss")]
    pub save_kangaroo_server: bool,

    /// Timestamp-split the work file and reset the table at each save
    #[arg(long = "wsplit")]
    pub split_workfile: bool,

    /// Save timeout in milliseconds
    #[arg(long = "wt", value_name = "MS", default_value_t = 3000)]
    pub work_timeout_ms: u64,

    /// Merge two work files: FILE1 FILE2 DEST
    #[arg(long = "wm", num_args = 3, value_names = ["FILE1", "FILE2", "DEST"])]
    pub merge: Option<Vec<PathBuf>>,

    /// Merge a directory of work files: DIR DEST
    #[arg(long = "wmdir", num_args = 2, value_names = ["DIR", "DEST"])]
    pub merge_dir: Option<Vec<PathBuf>>,

    /// Check work file integrity
    #[arg(long = "wcheck", value_name = "FILE")]
    pub check_work: Option<PathBuf>,

    /// Print work file info
    #[arg(long = "winfo", value_name = "FILE")]
    pub work_info: Option<PathBuf>,

    /// Create an empty partitioned work directory
    #[arg(long = "wpartcreate", value_name = "DIR")]
    pub part_create: Option<PathBuf>,

    /// Start in server mode
    #[arg(short = 's', long = "server")]
    pub server: bool,

    /// Start in client mode, connect to this host
    #[arg(short = 'c', long = "client", value_name = "HOST")]
    pub client: Option<String>,

    /// Server port
    #[arg(long = "sp", value_name = "PORT", default_value_t = 17403)]
    pub port: u16,

    /// Network timeout in milliseconds
    #[arg(long = "nt", value_name = "MS", default_value_t = 3000)]
    pub net_timeout_ms: u64,

    /// Give up after this multiple of the expected operation count
    #[arg(short = 'm', long = "max-step", default_value_t = 0.0)]
    pub max_step: f64,

    /// Append results to this file
    #[arg(short = 'o', long = "output")]
    pub output_file: Option<PathBuf>,

    /// Check accelerator kernel against CPU stepping
    #[arg(long)]
    pub check: bool,

    /// Range start, decimal (with --end-dec and --pubkey)
    #[arg(long = "start-dec", requires = "end_dec", conflicts_with_all = ["start_hex", "end_hex"])]
    pub start_dec: Option<String>,

    /// Range end, decimal
    #[arg(long = "end-dec")]
    pub end_dec: Option<String>,

    /// Range start, hexadecimal (with --end-hex and --pubkey)
    #[arg(long = "start-hex", requires = "end_hex")]
    pub start_hex: Option<String>,

    /// Range end, hexadecimal
    #[arg(long = "end-hex")]
    pub end_hex: Option<String>,

    /// Public key for an ephemeral range (66 or 130 hex chars)
    #[arg(long = "pubkey")]
    pub pubkey: Option<String>,

    /// Input configuration file
    pub config_file: Option<PathBuf>,
}

impl Cli {
    /// True when an ephemeral range was given instead of a config file.
    pub fn has_cli_range(&self) -> bool {
        self.start_dec.is_some() || self.start_hex.is_some() || self.pubkey.is_some()
    }
}

/// Parse "gx,gy" into a grid pair.
pub fn parse_grid(s: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err(
            SolverError::ConfigInvalid(format!("grid must be gx,gy: {:?}", s)).into(),
        );
    }
    let gx = parts[0]
        .trim()
        .parse::<u32>()
        .map_err(|_| SolverError::ConfigInvalid(format!("bad grid x: {:?}", parts[0])))?;
    let gy = parts[1]
        .trim()
        .parse::<u32>()
        .map_err(|_| SolverError::ConfigInvalid(format!("bad grid y: {:?}", parts[1])))?;
    if gx == 0 || gy == 0 {
        return Err(SolverError::ConfigInvalid("grid sizes must be positive".into()).into());
    }
    Ok((gx, gy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_parsing() {
        assert_eq!(parse_grid("64,32").unwrap(), (64, 32));
        assert_eq!(parse_grid(" 2 , 4 ").unwrap(), (2, 4));
        assert!(parse_grid("64").is_err());
        assert!(parse_grid("0,4").is_err());
        assert!(parse_grid("a,b").is_err());
    }

    #[test]
    fn args_parse_search_flags() {
        let cli = Cli::parse_from([
            "rangeroo", "-t", "4", "-d", "12", "-w", "work.bin", "--wi", "30", "--ws",
            "config.txt",
        ]);
        assert_eq!(cli.nb_thread, Some(4));
        assert_eq!(cli.dp_bits, Some(12));
        assert_eq!(cli.work_interval, 30);
        assert!(cli.save_kangaroo);
        assert_eq!(cli.config_file.as_deref().unwrap().to_str().unwrap(), "config.txt");
    }

    #[test]
    fn args_parse_offline_ops() {
        let cli = Cli::parse_from(["rangeroo", "--wm", "a", "b", "c"]);
        let m = cli.merge.unwrap();
        assert_eq!(m.len(), 3);

        let cli = Cli::parse_from(["rangeroo", "--winfo", "work.bin"]);
        assert!(cli.work_info.is_some());
    }

    #[test]
    fn ephemeral_range_flags() {
        let cli = Cli::parse_from([
            "rangeroo",
            "--start-hex",
            "01",
            "--end-hex",
            "FF",
            "--pubkey",
            "02abc",
        ]);
        assert!(cli.has_cli_range());
        // Mixing dec and hex is a parse error.
        assert!(Cli::try_parse_from([
            "rangeroo",
            "--start-dec",
            "1",
            "--end-hex",
            "FF",
        ])
        .is_err());
    }
}
