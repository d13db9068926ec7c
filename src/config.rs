//! Search configuration: the line-oriented config file and the ephemeral
//! CLI-provided ranges.

use std::path::Path;

use anyhow::Result;
use log::info;

use crate::error::SolverError;
use crate::math::{curve::Point, Secp256k1, U256};

/// What to search: the interval and the target keys.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub range_start: U256,
    pub range_end: U256,
    pub keys: Vec<Point>,
}

impl SearchConfig {
    /// Parse a config file: range start hex on line 1, range end hex on
    /// line 2, one public key per following line (compressed 66 or
    /// uncompressed 130 hex chars).
    pub fn from_file(secp: &Secp256k1, path: &Path) -> Result<SearchConfig> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SolverError::io(path, e))?;
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if lines.len() < 3 {
            return Err(SolverError::ConfigInvalid(format!(
                "{}: not enough arguments (need range start, range end, at least one key)",
                path.display()
            ))
            .into());
        }

        let range_start = U256::from_hex(lines[0]).map_err(|e| {
            SolverError::ConfigInvalid(format!("{}: bad range start: {}", path.display(), e))
        })?;
        let range_end = U256::from_hex(lines[1]).map_err(|e| {
            SolverError::ConfigInvalid(format!("{}: bad range end: {}", path.display(), e))
        })?;

        let mut keys = Vec::new();
        for (i, line) in lines.iter().enumerate().skip(2) {
            let (p, _) = secp.parse_public_key(line).map_err(|e| {
                SolverError::ConfigInvalid(format!(
                    "{}, error line {}: {}",
                    path.display(),
                    i + 1,
                    e
                ))
            })?;
            keys.push(p);
        }

        let cfg = SearchConfig { range_start, range_end, keys };
        cfg.validate()?;
        info!("Start:{}", cfg.range_start.to_hex());
        info!("Stop :{}", cfg.range_end.to_hex());
        info!("Keys :{}", cfg.keys.len());
        Ok(cfg)
    }

    /// Build a config from the ephemeral CLI range options. Exactly one of
    /// the decimal or hex pairs must be given, plus the public key.
    pub fn from_cli_range(
        secp: &Secp256k1,
        start_dec: Option<&str>,
        end_dec: Option<&str>,
        start_hex: Option<&str>,
        end_hex: Option<&str>,
        pubkey: Option<&str>,
    ) -> Result<SearchConfig> {
        let (range_start, range_end) = match (start_dec, end_dec, start_hex, end_hex) {
            (Some(s), Some(e), None, None) => (U256::from_dec(s)?, U256::from_dec(e)?),
            (None, None, Some(s), Some(e)) => (U256::from_hex(s)?, U256::from_hex(e)?),
            _ => {
                return Err(SolverError::ConfigInvalid(
                    "provide either --start-dec/--end-dec or --start-hex/--end-hex (not mixed)"
                        .into(),
                )
                .into())
            }
        };
        let pubkey = pubkey.ok_or_else(|| {
            SolverError::ConfigInvalid("--pubkey is required with an ephemeral range".into())
        })?;
        let (key, _) = secp.parse_public_key(pubkey)?;

        let cfg = SearchConfig { range_start, range_end, keys: vec![key] };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.range_start > self.range_end {
            return Err(SolverError::ConfigInvalid(format!(
                "range start {} above range end {}",
                self.range_start, self.range_end
            ))
            .into());
        }
        if self.keys.is_empty() {
            return Err(SolverError::ConfigInvalid("no public key to search".into()).into());
        }
        Ok(())
    }
}
