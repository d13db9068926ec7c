//! Logging initialisation.

use std::io::Write;

use log::LevelFilter;

/// Initialise env_logger. Defaults to info; RUST_LOG overrides. The progress
/// line is printed with carriage returns outside the logger, so log lines
/// start on a fresh line.
pub fn setup_logging() {
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .try_init()
        .ok();
}
