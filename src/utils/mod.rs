//! Small shared utilities: logging setup and console formatting.

pub mod format;
pub mod logging;
