//! NVIDIA GPU temperatures via `nvidia-smi`.

use std::time::Duration;

use tracing::warn;

use crate::config::Celsius;
use crate::error::Result;
use crate::utils::parsing::parse_temperature_lines;
use crate::utils::process::run_with_timeout;

/// Vendor diagnostic tool.
pub const NVIDIA_SMI: &str = "nvidia-smi";

/// Query arguments returning one bare temperature per GPU.
pub const NVIDIA_SMI_ARGS: [&str; 2] = [
    "--query-gpu=temperature.gpu",
    "--format=csv,noheader,nounits",
];

/// Read the core temperature of every NVIDIA GPU.
///
/// Non-numeric lines are skipped with a warning.
///
/// # Errors
/// Fails when `nvidia-smi` is missing, exits non-zero or exceeds `timeout`.
pub fn query_temperatures(timeout: Duration) -> Result<Vec<Celsius>> {
    let output = run_with_timeout(NVIDIA_SMI, &NVIDIA_SMI_ARGS, timeout)?;
    let parsed = parse_temperature_lines(&output.stdout);

    for line in &parsed.rejected {
        warn!("Non-numeric NVIDIA GPU temperature '{}' (ignored)", line);
    }

    Ok(parsed.values)
}
