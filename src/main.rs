//! Chassis Fan Control CLI
//!
//! Runs the fan control daemon and a few one-shot diagnostics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use chassis_fan_control::config::ControllerConfig;
use chassis_fan_control::cooling::{ControlLoop, FanModeController, ShutdownSignal};
use chassis_fan_control::device::{HardwareCommandChannel, IpmiTool};
use chassis_fan_control::error::FanControlError;
use chassis_fan_control::logging;
use chassis_fan_control::protocol::{FanCommand, FanMode};
use chassis_fan_control::storage;
use chassis_fan_control::utils::{HostSensors, SensorReader};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Temperature-driven IPMI chassis fan control
#[derive(Parser, Debug)]
#[command(name = "chassis-fan-control")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbose output; fan commands are logged instead of sent
    #[arg(short, long)]
    debug: bool,

    /// Configuration file (skips the search path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between control cycles
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run the fan control daemon (default)
    Run,

    /// Validate the configuration and print the resolved curves
    CheckConfig,

    /// Show CPU and GPU temperatures as the daemon sees them
    Sensors,

    /// Hand fan control back to the BMC and exit
    Auto,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(&args);
    let debug = args.debug || loaded.as_ref().is_ok_and(|(_, config)| config.debug);
    logging::init(debug);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&loaded?.1),
        Command::CheckConfig => {
            let (path, config) = loaded?;
            cmd_check_config(&path, &config)
        }
        Command::Sensors => cmd_sensors(optional_config(loaded)),
        Command::Auto => cmd_auto(config_unless_missing(loaded, args.config.is_some())?, debug),
    }
}

/// Locate, load and validate the configuration, then apply CLI overrides.
fn load_config(args: &Args) -> Result<(PathBuf, ControllerConfig)> {
    let (path, mut config) =
        storage::locate_and_load(args.config.as_deref()).context("Failed to load configuration")?;

    if args.debug {
        config.debug = true;
    }
    if let Some(interval) = args.interval {
        config.interval = Duration::from_secs(interval);
    }

    Ok((path, config))
}

fn optional_config(loaded: Result<(PathBuf, ControllerConfig)>) -> Option<ControllerConfig> {
    match loaded {
        Ok((_, config)) => Some(config),
        Err(e) => {
            warn!("{:#}; using defaults", e);
            None
        }
    }
}

/// Configuration for commands that still work without a file.
///
/// Only a missing file found by searching falls back to defaults; an
/// unreadable or invalid file, or a missing `--config` path, is an error.
fn config_unless_missing(
    loaded: Result<(PathBuf, ControllerConfig)>,
    explicit: bool,
) -> Result<Option<ControllerConfig>> {
    match loaded {
        Ok((_, config)) => Ok(Some(config)),
        Err(e) if !explicit && is_not_found(&e) => {
            warn!("{:#}; using defaults", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<FanControlError>(),
        Some(FanControlError::ConfigNotFound { .. })
    )
}

// =============================================================================
// Command Implementations
// =============================================================================

fn cmd_run(config: &ControllerConfig) -> Result<()> {
    let signal = ShutdownSignal::new();
    let handler_signal = signal.clone();
    ctrlc::set_handler(move || handler_signal.trigger()).context("Failed to set signal handler")?;

    info!("Starting fan control");
    info!("[{}] Thresholds: {}", config.host_name, config.primary);
    if let Some(gpu) = &config.secondary {
        info!("[{}] GPU thresholds: {}", config.host_name, gpu);
    }
    info!(
        "[{}] Blend profile: {}, interval: {}s",
        config.host_name,
        config.profile(),
        config.interval.as_secs()
    );
    if config.debug {
        info!("Debug mode: fan commands are logged, not sent");
    }

    let sensors = HostSensors::new(config.sensors.clone());
    let channel = IpmiTool::new(config.ipmi.clone()).with_dry_run(config.debug);
    let controller = FanModeController::new(channel);

    let mut control = ControlLoop::new(config, sensors, controller, signal);
    let cycles = control.run();

    info!("Fan control stopped after {} cycles", cycles);
    Ok(())
}

fn cmd_check_config(path: &Path, config: &ControllerConfig) -> Result<()> {
    println!("✅ Configuration OK: {}", path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Host:      {}", config.host_name);
    println!("   CPU curve: {} (hysteresis {}°C)", config.primary, config.primary.hysteresis());
    match &config.secondary {
        Some(gpu) => println!("   GPU curve: {} (hysteresis {}°C)", gpu, gpu.hysteresis()),
        None => println!("   GPU curve: -"),
    }
    println!("   Profile:   {}", config.profile());
    println!(
        "   Weights:   cpu {} / gpu {}, overpower {}°C",
        config.blending.cpu_weight, config.blending.gpu_weight, config.blending.overpower_threshold
    );
    println!("   Interval:  {}s", config.interval.as_secs());
    println!("   GPUs:      amd={} nvidia={}", config.sensors.monitor_amd_gpus, config.sensors.monitor_nvidia_gpus);

    let ipmi = IpmiTool::new(config.ipmi.clone());
    println!("   Automatic: {}", ipmi.describe(FanCommand::SetMode(FanMode::Automatic))?);
    if config.debug {
        println!("   Debug:     on (dry-run)");
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    Ok(())
}

fn cmd_sensors(config: Option<ControllerConfig>) -> Result<()> {
    let sensor_config = config.map(|c| c.sensors).unwrap_or_default();
    let mut sensors = HostSensors::new(sensor_config);

    println!("🔍 Scanning for system sensors...");
    let cpu = sensors.read_cpu_temperatures();
    let gpu = sensors.read_gpu_temperatures();

    let all = sensors.system().list_all();
    if all.is_empty() {
        println!("❌ No sensors detected.");
    } else {
        println!("✅ Found {} sensors:\n", all.len());
        println!("{:<40} | {:<10} | {:<10}", "Label", "Temp", "Critical");
        println!("{}", "─".repeat(66));
        for sensor in &all {
            let critical = sensor
                .critical
                .map(|c| format!("{:.1}°C", c))
                .unwrap_or_else(|| "-".to_string());
            println!("   {:<40} | {:.1}°C    | {}", sensor.label, sensor.temperature, critical);
        }
        println!("{}", "─".repeat(66));
    }

    println!("CPU: {}", format_readings(&cpu));
    println!("GPU: {}", format_readings(&gpu));
    if cpu.is_empty() {
        println!("⚠️  Warning: no CPU temperatures matched the configured chips.");
    }

    Ok(())
}

fn cmd_auto(config: Option<ControllerConfig>, debug: bool) -> Result<()> {
    let mut ipmi = auto_channel(config, debug);
    if ipmi.is_dry_run() {
        info!("Debug mode: fan commands are logged, not sent");
    }

    ipmi.set_mode(FanMode::Automatic)
        .context("Failed to restore automatic fan control")?;
    println!("✅ Fan control handed back to the BMC");

    Ok(())
}

/// IPMI target for `auto`: the configured BMC, dry-run if either the CLI or
/// the file asks for debug.
fn auto_channel(config: Option<ControllerConfig>, debug: bool) -> IpmiTool {
    match config {
        Some(config) => {
            let dry_run = debug || config.debug;
            IpmiTool::new(config.ipmi).with_dry_run(dry_run)
        }
        None => IpmiTool::new(None).with_dry_run(debug),
    }
}

fn format_readings(readings: &[f64]) -> String {
    if readings.is_empty() {
        return "-".to_string();
    }
    readings
        .iter()
        .map(|t| format!("{:.1}°C", t))
        .collect::<Vec<_>>()
        .join(", ")
}
