//! Chassis Fan Control Library
//!
//! Temperature-driven fan control for server chassis whose BMC accepts
//! raw IPMI fan commands.
//!
//! # Features
//!
//! - Blend CPU and GPU temperatures into one effective temperature
//! - Map it onto a threshold curve with hysteresis
//! - Switch the chassis between automatic and manual fan control
//! - Always hand control back to the BMC on shutdown
//!
//! # Example
//!
//! ```no_run
//! use chassis_fan_control::config::{ControllerConfig, TemperatureCurve};
//! use chassis_fan_control::cooling::{ControlLoop, FanModeController, ShutdownSignal};
//! use chassis_fan_control::device::IpmiTool;
//! use chassis_fan_control::utils::HostSensors;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let curve = TemperatureCurve::new("r720", vec![55.0, 60.0, 70.0, 75.0], vec![13, 17, 25, 37], 2.0)?;
//!     let config = ControllerConfig::new("r720", curve);
//!
//!     let sensors = HostSensors::new(config.sensors.clone());
//!     let controller = FanModeController::new(IpmiTool::local());
//!     let mut control = ControlLoop::new(&config, sensors, controller, ShutdownSignal::new());
//!
//!     let report = control.run_cycle()?;
//!     println!("Effective temperature: {}°C", report.decision.effective_temperature);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cooling;
pub mod device;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod storage;
pub mod utils;

// Re-exports for convenience
pub use config::{ControllerConfig, TemperatureCurve};
pub use error::{FanControlError, Result};
