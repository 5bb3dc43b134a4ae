//! IPMI raw command definitions for chassis fan control.
//!
//! Protocol follows the OEM fan-control extension exposed by Dell PowerEdge
//! iDRAC BMCs (netfn 0x30, command 0x30).

use std::fmt;

use crate::error::{FanControlError, Result};

// =============================================================================
// Constants
// =============================================================================

/// `ipmitool` subcommand for raw requests.
pub const IPMI_RAW: &str = "raw";

/// OEM network function.
pub const NETFN_OEM: u8 = 0x30;

/// OEM fan control command.
pub const CMD_FAN_CONTROL: u8 = 0x30;

/// Sub-command: select manual/automatic fan control.
pub const SUB_FAN_MODE: u8 = 0x01;

/// Sub-command: set explicit fan duty.
pub const SUB_FAN_SPEED: u8 = 0x02;

/// Mode byte: controller dictates speed.
pub const MODE_MANUAL: u8 = 0x00;

/// Mode byte: BMC firmware manages speed.
pub const MODE_AUTOMATIC: u8 = 0x01;

/// Fan selector addressing every fan at once.
pub const ALL_FANS: u8 = 0xff;

/// Lowest speed that is ever sent. Lower duties stall some fans.
pub const MIN_SAFE_SPEED: u8 = 5;

/// Highest speed percentage.
pub const MAX_SPEED: u8 = 100;

/// Replacement for credentials in logged command lines.
pub const MASKED: &str = "___";

// =============================================================================
// Fan Mode
// =============================================================================

/// Fan control ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    /// BMC firmware manages fan speed.
    Automatic,
    /// The controller dictates an explicit speed.
    Manual,
}

impl FanMode {
    /// Mode byte sent to the BMC.
    pub const fn mode_byte(&self) -> u8 {
        match self {
            FanMode::Automatic => MODE_AUTOMATIC,
            FanMode::Manual => MODE_MANUAL,
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanMode::Automatic => write!(f, "automatic"),
            FanMode::Manual => write!(f, "manual"),
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// A single outbound fan command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCommand {
    SetMode(FanMode),
    SetSpeed(u8),
}

impl FanCommand {
    /// Raw request bytes (netfn, command, data...).
    pub fn payload(&self) -> Result<Vec<u8>> {
        match self {
            FanCommand::SetMode(mode) => Ok(build_mode_cmd(*mode).to_vec()),
            FanCommand::SetSpeed(percent) => Ok(build_speed_cmd(*percent)?.to_vec()),
        }
    }
}

impl fmt::Display for FanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanCommand::SetMode(mode) => write!(f, "switch to {} mode", mode),
            FanCommand::SetSpeed(percent) => write!(f, "set speed {}%", percent),
        }
    }
}

/// Whether `percent` may be sent to the hardware.
pub fn is_safe_speed(percent: u8) -> bool {
    (MIN_SAFE_SPEED..=MAX_SPEED).contains(&percent)
}

/// Build the mode selection request.
pub fn build_mode_cmd(mode: FanMode) -> [u8; 4] {
    [NETFN_OEM, CMD_FAN_CONTROL, SUB_FAN_MODE, mode.mode_byte()]
}

/// Build the explicit speed request for all fans.
///
/// # Errors
/// Returns `InvalidSpeed` outside `MIN_SAFE_SPEED..=MAX_SPEED`.
pub fn build_speed_cmd(percent: u8) -> Result<[u8; 5]> {
    if !is_safe_speed(percent) {
        return Err(FanControlError::InvalidSpeed {
            value: percent,
            min: MIN_SAFE_SPEED,
            max: MAX_SPEED,
        });
    }

    Ok([NETFN_OEM, CMD_FAN_CONTROL, SUB_FAN_SPEED, ALL_FANS, percent])
}

/// Format request bytes as `ipmitool raw` arguments (`raw 0x30 0x30 ...`).
pub fn raw_args(payload: &[u8]) -> Vec<String> {
    std::iter::once(IPMI_RAW.to_string())
        .chain(payload.iter().map(|b| format!("{:#04x}", b)))
        .collect()
}

/// Join a command line for logging, hiding the values of `-U` and `-P`.
pub fn mask_credentials<S: AsRef<str>>(args: &[S]) -> String {
    let mut masked = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        let arg = arg.as_ref();
        if hide_next {
            masked.push(MASKED);
            hide_next = false;
        } else {
            masked.push(arg);
            hide_next = arg == "-U" || arg == "-P";
        }
    }

    masked.join(" ")
}
