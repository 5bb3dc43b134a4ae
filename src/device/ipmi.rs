//! `ipmitool`-backed fan command channel.
//!
//! Talks to the local BMC in-band, or to a remote BMC over LAN when an
//! [`IpmiConfig`] is supplied.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::IpmiConfig;
use crate::device::HardwareCommandChannel;
use crate::error::Result;
use crate::protocol::{FanCommand, mask_credentials, raw_args};
use crate::utils::process::run_with_timeout;

// =============================================================================
// Constants
// =============================================================================

/// IPMI client binary.
pub const IPMITOOL: &str = "ipmitool";

/// Upper bound for a single BMC round trip.
pub const COMMAND_TIMEOUT_SECS: u64 = 15;

// =============================================================================
// IpmiTool
// =============================================================================

/// Fan command channel that shells out to `ipmitool`.
///
/// # Example
///
/// ```no_run
/// use chassis_fan_control::device::{HardwareCommandChannel, IpmiTool};
/// use chassis_fan_control::protocol::FanMode;
///
/// let mut ipmi = IpmiTool::local();
/// ipmi.set_mode(FanMode::Manual)?;
/// ipmi.set_speed(25)?;
/// # Ok::<(), chassis_fan_control::error::FanControlError>(())
/// ```
#[derive(Debug, Clone)]
pub struct IpmiTool {
    target: Option<IpmiConfig>,
    timeout: Duration,
    dry_run: bool,
}

impl IpmiTool {
    /// Channel for `target`, or the local BMC when `None`.
    pub fn new(target: Option<IpmiConfig>) -> Self {
        Self {
            target,
            timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
            dry_run: false,
        }
    }

    /// Channel for the local BMC.
    pub fn local() -> Self {
        Self::new(None)
    }

    /// In dry-run mode commands are logged, never executed, and always succeed.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Arguments passed to `ipmitool` for `command`.
    pub fn command_args(&self, command: FanCommand) -> Result<Vec<String>> {
        let mut args = Vec::new();

        if let Some(target) = &self.target {
            args.extend([
                "-I".to_string(),
                target.interface.clone(),
                "-H".to_string(),
                target.host.clone(),
                "-U".to_string(),
                target.username.clone(),
                "-P".to_string(),
                target.password.clone(),
            ]);
        }

        args.extend(raw_args(&command.payload()?));
        Ok(args)
    }

    /// Full command line with credentials masked, for logs.
    pub fn describe(&self, command: FanCommand) -> Result<String> {
        let mut line = vec![IPMITOOL.to_string()];
        line.extend(self.command_args(command)?);
        Ok(mask_credentials(&line))
    }
}

impl HardwareCommandChannel for IpmiTool {
    fn send(&mut self, command: FanCommand) -> Result<()> {
        let args = self.command_args(command)?;

        if self.dry_run {
            info!("[dry-run] {}", self.describe(command)?);
            return Ok(());
        }

        debug!("Sending: {}", self.describe(command)?);
        run_with_timeout(IPMITOOL, &args, self.timeout)?;
        Ok(())
    }
}
