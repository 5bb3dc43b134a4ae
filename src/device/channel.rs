//! Outbound command seam between the controller and the fan hardware.

use crate::error::Result;
use crate::protocol::{FanCommand, FanMode};

/// Channel that delivers fan commands to the chassis.
///
/// Implementations block until the hardware acknowledges or the command
/// fails. Only one command is ever in flight.
pub trait HardwareCommandChannel {
    /// Deliver a single command.
    fn send(&mut self, command: FanCommand) -> Result<()>;

    /// Switch between manual and automatic fan control.
    fn set_mode(&mut self, mode: FanMode) -> Result<()> {
        self.send(FanCommand::SetMode(mode))
    }

    /// Set an explicit speed for all fans.
    fn set_speed(&mut self, percent: u8) -> Result<()> {
        self.send(FanCommand::SetSpeed(percent))
    }
}

impl<C: HardwareCommandChannel + ?Sized> HardwareCommandChannel for Box<C> {
    fn send(&mut self, command: FanCommand) -> Result<()> {
        (**self).send(command)
    }
}
