//! Manual/automatic fan mode state machine.
//!
//! [`FanModeController`] is the only writer of [`ControllerState`]. It turns
//! a [`Selection`] into the minimal set of hardware commands and only
//! records a transition once the hardware accepted it.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TemperatureCurve;
use crate::cooling::selector::Selection;
use crate::device::HardwareCommandChannel;
use crate::error::Result;
use crate::protocol::{FanMode, is_safe_speed};

/// Pause between entering manual mode and the first speed command.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// What the controller believes the hardware is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub mode: FanMode,
    /// Last speed sent while manual, 0 while automatic.
    pub current_speed_percent: u8,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            mode: FanMode::Automatic,
            current_speed_percent: 0,
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            FanMode::Automatic => write!(f, "automatic"),
            FanMode::Manual => write!(f, "manual at {}%", self.current_speed_percent),
        }
    }
}

/// Result of [`FanModeController::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already in the requested state; nothing sent.
    Unchanged,
    /// Hysteresis asked to keep the present state.
    Held,
    /// Tier speed outside the safe range; nothing sent.
    SkippedUnsafeSpeed(u8),
    /// Control handed back to the hardware.
    SwitchedToAutomatic,
    /// Explicit speed applied, entering manual mode first if needed.
    SpeedSet { percent: u8, entered_manual: bool },
}

/// Drives a [`HardwareCommandChannel`] and tracks the resulting state.
pub struct FanModeController<C: HardwareCommandChannel> {
    channel: C,
    state: ControllerState,
    settle_delay: Duration,
}

impl<C: HardwareCommandChannel> FanModeController<C> {
    /// Controller starting in automatic mode at 0%.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: ControllerState::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Act on `selection` against `curve`.
    ///
    /// Returns an error when a command failed; the state then still
    /// reflects the last acknowledged transition.
    pub fn apply(&mut self, selection: Selection, curve: &TemperatureCurve) -> Result<Outcome> {
        match selection {
            Selection::Hold => Ok(Outcome::Held),
            Selection::Automatic => self.enter_automatic(),
            Selection::Tier(tier) => self.set_speed(curve.speed(tier)),
        }
    }

    fn enter_automatic(&mut self) -> Result<Outcome> {
        if self.state.mode == FanMode::Automatic {
            return Ok(Outcome::Unchanged);
        }

        info!("Switching fans back to automatic mode");
        self.channel.set_mode(FanMode::Automatic)?;
        self.state = ControllerState::default();
        Ok(Outcome::SwitchedToAutomatic)
    }

    fn set_speed(&mut self, percent: u8) -> Result<Outcome> {
        if percent == self.state.current_speed_percent {
            return Ok(Outcome::Unchanged);
        }
        if !is_safe_speed(percent) {
            warn!("Refusing to set unsafe fan speed {}%", percent);
            return Ok(Outcome::SkippedUnsafeSpeed(percent));
        }

        let entered_manual = self.state.mode == FanMode::Automatic;
        if entered_manual {
            info!("Switching fans to manual mode");
            self.channel.set_mode(FanMode::Manual)?;
            self.state.mode = FanMode::Manual;
            if !self.settle_delay.is_zero() {
                thread::sleep(self.settle_delay);
            }
        }

        info!("Setting fans speed to {}%", percent);
        self.channel.set_speed(percent)?;
        self.state.current_speed_percent = percent;
        Ok(Outcome::SpeedSet {
            percent,
            entered_manual,
        })
    }

    /// Best-effort hand-back to automatic mode, sent whatever the current
    /// state. Failures are logged and reported as `false`.
    pub fn force_automatic(&mut self) -> bool {
        debug!("Forcing automatic fan mode from {}", self.state);
        match self.channel.set_mode(FanMode::Automatic) {
            Ok(()) => {
                self.state = ControllerState::default();
                true
            }
            Err(e) => {
                warn!("Failed to restore automatic fan mode: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FanControlError;
    use crate::protocol::FanCommand;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<FanCommand>,
        fail_mode: bool,
        fail_speed: bool,
    }

    impl HardwareCommandChannel for Recorder {
        fn send(&mut self, command: FanCommand) -> Result<()> {
            self.sent.push(command);
            let fail = match command {
                FanCommand::SetMode(_) => self.fail_mode,
                FanCommand::SetSpeed(_) => self.fail_speed,
            };
            if fail {
                Err(FanControlError::CommandFailed {
                    command: command.to_string(),
                    reason: "exit=1".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn curve() -> TemperatureCurve {
        TemperatureCurve::new("test", vec![40.0, 55.0, 60.0, 75.0], vec![3, 13, 17, 37], 0.0).unwrap()
    }

    fn controller(channel: Recorder) -> FanModeController<Recorder> {
        FanModeController::new(channel).with_settle_delay(Duration::ZERO)
    }

    #[test]
    fn test_enter_manual_then_speed() {
        let mut ctl = controller(Recorder::default());
        let outcome = ctl.apply(Selection::Tier(1), &curve()).unwrap();

        assert_eq!(
            outcome,
            Outcome::SpeedSet {
                percent: 13,
                entered_manual: true
            }
        );
        assert_eq!(
            ctl.channel().sent,
            [FanCommand::SetMode(FanMode::Manual), FanCommand::SetSpeed(13)]
        );
        assert_eq!(
            ctl.state(),
            ControllerState {
                mode: FanMode::Manual,
                current_speed_percent: 13
            }
        );
    }

    #[test]
    fn test_repeat_selection_sends_nothing() {
        let mut ctl = controller(Recorder::default());
        ctl.apply(Selection::Tier(2), &curve()).unwrap();
        let before = ctl.channel().sent.len();

        assert_eq!(ctl.apply(Selection::Tier(2), &curve()).unwrap(), Outcome::Unchanged);
        assert_eq!(ctl.channel().sent.len(), before);
    }

    #[test]
    fn test_manual_speed_change_sends_only_speed() {
        let mut ctl = controller(Recorder::default());
        ctl.apply(Selection::Tier(1), &curve()).unwrap();
        ctl.apply(Selection::Tier(3), &curve()).unwrap();

        assert_eq!(ctl.channel().sent.last(), Some(&FanCommand::SetSpeed(37)));
        assert_eq!(ctl.channel().sent.len(), 3);
        assert_eq!(ctl.state().current_speed_percent, 37);
    }

    #[test]
    fn test_unsafe_speed_is_skipped() {
        let mut ctl = controller(Recorder::default());
        let outcome = ctl.apply(Selection::Tier(0), &curve()).unwrap();

        assert_eq!(outcome, Outcome::SkippedUnsafeSpeed(3));
        assert!(ctl.channel().sent.is_empty());
        assert_eq!(ctl.state(), ControllerState::default());
    }

    #[test]
    fn test_failed_manual_switch_aborts() {
        let mut ctl = controller(Recorder {
            fail_mode: true,
            ..Recorder::default()
        });

        assert!(ctl.apply(Selection::Tier(1), &curve()).is_err());
        assert_eq!(ctl.channel().sent, [FanCommand::SetMode(FanMode::Manual)]);
        assert_eq!(ctl.state(), ControllerState::default());
    }

    #[test]
    fn test_failed_speed_keeps_previous_speed() {
        let mut ctl = controller(Recorder {
            fail_speed: true,
            ..Recorder::default()
        });

        assert!(ctl.apply(Selection::Tier(1), &curve()).is_err());
        // The mode switch was acknowledged, the speed was not.
        assert_eq!(ctl.state().mode, FanMode::Manual);
        assert_eq!(ctl.state().current_speed_percent, 0);

        // Retried on the next cycle without another mode switch.
        assert!(ctl.apply(Selection::Tier(1), &curve()).is_err());
        assert_eq!(ctl.channel().sent.last(), Some(&FanCommand::SetSpeed(13)));
        assert_eq!(ctl.channel().sent.len(), 3);
    }

    #[test]
    fn test_automatic_transition() {
        let mut ctl = controller(Recorder::default());
        assert_eq!(ctl.apply(Selection::Automatic, &curve()).unwrap(), Outcome::Unchanged);
        assert!(ctl.channel().sent.is_empty());

        ctl.apply(Selection::Tier(2), &curve()).unwrap();
        assert_eq!(
            ctl.apply(Selection::Automatic, &curve()).unwrap(),
            Outcome::SwitchedToAutomatic
        );
        assert_eq!(ctl.state(), ControllerState::default());
    }

    #[test]
    fn test_failed_automatic_transition_keeps_state() {
        let mut ctl = controller(Recorder {
            fail_mode: true,
            ..Recorder::default()
        });
        ctl.state = ControllerState {
            mode: FanMode::Manual,
            current_speed_percent: 17,
        };

        assert!(ctl.apply(Selection::Automatic, &curve()).is_err());
        assert_eq!(ctl.state().mode, FanMode::Manual);
        assert_eq!(ctl.state().current_speed_percent, 17);
    }

    #[test]
    fn test_hold_sends_nothing() {
        let mut ctl = controller(Recorder::default());
        assert_eq!(ctl.apply(Selection::Hold, &curve()).unwrap(), Outcome::Held);
        assert!(ctl.channel().sent.is_empty());
    }

    #[test]
    fn test_force_automatic_is_unconditional() {
        let mut ctl = controller(Recorder::default());
        assert!(ctl.force_automatic());
        assert_eq!(ctl.channel().sent, [FanCommand::SetMode(FanMode::Automatic)]);
    }

    #[test]
    fn test_force_automatic_swallows_failure() {
        let mut ctl = controller(Recorder {
            fail_mode: true,
            ..Recorder::default()
        });
        ctl.state = ControllerState {
            mode: FanMode::Manual,
            current_speed_percent: 37,
        };

        assert!(!ctl.force_automatic());
        assert_eq!(ctl.channel().sent.len(), 1);
        assert_eq!(ctl.state().mode, FanMode::Manual);
    }
}
