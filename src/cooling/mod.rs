//! Cooling decision engine.
//!
//! Effective temperature estimation, hysteresis-gated threshold selection,
//! the manual/automatic mode state machine, and the loop that drives them.

pub mod control_loop;
pub mod controller;
pub mod estimator;
pub mod selector;
pub mod shutdown;

pub use control_loop::{ControlLoop, CycleReport, Decision, decide};
pub use controller::{ControllerState, FanModeController, Outcome};
pub use estimator::{BlendDecision, Diagnostics, EffectiveTemperatureEstimator, Estimate};
pub use selector::{HysteresisGate, Selection, ThresholdSelector};
pub use shutdown::ShutdownSignal;
