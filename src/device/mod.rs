//! Device abstraction layer for chassis fan controllers.
//!
//! Provides the command channel seam and its `ipmitool` implementation.

pub mod channel;
pub mod ipmi;

pub use channel::HardwareCommandChannel;
pub use ipmi::IpmiTool;
