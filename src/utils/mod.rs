pub mod nvidia;
pub mod parsing;
pub mod process;
pub mod sensors;

// Re-export commonly used items
pub use sensors::{HostSensors, SensorReader, SystemSensors};
