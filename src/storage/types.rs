//! On-disk configuration document.
//!
//! Mirrors the JSON file one-to-one. [`ConfigFile::into_controller_config`]
//! turns it into a validated [`ControllerConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{
    BlendProfile, BlendingConfig, Celsius, ControllerConfig, DEFAULT_CPU_WEIGHT, DEFAULT_GPU_TIMEOUT_SECS,
    DEFAULT_GPU_WEIGHT, DEFAULT_INTERVAL_SECS, DEFAULT_MAX_PLAUSIBLE, DEFAULT_OVERPOWER_THRESHOLD, IpmiConfig,
    SensorConfig, TemperatureCurve,
};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub general: GeneralSection,
    pub host: HostSection,
    #[serde(default)]
    pub gpu_monitoring: GpuMonitoringSection,
    #[serde(default)]
    pub sensors: SensorsSection,
    #[serde(default)]
    pub temperature_control: Option<TemperatureControlSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSection {
    #[serde(default)]
    pub debug: bool,
    /// Seconds between cycles.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            debug: false,
            interval: default_interval(),
        }
    }
}

/// The host and its legacy single curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSection {
    pub name: String,
    pub temperatures: Vec<Celsius>,
    pub speeds: Vec<u8>,
    #[serde(default)]
    pub hysteresis: Celsius,
    #[serde(default)]
    pub ipmi: Option<IpmiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuMonitoringSection {
    #[serde(default = "default_true")]
    pub monitor_amd_gpus: bool,
    #[serde(default = "default_true")]
    pub monitor_nvidia_gpus: bool,
}

impl Default for GpuMonitoringSection {
    fn default() -> Self {
        Self {
            monitor_amd_gpus: true,
            monitor_nvidia_gpus: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsSection {
    #[serde(default = "default_cpu_chips")]
    pub cpu_chips: Vec<String>,
    #[serde(default = "default_amd_gpu_chips")]
    pub amd_gpu_chips: Vec<String>,
    #[serde(default = "default_max_plausible")]
    pub max_plausible_celsius: Celsius,
    #[serde(default = "default_gpu_timeout")]
    pub gpu_timeout_secs: u64,
}

impl Default for SensorsSection {
    fn default() -> Self {
        Self {
            cpu_chips: default_cpu_chips(),
            amd_gpu_chips: default_amd_gpu_chips(),
            max_plausible_celsius: default_max_plausible(),
            gpu_timeout_secs: default_gpu_timeout(),
        }
    }
}

/// Dual-curve blending setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureControlSection {
    #[serde(default)]
    pub profile: Option<BlendProfile>,
    #[serde(default = "default_overpower")]
    pub max_overpower_threshold: Celsius,
    #[serde(default = "default_cpu_weight")]
    pub cpu_weight: f64,
    #[serde(default = "default_gpu_weight")]
    pub gpu_weight: f64,
    #[serde(default)]
    pub cpu_curve: Option<CurveSection>,
    #[serde(default)]
    pub gpu_curve: Option<CurveSection>,
}

/// A curve under `temperature_control`. Missing hysteresis inherits the host's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveSection {
    pub temperatures: Vec<Celsius>,
    pub speeds: Vec<u8>,
    #[serde(default)]
    pub hysteresis: Option<Celsius>,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

fn default_cpu_chips() -> Vec<String> {
    SensorConfig::default().cpu_chips
}

fn default_amd_gpu_chips() -> Vec<String> {
    SensorConfig::default().amd_gpu_chips
}

fn default_max_plausible() -> Celsius {
    DEFAULT_MAX_PLAUSIBLE
}

fn default_gpu_timeout() -> u64 {
    DEFAULT_GPU_TIMEOUT_SECS
}

fn default_overpower() -> Celsius {
    DEFAULT_OVERPOWER_THRESHOLD
}

fn default_cpu_weight() -> f64 {
    DEFAULT_CPU_WEIGHT
}

fn default_gpu_weight() -> f64 {
    DEFAULT_GPU_WEIGHT
}

impl CurveSection {
    fn to_curve(&self, name: String, inherited_hysteresis: Celsius) -> Result<TemperatureCurve> {
        TemperatureCurve::new(
            name,
            self.temperatures.clone(),
            self.speeds.clone(),
            self.hysteresis.unwrap_or(inherited_hysteresis),
        )
    }
}

impl ConfigFile {
    /// Parse a JSON document.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Build and validate the runtime configuration.
    pub fn into_controller_config(self) -> Result<ControllerConfig> {
        let host = self.host;
        let host_curve = TemperatureCurve::new(
            host.name.clone(),
            host.temperatures,
            host.speeds,
            host.hysteresis,
        )?;

        let mut config = ControllerConfig::new(host.name.clone(), host_curve);

        if let Some(control) = self.temperature_control {
            if let Some(cpu) = &control.cpu_curve {
                config.primary = cpu.to_curve(format!("{} cpu", host.name), host.hysteresis)?;
            }
            if let Some(gpu) = &control.gpu_curve {
                config.secondary = Some(gpu.to_curve(format!("{} gpu", host.name), host.hysteresis)?);
            }
            config.blending = BlendingConfig {
                cpu_weight: control.cpu_weight,
                gpu_weight: control.gpu_weight,
                overpower_threshold: control.max_overpower_threshold,
            };
            config.profile = control.profile;
        }

        config.interval = Duration::from_secs(self.general.interval);
        config.debug = self.general.debug;
        config.ipmi = host.ipmi;
        config.sensors = SensorConfig {
            cpu_chips: self.sensors.cpu_chips,
            amd_gpu_chips: self.sensors.amd_gpu_chips,
            monitor_amd_gpus: self.gpu_monitoring.monitor_amd_gpus,
            monitor_nvidia_gpus: self.gpu_monitoring.monitor_nvidia_gpus,
            max_plausible: self.sensors.max_plausible_celsius,
            gpu_timeout: Duration::from_secs(self.sensors.gpu_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }
}
