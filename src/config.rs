//! Validated controller configuration.
//!
//! These types are built once at startup (see [`crate::storage`]) and are
//! only borrowed afterwards. Construction validates every invariant, so the
//! control logic never has to re-check curve shape or parameter ranges.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FanControlError, Result};

/// Temperature in degrees Celsius.
pub type Celsius = f64;

// =============================================================================
// Defaults
// =============================================================================

/// Default sampling interval.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default margin beyond which the hotter component dominates exclusively.
pub const DEFAULT_OVERPOWER_THRESHOLD: Celsius = 15.0;

/// Default CPU share of the balanced blend.
pub const DEFAULT_CPU_WEIGHT: f64 = 0.5;

/// Default GPU share of the balanced blend.
pub const DEFAULT_GPU_WEIGHT: f64 = 0.5;

/// Upper bound of a plausible sensor reading.
pub const DEFAULT_MAX_PLAUSIBLE: Celsius = 125.0;

/// Timeout applied to GPU vendor tools.
pub const DEFAULT_GPU_TIMEOUT_SECS: u64 = 3;

/// Minimum number of points in a curve.
pub const MIN_CURVE_POINTS: usize = 2;

// =============================================================================
// Temperature Curve
// =============================================================================

/// Ordered threshold curve mapping temperatures to fan speed tiers.
///
/// Thresholds are inclusive upper bounds: a temperature equal to a threshold
/// selects that tier. A single hysteresis margin applies to the whole curve.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureCurve {
    name: String,
    thresholds: Vec<Celsius>,
    speeds: Vec<u8>,
    hysteresis: Celsius,
}

impl TemperatureCurve {
    /// Build a curve, validating its invariants.
    ///
    /// # Errors
    /// Returns `InvalidCurve` if the curve has fewer than two points, the
    /// lengths differ, thresholds are not strictly increasing, a speed
    /// exceeds 100% or the hysteresis is negative.
    pub fn new(
        name: impl Into<String>,
        thresholds: Vec<Celsius>,
        speeds: Vec<u8>,
        hysteresis: Celsius,
    ) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| FanControlError::InvalidCurve {
            curve: name.clone(),
            reason,
        };

        if thresholds.len() < MIN_CURVE_POINTS {
            return Err(invalid(format!(
                "has less than {} ({}) temperature thresholds",
                MIN_CURVE_POINTS,
                thresholds.len()
            )));
        }
        if speeds.len() != thresholds.len() {
            return Err(invalid(format!(
                "has {} fan speeds instead of {}",
                speeds.len(),
                thresholds.len()
            )));
        }
        if let Some(t) = thresholds.iter().find(|t| !t.is_finite()) {
            return Err(invalid(format!("threshold {} is not a number", t)));
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(invalid(format!(
                "thresholds must be strictly increasing ({}°C >= {}°C)",
                pair[0], pair[1]
            )));
        }
        if let Some(s) = speeds.iter().find(|s| **s > 100) {
            return Err(invalid(format!("speed {}% exceeds 100%", s)));
        }
        if !hysteresis.is_finite() || hysteresis < 0.0 {
            return Err(invalid(format!(
                "hysteresis must be a non-negative number, got {}",
                hysteresis
            )));
        }

        Ok(Self {
            name,
            thresholds,
            speeds,
            hysteresis,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thresholds(&self) -> &[Celsius] {
        &self.thresholds
    }

    pub fn speeds(&self) -> &[u8] {
        &self.speeds
    }

    pub fn hysteresis(&self) -> Celsius {
        self.hysteresis
    }

    /// Number of tiers in the curve.
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Always false for a validated curve.
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Threshold of tier `index`.
    pub fn threshold(&self, index: usize) -> Celsius {
        self.thresholds[index]
    }

    /// Fan speed percentage of tier `index`.
    pub fn speed(&self, index: usize) -> u8 {
        self.speeds[index]
    }

    /// Highest configured threshold. Anything above hands control back to
    /// the hardware.
    pub fn highest_threshold(&self) -> Celsius {
        self.thresholds[self.thresholds.len() - 1]
    }

    /// Iterate `(threshold, speed)` pairs in ascending order.
    pub fn points(&self) -> impl Iterator<Item = (Celsius, u8)> + '_ {
        self.thresholds
            .iter()
            .copied()
            .zip(self.speeds.iter().copied())
    }
}

impl fmt::Display for TemperatureCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points: Vec<String> = self
            .points()
            .map(|(t, s)| format!("{}°C ({}%)", t, s))
            .collect();
        write!(f, "{}", points.join(", "))
    }
}

/// Which curve a decision was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveChoice {
    /// The CPU (legacy host) curve.
    Primary,
    /// The GPU curve.
    Secondary,
}

impl fmt::Display for CurveChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveChoice::Primary => write!(f, "CPU"),
            CurveChoice::Secondary => write!(f, "GPU"),
        }
    }
}

// =============================================================================
// Blending
// =============================================================================

/// Formula used to derive the effective temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendProfile {
    /// Hotter side dominates beyond the overpower margin, weighted blend otherwise.
    Dominance,
    /// Straight weighted blend of CPU average and GPU maximum.
    Weighted,
    /// `max(cpu, round((cpu + 2 * gpu_max + gpu_avg) / 4))`.
    Legacy,
}

impl fmt::Display for BlendProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendProfile::Dominance => write!(f, "dominance"),
            BlendProfile::Weighted => write!(f, "weighted"),
            BlendProfile::Legacy => write!(f, "legacy"),
        }
    }
}

/// Parameters of the CPU/GPU blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendingConfig {
    pub cpu_weight: f64,
    pub gpu_weight: f64,
    pub overpower_threshold: Celsius,
}

impl Default for BlendingConfig {
    fn default() -> Self {
        Self {
            cpu_weight: DEFAULT_CPU_WEIGHT,
            gpu_weight: DEFAULT_GPU_WEIGHT,
            overpower_threshold: DEFAULT_OVERPOWER_THRESHOLD,
        }
    }
}

impl BlendingConfig {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("temperature_control.cpu_weight", self.cpu_weight)?;
        check_non_negative("temperature_control.gpu_weight", self.gpu_weight)?;
        check_non_negative(
            "temperature_control.max_overpower_threshold",
            self.overpower_threshold,
        )
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FanControlError::InvalidConfig {
            field: field.to_string(),
            reason: format!("must be a non-negative number, got {}", value),
        })
    }
}

// =============================================================================
// Sensors
// =============================================================================

/// Sensor acquisition settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    /// Chip name prefixes whose inputs count as CPU temperatures.
    pub cpu_chips: Vec<String>,
    /// Chip name prefixes whose inputs count as AMD GPU temperatures.
    pub amd_gpu_chips: Vec<String>,
    pub monitor_amd_gpus: bool,
    pub monitor_nvidia_gpus: bool,
    /// Readings above this value are discarded.
    pub max_plausible: Celsius,
    pub gpu_timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            cpu_chips: vec!["coretemp".into(), "k10temp".into()],
            amd_gpu_chips: vec!["amdgpu".into()],
            monitor_amd_gpus: true,
            monitor_nvidia_gpus: true,
            max_plausible: DEFAULT_MAX_PLAUSIBLE,
            gpu_timeout: Duration::from_secs(DEFAULT_GPU_TIMEOUT_SECS),
        }
    }
}

impl SensorConfig {
    /// Whether a reading falls inside the plausible range.
    pub fn is_plausible(&self, celsius: Celsius) -> bool {
        celsius.is_finite() && (0.0..=self.max_plausible).contains(&celsius)
    }
}

// =============================================================================
// IPMI Target
// =============================================================================

/// Remote BMC reached over the network. Absent means local in-band access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpmiConfig {
    #[serde(default = "default_ipmi_interface")]
    pub interface: String,
    pub host: String,
    pub username: String,
    pub password: String,
}

fn default_ipmi_interface() -> String {
    "lanplus".to_string()
}

// =============================================================================
// Controller Config
// =============================================================================

/// Complete, validated configuration of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Host label used in log lines.
    pub host_name: String,
    pub primary: TemperatureCurve,
    pub secondary: Option<TemperatureCurve>,
    pub blending: BlendingConfig,
    /// Explicit blend formula. `None` resolves via [`ControllerConfig::profile`].
    pub profile: Option<BlendProfile>,
    pub interval: Duration,
    /// Dry-run: commands are described, never executed.
    pub debug: bool,
    pub sensors: SensorConfig,
    pub ipmi: Option<IpmiConfig>,
}

impl ControllerConfig {
    /// Single-curve configuration with documented defaults.
    pub fn new(host_name: impl Into<String>, primary: TemperatureCurve) -> Self {
        Self {
            host_name: host_name.into(),
            primary,
            secondary: None,
            blending: BlendingConfig::default(),
            profile: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            debug: false,
            sensors: SensorConfig::default(),
            ipmi: None,
        }
    }

    pub fn with_secondary(mut self, curve: TemperatureCurve) -> Self {
        self.secondary = Some(curve);
        self
    }

    pub fn with_blending(mut self, blending: BlendingConfig) -> Self {
        self.blending = blending;
        self
    }

    pub fn with_profile(mut self, profile: BlendProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Effective blend formula.
    ///
    /// Without an explicit choice, dual-curve setups use the dominance model
    /// and single-curve setups fall back to the straight weighted blend.
    pub fn profile(&self) -> BlendProfile {
        match (self.profile, &self.secondary) {
            (Some(profile), _) => profile,
            (None, Some(_)) => BlendProfile::Dominance,
            (None, None) => BlendProfile::Weighted,
        }
    }

    /// Curve for `choice`, falling back to the primary curve when no
    /// secondary curve is configured.
    pub fn curve(&self, choice: CurveChoice) -> &TemperatureCurve {
        match (choice, &self.secondary) {
            (CurveChoice::Secondary, Some(curve)) => curve,
            _ => &self.primary,
        }
    }

    /// Validate the scalar parameters. Curves are validated on construction.
    pub fn validate(&self) -> Result<()> {
        self.blending.validate()?;
        if self.interval < Duration::from_secs(1) {
            return Err(FanControlError::InvalidConfig {
                field: "general.interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if !self.sensors.max_plausible.is_finite() || self.sensors.max_plausible <= 0.0 {
            return Err(FanControlError::InvalidConfig {
                field: "sensors.max_plausible_celsius".into(),
                reason: format!("must be positive, got {}", self.sensors.max_plausible),
            });
        }
        if self.sensors.gpu_timeout.is_zero() {
            return Err(FanControlError::InvalidConfig {
                field: "sensors.gpu_timeout_secs".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }
}
