//! Effective temperature estimation.
//!
//! Folds the CPU average and the GPU samples into the single value that
//! drives the threshold curve, and picks which curve applies.

use std::fmt;

use crate::config::{BlendProfile, BlendingConfig, Celsius, ControllerConfig, CurveChoice};

/// How the effective temperature was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendDecision {
    /// CPU hotter by more than the overpower margin; CPU value used as-is.
    CpuDominant,
    /// GPU hotter by more than the overpower margin; GPU maximum used as-is.
    GpuDominant,
    /// Within the margin; weighted blend on the primary curve.
    Balanced,
    /// Single-curve weighted blend.
    Weighted,
    /// Oldest fixed formula.
    Legacy,
}

impl fmt::Display for BlendDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlendDecision::CpuDominant => "cpu_dominant",
            BlendDecision::GpuDominant => "gpu_dominant",
            BlendDecision::Balanced => "balanced",
            BlendDecision::Weighted => "weighted",
            BlendDecision::Legacy => "legacy",
        };
        write!(f, "{}", name)
    }
}

/// Inputs and intermediate values behind an estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub cpu_avg: Celsius,
    pub gpu_avg: Celsius,
    pub gpu_max: Celsius,
    /// `gpu_max - cpu_avg`.
    pub temp_diff: Celsius,
    /// Number of GPU samples that went into the estimate.
    pub gpu_readings: usize,
    pub decision: BlendDecision,
}

impl Diagnostics {
    /// No GPU reported a temperature; the GPU term was taken as 0°C.
    pub fn no_gpu_readings(&self) -> bool {
        self.gpu_readings == 0
    }
}

/// Result of [`EffectiveTemperatureEstimator::estimate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub effective_temperature: Celsius,
    pub curve: CurveChoice,
    pub diagnostics: Diagnostics,
}

/// Combines CPU and GPU samples into one representative temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveTemperatureEstimator {
    blending: BlendingConfig,
    profile: BlendProfile,
    has_secondary: bool,
}

impl EffectiveTemperatureEstimator {
    pub fn new(blending: BlendingConfig, profile: BlendProfile, has_secondary: bool) -> Self {
        Self {
            blending,
            profile,
            has_secondary,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.blending, config.profile(), config.secondary.is_some())
    }

    pub fn profile(&self) -> BlendProfile {
        self.profile
    }

    /// Estimate the effective temperature from the CPU average and raw GPU samples.
    ///
    /// An empty `gpu_samples` slice counts as a GPU at 0°C.
    pub fn estimate(&self, cpu_avg: Celsius, gpu_samples: &[Celsius]) -> Estimate {
        let gpu_avg = mean(gpu_samples).map_or(0.0, f64::round);
        let gpu_max = gpu_samples.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let temp_diff = gpu_max - cpu_avg;

        let (effective_temperature, curve, decision) = match self.profile {
            BlendProfile::Dominance => self.dominance(cpu_avg, gpu_max, temp_diff),
            BlendProfile::Weighted => (
                self.weighted(cpu_avg, gpu_max),
                CurveChoice::Primary,
                BlendDecision::Weighted,
            ),
            BlendProfile::Legacy => (
                cpu_avg.max(((cpu_avg + 2.0 * gpu_max + gpu_avg) / 4.0).round()),
                CurveChoice::Primary,
                BlendDecision::Legacy,
            ),
        };

        Estimate {
            effective_temperature,
            curve,
            diagnostics: Diagnostics {
                cpu_avg,
                gpu_avg,
                gpu_max,
                temp_diff,
                gpu_readings: gpu_samples.len(),
                decision,
            },
        }
    }

    fn dominance(
        &self,
        cpu_avg: Celsius,
        gpu_max: Celsius,
        temp_diff: Celsius,
    ) -> (Celsius, CurveChoice, BlendDecision) {
        if temp_diff.abs() > self.blending.overpower_threshold {
            if temp_diff > 0.0 {
                let curve = if self.has_secondary {
                    CurveChoice::Secondary
                } else {
                    CurveChoice::Primary
                };
                (gpu_max, curve, BlendDecision::GpuDominant)
            } else {
                (cpu_avg, CurveChoice::Primary, BlendDecision::CpuDominant)
            }
        } else {
            // Balanced workloads always run on the CPU curve.
            (
                self.weighted(cpu_avg, gpu_max),
                CurveChoice::Primary,
                BlendDecision::Balanced,
            )
        }
    }

    fn weighted(&self, cpu_avg: Celsius, gpu_max: Celsius) -> Celsius {
        (cpu_avg * self.blending.cpu_weight + gpu_max * self.blending.gpu_weight).round()
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(samples: &[Celsius]) -> Option<Celsius> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<Celsius>() / samples.len() as Celsius)
    }
}

/// CPU average rounded to a whole degree, 0°C when nothing was read.
pub fn cpu_average(samples: &[Celsius]) -> Celsius {
    mean(samples).map_or(0.0, f64::round)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual() -> EffectiveTemperatureEstimator {
        EffectiveTemperatureEstimator::new(BlendingConfig::default(), BlendProfile::Dominance, true)
    }

    #[test]
    fn test_cpu_dominant() {
        let estimate = dual().estimate(80.0, &[55.0, 52.0, 50.0]);
        assert_eq!(estimate.effective_temperature, 80.0);
        assert_eq!(estimate.curve, CurveChoice::Primary);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::CpuDominant);
        assert_eq!(estimate.diagnostics.temp_diff, -25.0);
    }

    #[test]
    fn test_gpu_dominant() {
        let estimate = dual().estimate(60.0, &[76.0, 72.0, 70.0]);
        assert_eq!(estimate.effective_temperature, 76.0);
        assert_eq!(estimate.curve, CurveChoice::Secondary);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::GpuDominant);
    }

    #[test]
    fn test_dominance_uses_raw_value_not_blend() {
        let estimate = dual().estimate(80.0, &[55.0]);
        assert_eq!(estimate.effective_temperature, 80.0);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::CpuDominant);
    }

    #[test]
    fn test_balanced_workload() {
        let estimate = dual().estimate(65.0, &[68.0, 66.0, 64.0]);
        // 66.5 rounds away from zero
        assert_eq!(estimate.effective_temperature, 67.0);
        assert_eq!(estimate.curve, CurveChoice::Primary);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::Balanced);
        assert_eq!(estimate.diagnostics.gpu_max, 68.0);
        assert_eq!(estimate.diagnostics.gpu_avg, 66.0);
    }

    #[test]
    fn test_margin_is_exclusive() {
        // Exactly 15°C apart stays balanced.
        let estimate = dual().estimate(80.0, &[65.0]);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::Balanced);
        assert_eq!(estimate.effective_temperature, 73.0);
    }

    #[test]
    fn test_balanced_prefers_cpu_curve_even_when_gpu_hotter() {
        let estimate = dual().estimate(60.0, &[70.0]);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::Balanced);
        assert_eq!(estimate.curve, CurveChoice::Primary);
    }

    #[test]
    fn test_no_gpus() {
        let estimate = dual().estimate(65.0, &[]);
        assert_eq!(estimate.effective_temperature, 65.0);
        assert_eq!(estimate.curve, CurveChoice::Primary);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::CpuDominant);
        assert!(estimate.diagnostics.no_gpu_readings());
    }

    #[test]
    fn test_no_gpus_cool_cpu_blends_with_zero() {
        let estimate = dual().estimate(12.0, &[]);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::Balanced);
        assert_eq!(estimate.effective_temperature, 6.0);
    }

    #[test]
    fn test_custom_weights() {
        let blending = BlendingConfig {
            cpu_weight: 0.7,
            gpu_weight: 0.3,
            ..BlendingConfig::default()
        };
        let estimator = EffectiveTemperatureEstimator::new(blending, BlendProfile::Dominance, true);
        let estimate = estimator.estimate(70.0, &[60.0]);
        assert_eq!(estimate.effective_temperature, 67.0);
    }

    #[test]
    fn test_gpu_dominant_without_secondary_stays_on_primary() {
        let estimator =
            EffectiveTemperatureEstimator::new(BlendingConfig::default(), BlendProfile::Dominance, false);
        let estimate = estimator.estimate(40.0, &[80.0]);
        assert_eq!(estimate.effective_temperature, 80.0);
        assert_eq!(estimate.curve, CurveChoice::Primary);
    }

    #[test]
    fn test_single_curve_weighted_blend() {
        let estimator =
            EffectiveTemperatureEstimator::new(BlendingConfig::default(), BlendProfile::Weighted, false);
        let estimate = estimator.estimate(65.0, &[70.0, 68.0, 66.0]);
        assert_eq!(estimate.effective_temperature, 68.0);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::Weighted);

        // No dominance branch: a large gap is still blended.
        let estimate = estimator.estimate(40.0, &[90.0]);
        assert_eq!(estimate.effective_temperature, 65.0);
    }

    #[test]
    fn test_legacy_formula() {
        let estimator =
            EffectiveTemperatureEstimator::new(BlendingConfig::default(), BlendProfile::Legacy, false);

        // (60 + 2*80 + 75) / 4 = 73.75
        let estimate = estimator.estimate(60.0, &[80.0, 70.0]);
        assert_eq!(estimate.effective_temperature, 74.0);
        assert_eq!(estimate.diagnostics.decision, BlendDecision::Legacy);

        // Never below the CPU average.
        let estimate = estimator.estimate(70.0, &[]);
        assert_eq!(estimate.effective_temperature, 70.0);
    }

    #[test]
    fn test_cpu_average() {
        assert_eq!(cpu_average(&[40.0, 41.0, 42.0, 44.0]), 42.0);
        assert_eq!(cpu_average(&[]), 0.0);
        assert_eq!(mean(&[]), None);
    }
}
