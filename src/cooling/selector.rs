//! Threshold selection with hysteresis.

use std::fmt;

use crate::config::{Celsius, TemperatureCurve};
use crate::cooling::controller::ControllerState;
use crate::protocol::FanMode;

/// Outcome of walking a curve for one effective temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Run the fans at the speed of this tier.
    Tier(usize),
    /// Above the curve; hand control back to the hardware.
    Automatic,
    /// Hysteresis blocked every eligible tier; keep the present state.
    Hold,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Tier(index) => write!(f, "tier {}", index),
            Selection::Automatic => write!(f, "automatic"),
            Selection::Hold => write!(f, "hold"),
        }
    }
}

/// Suppresses downward steps until the temperature has dropped clear of
/// the threshold by the curve's hysteresis margin.
#[derive(Debug, Clone, Copy, Default)]
pub struct HysteresisGate;

impl HysteresisGate {
    /// Whether moving to `tier` for `candidate` is allowed right now.
    ///
    /// Gated steps are downward steps from a faster tier and any step out
    /// of automatic mode. Upward steps while already manual always pass.
    pub fn permits(
        candidate: Celsius,
        tier: usize,
        state: &ControllerState,
        curve: &TemperatureCurve,
    ) -> bool {
        let hysteresis = curve.hysteresis();
        if hysteresis == 0.0 {
            return true;
        }

        let gated = state.current_speed_percent > curve.speed(tier) || state.mode == FanMode::Automatic;
        if gated {
            candidate <= curve.threshold(tier) - hysteresis
        } else {
            true
        }
    }
}

/// Maps an effective temperature onto a curve tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdSelector;

impl ThresholdSelector {
    /// Pick the tier for `effective` given the controller's present state.
    ///
    /// Thresholds are inclusive upper bounds. Anything above the highest
    /// threshold selects [`Selection::Automatic`] regardless of hysteresis.
    pub fn select(effective: Celsius, curve: &TemperatureCurve, state: &ControllerState) -> Selection {
        if effective > curve.highest_threshold() {
            return Selection::Automatic;
        }

        curve
            .thresholds()
            .iter()
            .enumerate()
            .find(|&(tier, &threshold)| {
                effective <= threshold && HysteresisGate::permits(effective, tier, state, curve)
            })
            .map_or(Selection::Hold, |(tier, _)| Selection::Tier(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(hysteresis: Celsius) -> TemperatureCurve {
        TemperatureCurve::new(
            "test",
            vec![55.0, 60.0, 70.0, 75.0],
            vec![13, 17, 25, 37],
            hysteresis,
        )
        .unwrap()
    }

    fn manual(speed: u8) -> ControllerState {
        ControllerState {
            mode: FanMode::Manual,
            current_speed_percent: speed,
        }
    }

    #[test]
    fn test_no_hysteresis_is_plain_lookup() {
        let curve = curve(0.0);
        let automatic = ControllerState::default();
        for state in [automatic, manual(37), manual(13)] {
            assert_eq!(ThresholdSelector::select(30.0, &curve, &state), Selection::Tier(0));
            assert_eq!(ThresholdSelector::select(56.0, &curve, &state), Selection::Tier(1));
            assert_eq!(ThresholdSelector::select(74.5, &curve, &state), Selection::Tier(3));
        }
    }

    #[test]
    fn test_equal_temperature_selects_lower_tier() {
        let curve = curve(0.0);
        let state = ControllerState::default();
        assert_eq!(ThresholdSelector::select(60.0, &curve, &state), Selection::Tier(1));
        assert_eq!(ThresholdSelector::select(60.5, &curve, &state), Selection::Tier(2));
    }

    #[test]
    fn test_above_curve_is_automatic() {
        let curve = curve(2.0);
        for state in [ControllerState::default(), manual(13), manual(37)] {
            assert_eq!(ThresholdSelector::select(75.1, &curve, &state), Selection::Automatic);
            assert_eq!(ThresholdSelector::select(99.0, &curve, &state), Selection::Automatic);
        }
    }

    #[test]
    fn test_downward_step_suppressed_within_margin() {
        let curve = curve(2.0);
        let state = manual(37);

        // 69 > 70 - 2: stay on the 75°C tier
        assert_eq!(ThresholdSelector::select(69.0, &curve, &state), Selection::Tier(3));
        // 67 <= 68: step down to the 70°C tier
        assert_eq!(ThresholdSelector::select(67.0, &curve, &state), Selection::Tier(2));
    }

    #[test]
    fn test_upward_step_never_gated_in_manual() {
        let curve = curve(2.0);
        let state = manual(13);
        assert_eq!(ThresholdSelector::select(69.5, &curve, &state), Selection::Tier(2));
        assert_eq!(ThresholdSelector::select(75.0, &curve, &state), Selection::Tier(3));
    }

    #[test]
    fn test_leaving_automatic_is_gated() {
        let curve = curve(2.0);
        let state = ControllerState::default();

        assert_eq!(ThresholdSelector::select(52.0, &curve, &state), Selection::Tier(0));
        // Too close to 60, clears 70 - 2
        assert_eq!(ThresholdSelector::select(59.0, &curve, &state), Selection::Tier(2));
        // Within the margin of every remaining tier
        assert_eq!(ThresholdSelector::select(74.0, &curve, &state), Selection::Hold);
    }

    #[test]
    fn test_gate_direct() {
        let gated = curve(2.0);
        let ungated = curve(0.0);
        assert!(HysteresisGate::permits(69.0, 3, &manual(37), &gated));
        assert!(!HysteresisGate::permits(69.0, 2, &manual(37), &gated));
        assert!(HysteresisGate::permits(68.0, 2, &manual(37), &gated));
        assert!(HysteresisGate::permits(70.0, 2, &manual(17), &gated));
        assert!(!HysteresisGate::permits(70.0, 2, &ControllerState::default(), &gated));
        assert!(HysteresisGate::permits(70.0, 2, &manual(37), &ungated));
    }
}
