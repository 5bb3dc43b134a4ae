//! Periodic sample, decide, act loop.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::config::{Celsius, ControllerConfig, CurveChoice};
use crate::cooling::controller::{ControllerState, FanModeController, Outcome};
use crate::cooling::estimator::{Diagnostics, EffectiveTemperatureEstimator, cpu_average};
use crate::cooling::selector::{Selection, ThresholdSelector};
use crate::cooling::shutdown::ShutdownSignal;
use crate::device::HardwareCommandChannel;
use crate::error::Result;
use crate::utils::SensorReader;

/// What one cycle decided, before any command was sent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub effective_temperature: Celsius,
    pub curve_used: CurveChoice,
    pub selection: Selection,
    pub diagnostics: Diagnostics,
}

/// Decide what to do for one set of readings.
///
/// Pure: no sensor access and no hardware commands.
pub fn decide(
    config: &ControllerConfig,
    cpu_temps: &[Celsius],
    gpu_temps: &[Celsius],
    state: &ControllerState,
) -> Decision {
    let estimate = EffectiveTemperatureEstimator::from_config(config).estimate(cpu_average(cpu_temps), gpu_temps);
    let curve = config.curve(estimate.curve);
    let selection = ThresholdSelector::select(estimate.effective_temperature, curve, state);

    Decision {
        effective_temperature: estimate.effective_temperature,
        curve_used: estimate.curve,
        selection,
        diagnostics: estimate.diagnostics,
    }
}

/// A completed cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub decision: Decision,
    pub outcome: Outcome,
}

/// Owns the sensors and the fan controller for the life of the process.
///
/// The forced return to automatic mode runs exactly once: at the end of
/// [`ControlLoop::run`], on an explicit [`ControlLoop::shutdown`], or on drop.
pub struct ControlLoop<'a, S: SensorReader, C: HardwareCommandChannel> {
    config: &'a ControllerConfig,
    sensors: S,
    controller: FanModeController<C>,
    signal: ShutdownSignal,
    cycles: u64,
    shut_down: bool,
}

impl<'a, S: SensorReader, C: HardwareCommandChannel> ControlLoop<'a, S, C> {
    pub fn new(
        config: &'a ControllerConfig,
        sensors: S,
        controller: FanModeController<C>,
        signal: ShutdownSignal,
    ) -> Self {
        Self {
            config,
            sensors,
            controller,
            signal,
            cycles: 0,
            shut_down: false,
        }
    }

    pub fn controller(&self) -> &FanModeController<C> {
        &self.controller
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Sample, decide and act once.
    ///
    /// An `Err` means a hardware command failed; the state is left as it
    /// was and the next cycle tries again.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let host = &self.config.host_name;

        let cpu_temps = self.sensors.read_cpu_temperatures();
        let gpu_temps = self.sensors.read_gpu_temperatures();
        if cpu_temps.is_empty() {
            warn!("[{}] No CPU temperatures available, assuming 0°C", host);
        }
        if !gpu_temps.is_empty() && gpu_temps.iter().all(|&t| t == 0.0) {
            warn!("[{}] All GPUs report 0°C, check the GPU drivers", host);
        }

        let decision = decide(self.config, &cpu_temps, &gpu_temps, &self.controller.state());
        let diag = &decision.diagnostics;
        if diag.no_gpu_readings() {
            warn!("[{}] No GPU readings, GPU term taken as 0°C", host);
        }
        debug!(
            "[{}] CPU avg: {}°C, GPU max: {}°C, GPU avg: {}°C, diff: {}°C ({} GPU readings)",
            host, diag.cpu_avg, diag.gpu_max, diag.gpu_avg, diag.temp_diff, diag.gpu_readings
        );
        debug!(
            "[{}] {} -> effective {}°C on {} curve, {}",
            host, diag.decision, decision.effective_temperature, decision.curve_used, decision.selection
        );

        let curve = self.config.curve(decision.curve_used);
        let outcome = self.controller.apply(decision.selection, curve)?;
        if outcome != Outcome::Unchanged {
            debug!("[{}] {:?}, now {}", host, outcome, self.controller.state());
        }

        Ok(CycleReport { decision, outcome })
    }

    /// Run cycles every `config.interval` until the signal fires, then
    /// restore automatic mode. Returns the number of cycles run.
    ///
    /// Failed and panicking cycles are logged and do not stop the loop.
    pub fn run(&mut self) -> u64 {
        let host = self.config.host_name.clone();

        while !self.signal.is_triggered() {
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("[{}] Cycle {} failed: {}", host, self.cycles, e),
                Err(_) => error!("[{}] Cycle {} panicked, continuing", host, self.cycles),
            }

            if self.signal.wait_timeout(self.config.interval) {
                break;
            }
        }

        self.shutdown();
        self.cycles
    }

    /// Force automatic fan mode. Only the first call sends anything.
    ///
    /// Returns whether the hardware acknowledged the hand-back.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.shut_down = true;

        info!("[{}] Shutting down, restoring automatic fan control", self.config.host_name);
        let controller = &mut self.controller;
        let restored = panic::catch_unwind(AssertUnwindSafe(|| controller.force_automatic())).unwrap_or(false);
        if !restored {
            error!("[{}] Fans may still be in manual mode", self.config.host_name);
        }
        restored
    }
}

impl<S: SensorReader, C: HardwareCommandChannel> Drop for ControlLoop<'_, S, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlendingConfig, TemperatureCurve};
    use crate::protocol::{FanCommand, FanMode};
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct CpuOnlySensors;

    impl SensorReader for CpuOnlySensors {
        fn read_cpu_temperatures(&mut self) -> Vec<Celsius> {
            vec![50.0]
        }

        fn read_gpu_temperatures(&mut self) -> Vec<Celsius> {
            Vec::new()
        }
    }

    struct AcceptAll;

    impl HardwareCommandChannel for AcceptAll {
        fn send(&mut self, _command: FanCommand) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn dual_config() -> ControllerConfig {
        let cpu = TemperatureCurve::new("cpu", vec![55.0, 60.0, 70.0, 75.0], vec![13, 17, 25, 37], 2.0).unwrap();
        let gpu = TemperatureCurve::new("gpu", vec![60.0, 70.0, 80.0], vec![20, 30, 45], 3.0).unwrap();
        ControllerConfig::new("test", cpu)
            .with_secondary(gpu)
            .with_blending(BlendingConfig::default())
    }

    fn manual(speed: u8) -> ControllerState {
        ControllerState {
            mode: FanMode::Manual,
            current_speed_percent: speed,
        }
    }

    #[test]
    fn test_decide_cpu_dominant() {
        let decision = decide(&dual_config(), &[80.0, 80.0], &[55.0], &manual(37));
        assert_eq!(decision.effective_temperature, 80.0);
        assert_eq!(decision.curve_used, CurveChoice::Primary);
        assert_eq!(decision.selection, Selection::Automatic);
    }

    #[test]
    fn test_decide_gpu_dominant_uses_gpu_curve() {
        let decision = decide(&dual_config(), &[50.0], &[75.0, 70.0], &manual(30));
        assert_eq!(decision.curve_used, CurveChoice::Secondary);
        assert_eq!(decision.selection, Selection::Tier(2));
    }

    #[test]
    fn test_decide_balanced() {
        let decision = decide(&dual_config(), &[65.0], &[68.0, 66.0, 64.0], &manual(25));
        assert_eq!(decision.effective_temperature, 67.0);
        assert_eq!(decision.curve_used, CurveChoice::Primary);
        assert_eq!(decision.selection, Selection::Tier(2));
    }

    #[test]
    fn test_decide_without_cpu_readings() {
        let decision = decide(&dual_config(), &[], &[], &manual(13));
        assert_eq!(decision.effective_temperature, 0.0);
        assert_eq!(decision.selection, Selection::Tier(0));
    }

    #[test]
    fn test_missing_gpu_readings_are_warned() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let config = dual_config();
        let controller = FanModeController::new(AcceptAll).with_settle_delay(Duration::ZERO);
        let mut control = ControlLoop::new(&config, CpuOnlySensors, controller, ShutdownSignal::new());

        let report = tracing::subscriber::with_default(subscriber, || control.run_cycle()).unwrap();

        assert!(report.decision.diagnostics.no_gpu_readings());
        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("No GPU readings"));
    }
}
