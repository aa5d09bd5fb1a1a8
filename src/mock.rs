//! Simulated Spectra-Physics laser controller.
//!
//! `MockLaserController` implements [`LaserController`] with a small phase
//! model that walks through the same status codes as the real laser:
//!
//! ```text
//!  0..24 warm-up ──> 25 ready ──power_on──> 26..49 ──> 50 running
//!                       ^                                │   ^
//!                       └────────── power_off ───────────┤   │
//!                                         set_mode_align │   │ 61..69
//!                                                        v   │
//!                                            51..59 ──> 60 alignment
//!                                                   set_mode_run
//! ```
//!
//! Transition durations come from [`MockLaserConfig`]; with zero durations every
//! transition completes immediately, which is what most tests want.
//!
//! For tests the mock also records every command it receives and supports
//! fault injection (forced raw values, failing or hanging reads).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::controller::LaserController;
use crate::controls::Shutter;

/// MaiTai tuning range in nm.
pub const WAVELENGTH_RANGE_NM: (f64, f64) = (690.0, 1040.0);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the simulated laser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockLaserConfig {
    /// Warm-up duration before the laser reports ready (status 25)
    pub warmup_secs: f64,
    /// Power-on sequence duration (status 26-49)
    pub turn_on_secs: f64,
    /// Duration of a run/align transition (status 51-59, 61-69)
    pub mode_switch_secs: f64,
    /// Initial wavelength in nm
    pub wavelength_nm: f64,
    /// Initial tuning motor position
    pub motor_position: f64,
    /// Output power when running, in W
    pub full_power_w: f64,
    /// Head temperature
    pub temperature_c: f64,
    /// Relative humidity
    pub humidity_pct: f64,
    /// Diode current while emitting
    pub diode_current_a: f64,
    /// Relative telemetry jitter (0.0 = none)
    pub telemetry_noise: f64,
    /// Number of status codes kept in the history buffer
    pub history_len: usize,
}

impl Default for MockLaserConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 5.0,
            turn_on_secs: 10.0,
            mode_switch_secs: 3.0,
            wavelength_nm: 800.0,
            motor_position: 12.5,
            full_power_w: 3.0,
            temperature_c: 22.5,
            humidity_pct: 3.2,
            diode_current_a: 24.0,
            telemetry_noise: 0.002,
            history_len: 16,
        }
    }
}

impl MockLaserConfig {
    /// Zero transition times and no jitter: deterministic for tests.
    pub fn instant() -> Self {
        Self {
            warmup_secs: 0.0,
            turn_on_secs: 0.0,
            mode_switch_secs: 0.0,
            telemetry_noise: 0.0,
            ..Default::default()
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("warmup_secs", self.warmup_secs),
            ("turn_on_secs", self.turn_on_secs),
            ("mode_switch_secs", self.mode_switch_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(anyhow!("{} must be a non-negative number", name));
            }
        }

        let (min, max) = WAVELENGTH_RANGE_NM;
        if !(min..=max).contains(&self.wavelength_nm) {
            return Err(anyhow!(
                "Wavelength {} nm out of range ({}-{} nm)",
                self.wavelength_nm,
                min,
                max
            ));
        }

        if self.full_power_w <= 0.0 {
            return Err(anyhow!("full_power_w must be positive"));
        }

        if !(0.0..1.0).contains(&self.telemetry_noise) {
            return Err(anyhow!("telemetry_noise must be in [0, 1)"));
        }

        if self.history_len == 0 {
            return Err(anyhow!("history_len must be at least 1"));
        }

        Ok(())
    }
}

// =============================================================================
// Call log and fault injection
// =============================================================================

/// A command received by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCall {
    /// `open_pump_shutter()`
    OpenPumpShutter,
    /// `close_pump_shutter()`
    ClosePumpShutter,
    /// `open_ir_shutter()`
    OpenIrShutter,
    /// `close_ir_shutter()`
    CloseIrShutter,
    /// `power_on(blocking)`
    PowerOn {
        /// Whether the caller asked to wait for completion
        blocking: bool,
    },
    /// `power_off()`
    PowerOff,
    /// `set_mode_align()`
    SetModeAlign,
    /// `set_mode_run()`
    SetModeRun,
    /// `set_wavelength(nm)`
    SetWavelength(f64),
    /// `set_motor_position(pos)`
    SetMotorPosition(f64),
}

/// Fault injected into query methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFault {
    /// Queries behave normally.
    #[default]
    None,
    /// Telemetry queries fail; status and shutter queries still work.
    Telemetry,
    /// Every query fails.
    All,
    /// Every query hangs forever.
    Hang,
}

// =============================================================================
// Phase model
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    WarmingUp { since: Instant },
    Ready,
    TurningOn { since: Instant },
    Running,
    EnteringAlignment { since: Instant },
    Alignment,
    ExitingAlignment { since: Instant },
}

#[derive(Debug)]
struct MockState {
    phase: Phase,
    forced_status: Option<i32>,
    pump_shutter: i32,
    ir_shutter: i32,
    wavelength_nm: f64,
    motor_position: f64,
    history: VecDeque<i32>,
    read_fault: ReadFault,
    calls: Vec<ControllerCall>,
}

/// Fraction of `total` elapsed since `since`, clamped to `[0, 1]`.
fn progress(since: Instant, total: Duration, now: Instant) -> f64 {
    if total.is_zero() {
        return 1.0;
    }
    (now.saturating_duration_since(since).as_secs_f64() / total.as_secs_f64()).min(1.0)
}

/// Map progress onto an inclusive status-code span.
fn code_in(first: i32, last: i32, fraction: f64) -> i32 {
    let span = f64::from(last - first);
    (first + (fraction * span).floor() as i32).min(last)
}

// =============================================================================
// MockLaserController
// =============================================================================

/// Simulated laser controller.
pub struct MockLaserController {
    config: MockLaserConfig,
    state: Mutex<MockState>,
}

impl MockLaserController {
    /// Create a mock with default configuration (warming up).
    pub fn new() -> Self {
        Self::with_config(MockLaserConfig::default())
    }

    /// Create a mock with custom configuration.
    pub fn with_config(config: MockLaserConfig) -> Self {
        let state = MockState {
            phase: Phase::WarmingUp {
                since: Instant::now(),
            },
            forced_status: None,
            pump_shutter: 0,
            ir_shutter: 0,
            wavelength_nm: config.wavelength_nm,
            motor_position: config.motor_position,
            history: VecDeque::with_capacity(config.history_len),
            read_fault: ReadFault::None,
            calls: Vec::new(),
        };

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Instant-transition mock that is already ready to turn on (status 25).
    pub fn ready() -> Self {
        Self::with_config(MockLaserConfig::instant())
    }

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value.max(0.0))
    }

    /// Promote finished transitions.
    fn advance(&self, state: &mut MockState, now: Instant) {
        let warmup = Self::secs(self.config.warmup_secs);
        let turn_on = Self::secs(self.config.turn_on_secs);
        let switch = Self::secs(self.config.mode_switch_secs);

        state.phase = match state.phase {
            Phase::WarmingUp { since } if progress(since, warmup, now) >= 1.0 => Phase::Ready,
            Phase::TurningOn { since } if progress(since, turn_on, now) >= 1.0 => Phase::Running,
            Phase::EnteringAlignment { since } if progress(since, switch, now) >= 1.0 => {
                Phase::Alignment
            }
            Phase::ExitingAlignment { since } if progress(since, switch, now) >= 1.0 => {
                Phase::Running
            }
            other => other,
        };
    }

    fn status_code(&self, state: &MockState, now: Instant) -> i32 {
        if let Some(code) = state.forced_status {
            return code;
        }

        match state.phase {
            Phase::WarmingUp { since } => code_in(
                0,
                24,
                progress(since, Self::secs(self.config.warmup_secs), now),
            ),
            Phase::Ready => 25,
            Phase::TurningOn { since } => code_in(
                26,
                49,
                progress(since, Self::secs(self.config.turn_on_secs), now),
            ),
            Phase::Running => 50,
            Phase::EnteringAlignment { since } => code_in(
                51,
                59,
                progress(since, Self::secs(self.config.mode_switch_secs), now),
            ),
            Phase::Alignment => 60,
            Phase::ExitingAlignment { since } => code_in(
                61,
                69,
                progress(since, Self::secs(self.config.mode_switch_secs), now),
            ),
        }
    }

    fn record_history(&self, state: &mut MockState, code: i32) {
        if state.history.front() != Some(&code) {
            state.history.push_front(code);
            state.history.truncate(self.config.history_len);
        }
    }

    fn jitter(&self, value: f64) -> f64 {
        if self.config.telemetry_noise == 0.0 {
            return value;
        }
        let factor = rand::thread_rng().gen_range(-1.0..=1.0) * self.config.telemetry_noise;
        value * (1.0 + factor)
    }

    /// Lock the state, apply the read fault for this query kind, and advance the phase.
    async fn query_state(&self, telemetry: bool) -> Result<tokio::sync::MutexGuard<'_, MockState>> {
        let fault = self.state.lock().await.read_fault;
        match fault {
            ReadFault::Hang => std::future::pending::<()>().await,
            ReadFault::All => return Err(anyhow!("Simulated communication loss")),
            ReadFault::Telemetry if telemetry => {
                return Err(anyhow!("Simulated telemetry read failure"))
            }
            _ => {}
        }

        let mut state = self.state.lock().await;
        self.advance(&mut state, Instant::now());
        Ok(state)
    }

    async fn command_state(&self, call: ControllerCall) -> tokio::sync::MutexGuard<'_, MockState> {
        let mut state = self.state.lock().await;
        self.advance(&mut state, Instant::now());
        tracing::debug!(?call, "Mock laser command");
        state.calls.push(call);
        state
    }

    // ---------------------------------------------------------------------
    // Test hooks
    // ---------------------------------------------------------------------

    /// Commands received so far, in order.
    pub async fn calls(&self) -> Vec<ControllerCall> {
        self.state.lock().await.calls.clone()
    }

    /// How many times `call` was received.
    pub async fn call_count(&self, call: &ControllerCall) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    /// Forget recorded commands.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Report `code` from `get_status` regardless of phase (`None` to stop).
    pub async fn force_status(&self, code: Option<i32>) {
        self.state.lock().await.forced_status = code;
    }

    /// Set the raw value a shutter query reports, e.g. `2` to simulate a fault.
    pub async fn set_raw_shutter_state(&self, shutter: Shutter, raw: i32) {
        let mut state = self.state.lock().await;
        match shutter {
            Shutter::Pump => state.pump_shutter = raw,
            Shutter::Ir => state.ir_shutter = raw,
        }
    }

    /// Inject a read fault.
    pub async fn set_read_fault(&self, fault: ReadFault) {
        self.state.lock().await.read_fault = fault;
    }
}

impl Default for MockLaserController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LaserController for MockLaserController {
    async fn get_status(&self) -> Result<i32> {
        let mut state = self.query_state(false).await?;
        let code = self.status_code(&state, Instant::now());
        self.record_history(&mut state, code);
        Ok(code)
    }

    async fn pump_shutter_state(&self) -> Result<i32> {
        Ok(self.query_state(false).await?.pump_shutter)
    }

    async fn ir_shutter_state(&self) -> Result<i32> {
        Ok(self.query_state(false).await?.ir_shutter)
    }

    async fn get_power(&self) -> Result<f64> {
        let state = self.query_state(true).await?;
        let now = Instant::now();
        let power = match state.phase {
            Phase::Running | Phase::EnteringAlignment { .. } | Phase::ExitingAlignment { .. } => {
                self.config.full_power_w
            }
            // Alignment mode runs at reduced power
            Phase::Alignment => self.config.full_power_w * 0.1,
            Phase::TurningOn { since } => {
                let fraction = progress(since, Self::secs(self.config.turn_on_secs), now);
                // 1 - e^(-3t) reaches ~95% at t = 1
                self.config.full_power_w * (1.0 - (-3.0 * fraction).exp())
            }
            Phase::WarmingUp { .. } | Phase::Ready => 0.0,
        };
        Ok(self.jitter(power))
    }

    async fn get_wavelength(&self) -> Result<i32> {
        Ok(self.query_state(true).await?.wavelength_nm.round() as i32)
    }

    async fn get_motor_position(&self) -> Result<f64> {
        Ok(self.query_state(true).await?.motor_position)
    }

    async fn get_mode(&self) -> Result<String> {
        let state = self.query_state(true).await?;
        let mode = match state.phase {
            Phase::Alignment | Phase::EnteringAlignment { .. } => "ALIGN",
            Phase::Running | Phase::ExitingAlignment { .. } | Phase::TurningOn { .. } => "RUN",
            Phase::WarmingUp { .. } | Phase::Ready => "STANDBY",
        };
        Ok(mode.to_string())
    }

    async fn get_temperature(&self) -> Result<f64> {
        let _state = self.query_state(true).await?;
        Ok(self.jitter(self.config.temperature_c))
    }

    async fn get_humidity(&self) -> Result<f64> {
        let _state = self.query_state(true).await?;
        Ok(self.jitter(self.config.humidity_pct))
    }

    async fn get_current(&self) -> Result<f64> {
        let state = self.query_state(true).await?;
        let current = match state.phase {
            Phase::WarmingUp { .. } | Phase::Ready => 0.0,
            _ => self.config.diode_current_a,
        };
        Ok(self.jitter(current))
    }

    async fn get_history(&self) -> Result<String> {
        let state = self.query_state(true).await?;
        Ok(state
            .history
            .iter()
            .map(|code| format!("{:03} ", code))
            .collect())
    }

    async fn set_mode_align(&self) -> Result<()> {
        let mut state = self.command_state(ControllerCall::SetModeAlign).await;
        match state.phase {
            Phase::Running => {
                state.phase = Phase::EnteringAlignment {
                    since: Instant::now(),
                };
                Ok(())
            }
            Phase::Alignment | Phase::EnteringAlignment { .. } => Ok(()),
            _ => Err(anyhow!("Cannot enter alignment mode: laser is not running")),
        }
    }

    async fn set_mode_run(&self) -> Result<()> {
        let mut state = self.command_state(ControllerCall::SetModeRun).await;
        match state.phase {
            Phase::Alignment => {
                state.phase = Phase::ExitingAlignment {
                    since: Instant::now(),
                };
                Ok(())
            }
            Phase::Running | Phase::ExitingAlignment { .. } => Ok(()),
            _ => Err(anyhow!("Cannot enter running mode: laser is not in alignment mode")),
        }
    }

    async fn open_pump_shutter(&self) -> Result<()> {
        self.command_state(ControllerCall::OpenPumpShutter)
            .await
            .pump_shutter = 1;
        Ok(())
    }

    async fn close_pump_shutter(&self) -> Result<()> {
        self.command_state(ControllerCall::ClosePumpShutter)
            .await
            .pump_shutter = 0;
        Ok(())
    }

    async fn open_ir_shutter(&self) -> Result<()> {
        self.command_state(ControllerCall::OpenIrShutter)
            .await
            .ir_shutter = 1;
        Ok(())
    }

    async fn close_ir_shutter(&self) -> Result<()> {
        self.command_state(ControllerCall::CloseIrShutter)
            .await
            .ir_shutter = 0;
        Ok(())
    }

    async fn power_on(&self, blocking: bool) -> Result<()> {
        {
            let mut state = self.command_state(ControllerCall::PowerOn { blocking }).await;
            if state.phase != Phase::Ready {
                return Err(anyhow!("Laser is not ready to turn on"));
            }
            state.phase = Phase::TurningOn {
                since: Instant::now(),
            };
        }

        if blocking {
            sleep(Self::secs(self.config.turn_on_secs)).await;
        }
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        let mut state = self.command_state(ControllerCall::PowerOff).await;
        match state.phase {
            Phase::WarmingUp { .. } => Err(anyhow!("Laser is still warming up")),
            _ => {
                state.phase = Phase::Ready;
                Ok(())
            }
        }
    }

    async fn set_wavelength(&self, wavelength_nm: f64) -> Result<()> {
        let mut state = self
            .command_state(ControllerCall::SetWavelength(wavelength_nm))
            .await;
        let (min, max) = WAVELENGTH_RANGE_NM;
        if !(min..=max).contains(&wavelength_nm) {
            return Err(anyhow!(
                "Wavelength {} nm out of range ({}-{} nm)",
                wavelength_nm,
                min,
                max
            ));
        }
        state.wavelength_nm = wavelength_nm;
        Ok(())
    }

    async fn set_motor_position(&self, position: f64) -> Result<()> {
        self.command_state(ControllerCall::SetMotorPosition(position))
            .await
            .motor_position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_in_span() {
        assert_eq!(code_in(26, 49, 0.0), 26);
        assert_eq!(code_in(26, 49, 0.5), 37);
        assert_eq!(code_in(26, 49, 1.0), 49);
    }

    #[test]
    fn test_config_validation() {
        assert!(MockLaserConfig::default().validate().is_ok());
        assert!(MockLaserConfig::instant().validate().is_ok());

        let config = MockLaserConfig {
            wavelength_nm: 1100.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MockLaserConfig {
            turn_on_secs: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_instant_lifecycle() {
        let laser = MockLaserController::ready();
        assert_eq!(laser.get_status().await.unwrap(), 25);

        laser.power_on(false).await.unwrap();
        assert_eq!(laser.get_status().await.unwrap(), 50);

        laser.set_mode_align().await.unwrap();
        assert_eq!(laser.get_status().await.unwrap(), 60);
        assert_eq!(laser.get_mode().await.unwrap(), "ALIGN");

        laser.set_mode_run().await.unwrap();
        assert_eq!(laser.get_status().await.unwrap(), 50);

        laser.power_off().await.unwrap();
        assert_eq!(laser.get_status().await.unwrap(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_power_on_walks_status_codes() {
        let laser = MockLaserController::with_config(MockLaserConfig {
            warmup_secs: 2.0,
            turn_on_secs: 10.0,
            telemetry_noise: 0.0,
            ..Default::default()
        });

        assert!(laser.get_status().await.unwrap() < 25);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(laser.get_status().await.unwrap(), 25);

        laser.power_on(false).await.unwrap();
        sleep(Duration::from_secs(5)).await;
        let mid = laser.get_status().await.unwrap();
        assert!((26..=49).contains(&mid), "status {}", mid);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(laser.get_status().await.unwrap(), 50);
        assert_eq!(laser.get_power().await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_power_on_requires_ready() {
        let laser = MockLaserController::new();
        // still warming up with the default 5 s warm-up
        assert!(laser.power_on(false).await.is_err());
    }

    #[tokio::test]
    async fn test_wavelength_range_enforced() {
        let laser = MockLaserController::ready();
        laser.set_wavelength(920.0).await.unwrap();
        assert_eq!(laser.get_wavelength().await.unwrap(), 920);
        assert!(laser.set_wavelength(532.5).await.is_err());
        assert_eq!(laser.get_wavelength().await.unwrap(), 920);
    }

    #[tokio::test]
    async fn test_history_records_transitions() {
        let laser = MockLaserController::ready();
        laser.get_status().await.unwrap();
        laser.get_status().await.unwrap();
        laser.power_on(false).await.unwrap();
        laser.get_status().await.unwrap();

        assert_eq!(laser.get_history().await.unwrap(), "050 025 ");
    }

    #[tokio::test]
    async fn test_read_faults() {
        let laser = MockLaserController::ready();

        laser.set_read_fault(ReadFault::Telemetry).await;
        assert!(laser.get_status().await.is_ok());
        assert!(laser.get_power().await.is_err());

        laser.set_read_fault(ReadFault::All).await;
        assert!(laser.get_status().await.is_err());

        laser.set_read_fault(ReadFault::None).await;
        assert!(laser.get_power().await.is_ok());
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let laser = MockLaserController::ready();
        laser.open_pump_shutter().await.unwrap();
        laser.close_ir_shutter().await.unwrap();
        laser.power_on(false).await.unwrap();

        assert_eq!(
            laser.calls().await,
            vec![
                ControllerCall::OpenPumpShutter,
                ControllerCall::CloseIrShutter,
                ControllerCall::PowerOn { blocking: false },
            ]
        );
        assert_eq!(laser.pump_shutter_state().await.unwrap(), 1);
    }
}
