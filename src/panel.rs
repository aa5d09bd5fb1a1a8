//! Laser control panel: status interpreter and command dispatcher.
//!
//! [`LaserPanel`] owns the local toggle states and the rendered [`PanelView`].
//! It has two refresh paths and a set of click handlers:
//!
//! - [`poll_status`](LaserPanel::poll_status) reads the status code and both
//!   shutter states and updates the toggle states and button faces.
//! - [`refresh_display`](LaserPanel::refresh_display) classifies the last status
//!   code and reads a fresh telemetry snapshot into the text fields.
//! - The `toggle_*` and `update_*` handlers translate clicks and edits into
//!   controller commands.
//!
//! Toggle states only change when the controller is polled. A click issues the
//! command that inverts the last observed state; the next poll confirms it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::controller::{LaserController, ShutterCommands};
use crate::controls::{ButtonFace, LaserMode, PowerState, Shutter, ShutterReading, ShutterState};
use crate::error::{EditableField, PanelError, PanelResult};
use crate::status::{LaserPhase, STATUS_READY, STATUS_RUNNING};

/// Default number of history characters shown (eight status codes).
pub const DEFAULT_HISTORY_CHARS: usize = 32;

/// Rendered panel contents.
///
/// A value copy: every refresh produces a new view, so it can be handed to a
/// renderer without sharing state with the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    /// Status phase label
    pub status_text: String,
    /// Power on/off button
    pub power_button: ButtonFace,
    /// Run/align mode button caption
    pub mode_button: &'static str,
    /// Pump shutter button
    pub pump_shutter_button: ButtonFace,
    /// IR shutter button
    pub ir_shutter_button: ButtonFace,
    /// Output power (W)
    pub power: String,
    /// Wavelength (nm)
    pub wavelength: String,
    /// Tuning motor position
    pub motor_position: String,
    /// Device-reported mode
    pub mode: String,
    /// Head temperature
    pub temperature: String,
    /// Humidity
    pub humidity: String,
    /// Diode current
    pub current: String,
    /// Recent status history (truncated)
    pub history: String,
    /// Last input warning, cleared by the next successful action
    pub warning: Option<String>,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            status_text: String::new(),
            power_button: PowerState::Unknown.face(),
            mode_button: LaserMode::Run.button_label(),
            pump_shutter_button: ShutterReading::default().state.face(),
            ir_shutter_button: ShutterReading::default().state.face(),
            power: String::new(),
            wavelength: String::new(),
            motor_position: String::new(),
            mode: String::new(),
            temperature: String::new(),
            humidity: String::new(),
            current: String::new(),
            history: String::new(),
            warning: None,
        }
    }
}

impl fmt::Display for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Laser status:       {}", self.status_text)?;
        writeln!(f, "Laser On/Off:       {}", self.power_button)?;
        writeln!(f, "Run / Align mode:   {}", self.mode_button)?;
        writeln!(f, "Power (W):          {}", self.power)?;
        writeln!(f, "Wavelength (nm):    {}", self.wavelength)?;
        writeln!(f, "Motor Pos:          {}", self.motor_position)?;
        writeln!(f, "Pump Beam Shutter:  {}", self.pump_shutter_button)?;
        writeln!(f, "IR Beam Shutter:    {}", self.ir_shutter_button)?;
        writeln!(f, "Mode:               {}", self.mode)?;
        writeln!(f, "Temperature:        {}", self.temperature)?;
        writeln!(f, "Humidity:           {}", self.humidity)?;
        writeln!(f, "Current:            {}", self.current)?;
        write!(f, "History Buffer:     {}", self.history)?;
        if let Some(warning) = &self.warning {
            write!(f, "\nWarning:            {}", warning)?;
        }
        Ok(())
    }
}

/// One complete telemetry read.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    /// Output power (W)
    pub power: f64,
    /// Wavelength (nm)
    pub wavelength: i32,
    /// Tuning motor position
    pub motor_position: f64,
    /// Device mode string
    pub mode: String,
    /// Head temperature
    pub temperature: f64,
    /// Humidity
    pub humidity: f64,
    /// Diode current
    pub current: f64,
    /// Status history as reported
    pub history: String,
}

impl TelemetrySnapshot {
    /// Read every telemetry value, failing on the first error.
    pub async fn read<C: LaserController + ?Sized>(controller: &C) -> PanelResult<Self> {
        Ok(Self {
            power: controller.get_power().await?,
            wavelength: controller.get_wavelength().await?,
            motor_position: controller.get_motor_position().await?,
            mode: controller.get_mode().await?,
            temperature: controller.get_temperature().await?,
            humidity: controller.get_humidity().await?,
            current: controller.get_current().await?,
            history: controller.get_history().await?,
        })
    }
}

/// Status read by one poll, committed only once complete.
#[derive(Debug, Clone, Copy)]
struct StatusReading {
    code: i32,
    pump: ShutterReading,
    ir: ShutterReading,
}

/// Status interpreter and command dispatcher for one laser.
pub struct LaserPanel<C: LaserController + ?Sized> {
    controller: Arc<C>,
    status_code: Option<i32>,
    power: PowerState,
    pump_shutter: ShutterReading,
    ir_shutter: ShutterReading,
    mode: LaserMode,
    history_chars: usize,
    view: PanelView,
}

impl<C: LaserController + ?Sized> LaserPanel<C> {
    /// Create a panel driving `controller`.
    pub fn new(controller: Arc<C>) -> Self {
        Self {
            controller,
            status_code: None,
            power: PowerState::Unknown,
            pump_shutter: ShutterReading::default(),
            ir_shutter: ShutterReading::default(),
            mode: LaserMode::Run,
            history_chars: DEFAULT_HISTORY_CHARS,
            view: PanelView::default(),
        }
    }

    /// Show at most `chars` characters of the history buffer.
    pub fn with_history_chars(mut self, chars: usize) -> Self {
        self.history_chars = chars;
        self
    }

    /// The injected controller.
    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    /// Current rendered view.
    pub fn view(&self) -> &PanelView {
        &self.view
    }

    /// Emission state from the last poll.
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Last reading of `shutter`.
    pub fn shutter(&self, shutter: Shutter) -> ShutterReading {
        match shutter {
            Shutter::Pump => self.pump_shutter,
            Shutter::Ir => self.ir_shutter,
        }
    }

    /// Locally tracked run/align mode.
    pub fn mode(&self) -> LaserMode {
        self.mode
    }

    /// Status code read during the previous poll, without querying the laser.
    pub fn read_status(&self) -> Option<i32> {
        self.status_code
    }

    /// Wavelength currently displayed, without querying the laser.
    pub fn read_wavelength(&self) -> Option<f64> {
        self.view.wavelength.trim().parse().ok()
    }

    // =========================================================================
    // Refresh paths
    // =========================================================================

    /// Poll status code and shutter states, updating toggle states and button faces.
    ///
    /// Nothing is committed unless all three reads succeed.
    #[instrument(skip(self))]
    pub async fn poll_status(&mut self) -> PanelResult<()> {
        let reading = StatusReading {
            code: self.controller.get_status().await?,
            pump: ShutterReading::from_raw(self.controller.shutter_state(Shutter::Pump).await?),
            ir: ShutterReading::from_raw(self.controller.shutter_state(Shutter::Ir).await?),
        };
        self.apply_status(reading);
        Ok(())
    }

    fn apply_status(&mut self, reading: StatusReading) {
        if self.status_code != Some(reading.code) {
            info!(
                status_code = reading.code,
                phase = %LaserPhase::classify(reading.code),
                "Laser status changed"
            );
        }

        self.status_code = Some(reading.code);
        self.power = PowerState::from_status(reading.code);
        if let Some(mode) = LaserMode::from_status(reading.code) {
            self.mode = mode;
        }

        for (shutter, new) in [(Shutter::Pump, reading.pump), (Shutter::Ir, reading.ir)] {
            if new.raw.is_some() && new.state == ShutterState::Unknown {
                warn!(%shutter, raw = ?new.raw, "Controller reported unknown shutter state");
            }
        }
        self.pump_shutter = reading.pump;
        self.ir_shutter = reading.ir;

        self.view.power_button = self.power.face();
        self.view.mode_button = self.mode.button_label();
        self.view.pump_shutter_button = self.pump_shutter.state.face();
        self.view.ir_shutter_button = self.ir_shutter.state.face();
    }

    /// Refresh the status label and the telemetry text fields.
    ///
    /// The status label comes from the last poll. Telemetry is read in full
    /// first; if any read fails the previous values stay on screen.
    #[instrument(skip(self))]
    pub async fn refresh_display(&mut self) -> PanelResult<()> {
        if let Some(code) = self.status_code {
            self.view.status_text = LaserPhase::classify(code).label();
        }

        let snapshot = TelemetrySnapshot::read(&*self.controller).await?;
        self.apply_snapshot(&snapshot);
        Ok(())
    }

    /// Render a telemetry snapshot into the text fields.
    pub fn apply_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        self.view.power = format!("{:.2}", snapshot.power);
        self.view.wavelength = snapshot.wavelength.to_string();
        self.view.motor_position = format!("{:.2}", snapshot.motor_position);
        self.view.mode = snapshot.mode.clone();
        self.view.temperature = format!("{:.2}", snapshot.temperature);
        self.view.humidity = format!("{:.3}", snapshot.humidity);
        self.view.current = format!("{:.2}", snapshot.current);
        self.view.history = snapshot.history.chars().take(self.history_chars).collect();
    }

    // =========================================================================
    // Click handlers
    // =========================================================================

    /// Power button: turn on from ready (25), off from running (50).
    ///
    /// Power-on does not wait for the laser to finish its sequence. Any other
    /// status closes the pump shutter and returns
    /// [`PanelError::UnexpectedPowerState`].
    #[instrument(skip(self), fields(status_code = ?self.status_code))]
    pub async fn toggle_power(&mut self) -> PanelResult<()> {
        match self.status_code {
            Some(STATUS_READY) => {
                info!("Powering laser on");
                self.controller.power_on(false).await?;
                self.view.status_text = LaserPhase::TurningOn.label();
            }
            Some(STATUS_RUNNING) => {
                info!("Powering laser off");
                self.controller.power_off().await?;
            }
            status => {
                warn!(?status, "Power toggle in unexpected state, closing pump shutter");
                self.controller.close_pump_shutter().await?;
                return Err(PanelError::UnexpectedPowerState { status });
            }
        }
        self.view.warning = None;
        Ok(())
    }

    /// Shutter button: open if closed, close if open.
    ///
    /// An unknown state closes the shutter and returns
    /// [`PanelError::UnknownShutterState`].
    #[instrument(skip(self))]
    pub async fn toggle_shutter(&mut self, shutter: Shutter) -> PanelResult<()> {
        let reading = self.shutter(shutter);
        match reading.state {
            ShutterState::Closed => {
                info!(%shutter, "Opening shutter");
                self.controller.open_shutter(shutter).await?;
            }
            ShutterState::Open => {
                info!(%shutter, "Closing shutter");
                self.controller.close_shutter(shutter).await?;
            }
            ShutterState::Unknown => {
                warn!(%shutter, raw = ?reading.raw, "Unknown shutter state, closing shutter");
                self.controller.close_shutter(shutter).await?;
                return Err(PanelError::UnknownShutterState {
                    shutter,
                    value: reading.raw,
                });
            }
        }
        self.view.warning = None;
        Ok(())
    }

    /// Pump shutter button.
    pub async fn toggle_pump_shutter(&mut self) -> PanelResult<()> {
        self.toggle_shutter(Shutter::Pump).await
    }

    /// IR shutter button.
    pub async fn toggle_ir_shutter(&mut self) -> PanelResult<()> {
        self.toggle_shutter(Shutter::Ir).await
    }

    /// Run/align button: switch to the other mode.
    ///
    /// The local mode flips as soon as the controller accepts the command; the
    /// next poll confirms it from the status code.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn toggle_mode(&mut self) -> PanelResult<()> {
        let target = self.mode.toggled();
        match target {
            LaserMode::Align => self.controller.set_mode_align().await?,
            LaserMode::Run => self.controller.set_mode_run().await?,
        }
        info!(mode = %target, "Mode change requested");
        self.mode = target;
        self.view.mode_button = target.button_label();
        self.view.warning = None;
        Ok(())
    }

    // =========================================================================
    // Field editors
    // =========================================================================

    /// Wavelength editor. Returns the value sent to the controller.
    pub async fn update_wavelength(&mut self, input: &str) -> PanelResult<f64> {
        let value = self.parse_input(EditableField::Wavelength, input)?;
        self.controller.set_wavelength(value).await?;
        self.view.wavelength = format!("{:.2}", value);
        self.view.warning = None;
        debug!(wavelength_nm = value, "Wavelength set");
        Ok(value)
    }

    /// Motor position editor. Returns the value sent to the controller.
    pub async fn update_motor_position(&mut self, input: &str) -> PanelResult<f64> {
        let value = self.parse_input(EditableField::MotorPosition, input)?;
        self.controller.set_motor_position(value).await?;
        self.view.motor_position = format!("{:.2}", value);
        self.view.warning = None;
        debug!(motor_position = value, "Motor position set");
        Ok(value)
    }

    fn parse_input(&mut self, field: EditableField, input: &str) -> PanelResult<f64> {
        match input.trim().parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => {
                let err = PanelError::InvalidInput {
                    field,
                    input: input.to_string(),
                };
                warn!(%field, input, "{}", err);
                self.view.warning = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ControllerCall, MockLaserController};

    fn panel() -> LaserPanel<MockLaserController> {
        LaserPanel::new(Arc::new(MockLaserController::ready()))
    }

    #[tokio::test]
    async fn test_initial_state() {
        let panel = panel();
        assert_eq!(panel.read_status(), None);
        assert_eq!(panel.read_wavelength(), None);
        assert_eq!(panel.power_state(), PowerState::Unknown);
        assert_eq!(panel.mode(), LaserMode::Run);
        assert_eq!(panel.view().status_text, "");
    }

    #[tokio::test]
    async fn test_poll_updates_faces() {
        let mut panel = panel();
        panel.poll_status().await.unwrap();
        assert_eq!(panel.read_status(), Some(25));
        assert_eq!(panel.view().power_button.text, "OFF");
        assert_eq!(panel.view().pump_shutter_button.text, "CLOSED");

        panel.controller().open_pump_shutter().await.unwrap();
        panel.controller().power_on(false).await.unwrap();
        panel.poll_status().await.unwrap();
        assert_eq!(panel.view().power_button.text, "ON");
        assert_eq!(panel.view().pump_shutter_button.text, "OPEN");
        assert_eq!(panel.view().ir_shutter_button.text, "CLOSED");
    }

    #[tokio::test]
    async fn test_refresh_formats_telemetry() {
        let mut panel = panel();
        panel.poll_status().await.unwrap();
        panel.refresh_display().await.unwrap();

        let view = panel.view();
        assert_eq!(view.status_text, "Ready to turn on");
        assert_eq!(view.power, "0.00");
        assert_eq!(view.wavelength, "800");
        assert_eq!(view.motor_position, "12.50");
        assert_eq!(view.temperature, "22.50");
        assert_eq!(view.humidity, "3.200");
        assert_eq!(view.current, "0.00");
        assert_eq!(view.mode, "STANDBY");
        assert_eq!(panel.read_wavelength(), Some(800.0));
    }

    #[test]
    fn test_history_truncated() {
        let mut panel = panel().with_history_chars(8);
        panel.apply_snapshot(&TelemetrySnapshot {
            power: 1.234,
            wavelength: 920,
            motor_position: 0.0,
            mode: "RUN".to_string(),
            temperature: 0.0,
            humidity: 0.0,
            current: 0.0,
            history: "050 049 048 047 ".to_string(),
        });
        assert_eq!(panel.view().history, "050 049 ");
        assert_eq!(panel.view().power, "1.23");
    }

    #[tokio::test]
    async fn test_power_on_sets_turning_on_text() {
        let mut panel = panel();
        panel.poll_status().await.unwrap();
        panel.toggle_power().await.unwrap();
        assert_eq!(panel.view().status_text, "Turning on...");
        assert_eq!(
            panel.controller().calls().await,
            vec![ControllerCall::PowerOn { blocking: false }]
        );
    }

    #[tokio::test]
    async fn test_toggle_before_first_poll_fails_safe() {
        let mut panel = panel();

        let err = panel.toggle_power().await.unwrap_err();
        assert!(matches!(err, PanelError::UnexpectedPowerState { status: None }));

        let err = panel.toggle_ir_shutter().await.unwrap_err();
        assert!(matches!(
            err,
            PanelError::UnknownShutterState {
                shutter: Shutter::Ir,
                value: None
            }
        ));

        assert_eq!(
            panel.controller().calls().await,
            vec![ControllerCall::ClosePumpShutter, ControllerCall::CloseIrShutter]
        );
    }

    #[tokio::test]
    async fn test_mode_toggle_failure_keeps_mode() {
        let mut panel = panel();
        panel.poll_status().await.unwrap();
        // laser is only ready, not running: the mock refuses alignment mode
        assert!(panel.toggle_mode().await.is_err());
        assert_eq!(panel.mode(), LaserMode::Run);
        assert_eq!(panel.view().mode_button, LaserMode::Run.button_label());
    }

    #[tokio::test]
    async fn test_successful_action_clears_warning() {
        let mut panel = panel();
        assert!(panel.update_motor_position("x").await.is_err());
        assert!(panel.view().warning.is_some());

        panel.update_motor_position(" 3.14159 ").await.unwrap();
        assert!(panel.view().warning.is_none());
        assert_eq!(panel.view().motor_position, "3.14");
    }

    #[test]
    fn test_view_display() {
        let text = PanelView::default().to_string();
        assert!(text.contains("Laser On/Off:       (x) OFF"));
        assert!(text.contains("Pump Beam Shutter:  (!) UNKNOWN"));
        assert!(!text.contains("Warning"));
    }
}
