//! Event loop driving a [`LaserPanel`].
//!
//! One task owns the panel and multiplexes three event sources:
//!
//! - the status interval (default 1 s): [`LaserPanel::poll_status`]
//! - the display interval (default 0.5 s): [`LaserPanel::refresh_display`]
//! - the action queue: clicks and edits from whatever hosts the panel
//!
//! The two intervals are independent; a failure on one path is logged and
//! does not affect the other. After every event the view is published on a
//! `watch` channel if it changed.
//!
//! Without `call_timeout` a controller call that never returns stalls the loop.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::PollingConfig;
use crate::controller::LaserController;
use crate::error::{PanelError, PanelResult};
use crate::panel::{LaserPanel, PanelView};

/// Capacity of the action queue.
pub const ACTION_QUEUE_CAPACITY: usize = 16;

/// User action forwarded to the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    /// Power on/off button
    TogglePower,
    /// Pump shutter button
    TogglePumpShutter,
    /// IR shutter button
    ToggleIrShutter,
    /// Run/align button
    ToggleMode,
    /// Wavelength editor, raw text
    SetWavelength(String),
    /// Motor position editor, raw text
    SetMotorPosition(String),
}

impl std::fmt::Display for PanelAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelAction::TogglePower => f.write_str("power"),
            PanelAction::TogglePumpShutter => f.write_str("pump"),
            PanelAction::ToggleIrShutter => f.write_str("ir"),
            PanelAction::ToggleMode => f.write_str("mode"),
            PanelAction::SetWavelength(text) => write!(f, "wl {}", text),
            PanelAction::SetMotorPosition(text) => write!(f, "mtr {}", text),
        }
    }
}

impl FromStr for PanelAction {
    type Err = String;

    /// Parse a text command: `power`, `pump`, `ir`, `mode`, `wl <nm>`, `mtr <pos>`.
    ///
    /// Editor arguments are passed through unparsed; the panel validates them.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match (command.to_lowercase().as_str(), arg) {
            ("power", "") => Ok(PanelAction::TogglePower),
            ("pump", "") => Ok(PanelAction::TogglePumpShutter),
            ("ir", "") => Ok(PanelAction::ToggleIrShutter),
            ("mode", "") => Ok(PanelAction::ToggleMode),
            ("wl" | "wavelength", arg) if !arg.is_empty() => {
                Ok(PanelAction::SetWavelength(arg.to_string()))
            }
            ("mtr" | "motor", arg) if !arg.is_empty() => {
                Ok(PanelAction::SetMotorPosition(arg.to_string()))
            }
            _ => Err(format!(
                "Unknown command '{}'. Expected one of: power, pump, ir, mode, wl <nm>, mtr <pos>",
                line
            )),
        }
    }
}

/// Await `fut`, bounded by `limit` if set.
async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> PanelResult<T>
where
    F: Future<Output = PanelResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| PanelError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Owns a panel and runs its refresh cadences.
pub struct PanelRunner<C: LaserController + ?Sized> {
    panel: LaserPanel<C>,
    status_interval: Duration,
    display_interval: Duration,
    call_timeout: Option<Duration>,
}

impl<C: LaserController + ?Sized> PanelRunner<C> {
    /// Wrap `panel` with the cadences from `polling`.
    pub fn new(panel: LaserPanel<C>, polling: &PollingConfig) -> Self {
        Self {
            panel,
            status_interval: polling.status_interval(),
            display_interval: polling.display_interval(),
            call_timeout: polling.call_timeout(),
        }
    }

    /// Run until the action sender is dropped, then hand the panel back.
    pub async fn run(
        mut self,
        mut actions: mpsc::Receiver<PanelAction>,
        view_tx: watch::Sender<PanelView>,
    ) -> LaserPanel<C> {
        info!(
            status_interval = ?self.status_interval,
            display_interval = ?self.display_interval,
            call_timeout = ?self.call_timeout,
            "Laser panel started"
        );

        // Populate the view once before the first interval elapses.
        self.poll_status().await;
        self.refresh_display().await;
        publish(&view_tx, self.panel.view());

        let start = Instant::now();
        let mut status_tick = interval_at(start + self.status_interval, self.status_interval);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut display_tick = interval_at(start + self.display_interval, self.display_interval);
        display_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = status_tick.tick() => self.poll_status().await,
                _ = display_tick.tick() => self.refresh_display().await,
                action = actions.recv() => match action {
                    Some(action) => self.dispatch(action).await,
                    None => break,
                },
            }
            publish(&view_tx, self.panel.view());
        }

        info!("Laser panel stopped");
        self.panel
    }

    async fn poll_status(&mut self) {
        if let Err(e) = bounded(self.call_timeout, self.panel.poll_status()).await {
            warn!(error = %e, "Status poll failed, keeping previous state");
        }
    }

    async fn refresh_display(&mut self) {
        if let Err(e) = bounded(self.call_timeout, self.panel.refresh_display()).await {
            warn!(error = %e, "Error updating display status, keeping previous values");
        }
    }

    /// Handle one action. Errors end the action, never the loop.
    pub async fn dispatch(&mut self, action: PanelAction) {
        let limit = self.call_timeout;
        let result = match &action {
            PanelAction::TogglePower => bounded(limit, self.panel.toggle_power()).await,
            PanelAction::TogglePumpShutter => {
                bounded(limit, self.panel.toggle_pump_shutter()).await
            }
            PanelAction::ToggleIrShutter => bounded(limit, self.panel.toggle_ir_shutter()).await,
            PanelAction::ToggleMode => bounded(limit, self.panel.toggle_mode()).await,
            PanelAction::SetWavelength(text) => {
                bounded(limit, self.panel.update_wavelength(text)).await.map(|_| ())
            }
            PanelAction::SetMotorPosition(text) => {
                bounded(limit, self.panel.update_motor_position(text))
                    .await
                    .map(|_| ())
            }
        };

        match result {
            Ok(()) => {}
            // already surfaced as a panel warning
            Err(e) if e.is_input_error() => {}
            Err(e) if e.is_device_fault() => {
                error!(%action, error = %e, "Device fault, action aborted after fail-safe close");
            }
            Err(e) => error!(%action, error = %e, "Action failed"),
        }
    }
}

fn publish(view_tx: &watch::Sender<PanelView>, view: &PanelView) {
    view_tx.send_if_modified(|current| {
        if current != view {
            *current = view.clone();
            true
        } else {
            false
        }
    });
}

/// Handle to a panel running on its own task.
pub struct PanelHandle<C: LaserController + ?Sized + 'static> {
    actions: mpsc::Sender<PanelAction>,
    view: watch::Receiver<PanelView>,
    task: JoinHandle<LaserPanel<C>>,
}

impl<C: LaserController + ?Sized + 'static> PanelHandle<C> {
    /// Spawn a runner for `controller` on the current tokio runtime.
    pub fn spawn(controller: Arc<C>, polling: &PollingConfig, history_chars: usize) -> Self {
        let panel = LaserPanel::new(controller).with_history_chars(history_chars);
        let (actions, action_rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);
        let (view_tx, view) = watch::channel(panel.view().clone());
        let runner = PanelRunner::new(panel, polling);
        let task = tokio::spawn(runner.run(action_rx, view_tx));
        Self {
            actions,
            view,
            task,
        }
    }

    /// Queue an action.
    ///
    /// Fails only if the runner has stopped; the action is handed back in the error.
    pub async fn send(&self, action: PanelAction) -> Result<(), SendError<PanelAction>> {
        self.actions.send(action).await
    }

    /// Receiver for published views.
    pub fn subscribe(&self) -> watch::Receiver<PanelView> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> PanelView {
        self.view.borrow().clone()
    }

    /// Close the action queue and wait for the runner to return the panel.
    pub async fn shutdown(self) -> Result<LaserPanel<C>, tokio::task::JoinError> {
        drop(self.actions);
        self.task.await
    }
}
