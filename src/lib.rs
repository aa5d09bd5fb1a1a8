//! # Laser Panel
//!
//! Control-panel core for Spectra-Physics lasers. The panel polls a laser
//! controller for status and telemetry, turns the raw values into something a
//! human can read, and maps button clicks and field edits back to controller
//! commands.
//!
//! ## Crate Structure
//!
//! - **`status`**: pure status-code classifier (`0..=127` to lifecycle phase).
//! - **`controls`**: tagged toggle states (power, shutters, run/align mode) and
//!   the button faces they drive.
//! - **`controller`**: the `LaserController` trait the panel is built against.
//! - **`panel`**: `LaserPanel`, the status interpreter and command dispatcher.
//! - **`runner`**: the event loop with the two polling cadences and the action queue.
//! - **`mock`**: a simulated controller for tests and the `simulate` host.
//! - **`config`**: Figment-based configuration.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: the `PanelError` enum.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use laser_panel::{LaserPanel, MockLaserController};
//!
//! # async fn demo() -> Result<(), laser_panel::PanelError> {
//! let mut panel = LaserPanel::new(Arc::new(MockLaserController::ready()));
//! panel.poll_status().await?;
//! panel.refresh_display().await?;
//! panel.toggle_power().await?;
//! println!("{}", panel.view());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod controls;
pub mod error;
pub mod logging;
pub mod mock;
pub mod panel;
pub mod runner;
pub mod status;

pub use controller::LaserController;
pub use controls::{LaserMode, PowerState, Shutter, ShutterState};
pub use error::{PanelError, PanelResult};
pub use mock::MockLaserController;
pub use panel::{LaserPanel, PanelView, TelemetrySnapshot};
pub use runner::{PanelAction, PanelHandle, PanelRunner};
pub use status::LaserPhase;
