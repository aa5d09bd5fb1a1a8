//! Error types for the laser control panel.
//!
//! `PanelError` separates the three ways a panel operation can fail:
//!
//! - **Controller failures** (`Controller`, `Timeout`): a read or command did not
//!   go through. During polling these are logged and the previous display is
//!   kept; the next tick tries again.
//! - **Invalid device state** (`UnknownShutterState`, `UnexpectedPowerState`): a
//!   toggle found the device in a state it has no safe inverse for. The fail-safe
//!   close has already been issued when these are returned.
//! - **User input** (`InvalidInput`): an editor received text that is not a
//!   number. Nothing was sent to the device.
//!
//! Configuration problems are reported as `Config` / `Configuration`.

use std::time::Duration;
use thiserror::Error;

use crate::controls::Shutter;

/// Convenience alias for results using the panel error type.
pub type PanelResult<T> = std::result::Result<T, PanelError>;

/// Editable numeric fields on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableField {
    /// Wavelength editor.
    Wavelength,
    /// Motor position editor.
    MotorPosition,
}

impl std::fmt::Display for EditableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditableField::Wavelength => f.write_str("wavelength"),
            EditableField::MotorPosition => f.write_str("motor position"),
        }
    }
}

fn raw_value(value: &Option<i32>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "not read".to_string(),
    }
}

/// Primary error type for panel operations.
#[derive(Error, Debug)]
pub enum PanelError {
    /// The controller returned an error.
    #[error("Controller error: {0:#}")]
    Controller(#[from] anyhow::Error),

    /// A controller call did not complete in time.
    #[error("Controller call timed out after {0:?}")]
    Timeout(Duration),

    /// A shutter toggle found the shutter in neither the open nor closed state.
    #[error("Unknown {shutter} shutter status ({}).", raw_value(.value))]
    UnknownShutterState {
        /// Affected shutter.
        shutter: Shutter,
        /// Raw reading, `None` if never read.
        value: Option<i32>,
    },

    /// The power toggle was clicked while the laser was neither ready nor running.
    #[error("Unexpected laser status for power toggle ({}).", raw_value(.status))]
    UnexpectedPowerState {
        /// Last status code, `None` if never read.
        status: Option<i32>,
    },

    /// Non-numeric text in an editable field.
    #[error("Invalid {field} value '{input}'. Please enter a numeric value.")]
    InvalidInput {
        /// Field being edited.
        field: EditableField,
        /// Text as entered.
        input: String,
    },

    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl PanelError {
    /// Invalid device state: fault signals that end the triggering action.
    pub fn is_device_fault(&self) -> bool {
        matches!(
            self,
            PanelError::UnknownShutterState { .. } | PanelError::UnexpectedPowerState { .. }
        )
    }

    /// Recoverable user-input error.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PanelError::InvalidInput { .. })
    }
}

impl From<figment::Error> for PanelError {
    fn from(err: figment::Error) -> Self {
        PanelError::Config(Box::new(err))
    }
}
