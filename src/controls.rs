//! Toggle states mirrored from the controller and the button faces they drive.
//!
//! Each control keeps the last value read from the device as a tagged state.
//! A click issues the command that inverts that state; the state itself only
//! changes on the next poll.

use crate::status::LaserPhase;
use std::fmt;

/// Button text for an emitting laser.
pub const TEXT_ON: &str = "ON";
/// Button text for a laser that is not emitting.
pub const TEXT_OFF: &str = "OFF";
/// Button text for an open shutter.
pub const TEXT_OPEN: &str = "OPEN";
/// Button text for a closed shutter.
pub const TEXT_CLOSED: &str = "CLOSED";
/// Button text for a shutter whose position is not known.
pub const TEXT_UNKNOWN: &str = "UNKNOWN";

/// Beam shutters on the laser head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shutter {
    /// Pump beam shutter.
    Pump,
    /// IR (tunable) beam shutter.
    Ir,
}

impl fmt::Display for Shutter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shutter::Pump => f.write_str("pump"),
            Shutter::Ir => f.write_str("IR"),
        }
    }
}

/// Indicator drawn next to a toggle button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Beam can pass / emission on.
    Open,
    /// Beam blocked / emission off.
    Closed,
    /// Device reported a value outside the expected domain.
    Fault,
}

/// Text and indicator of a toggle button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonFace {
    /// Button caption.
    pub text: &'static str,
    /// Indicator icon.
    pub indicator: Indicator,
}

impl ButtonFace {
    const fn new(text: &'static str, indicator: Indicator) -> Self {
        Self { text, indicator }
    }
}

impl fmt::Display for ButtonFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.indicator {
            Indicator::Open => "(o)",
            Indicator::Closed => "(x)",
            Indicator::Fault => "(!)",
        };
        write!(f, "{} {}", mark, self.text)
    }
}

/// Shutter position as last reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutterState {
    /// Not read yet, or reported as something other than 0/1.
    #[default]
    Unknown,
    /// Reported 0.
    Closed,
    /// Reported 1.
    Open,
}

impl ShutterState {
    /// Map the controller's raw reading (0 = closed, 1 = open).
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Closed,
            1 => Self::Open,
            _ => Self::Unknown,
        }
    }

    /// Button face for this state.
    pub fn face(&self) -> ButtonFace {
        match self {
            Self::Closed => ButtonFace::new(TEXT_CLOSED, Indicator::Closed),
            Self::Open => ButtonFace::new(TEXT_OPEN, Indicator::Open),
            Self::Unknown => ButtonFace::new(TEXT_UNKNOWN, Indicator::Fault),
        }
    }
}

/// Last shutter reading, keeping the raw value for fault reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutterReading {
    /// Decoded state.
    pub state: ShutterState,
    /// Raw value, `None` until the first successful poll.
    pub raw: Option<i32>,
}

impl ShutterReading {
    /// Decode a raw controller reading.
    pub fn from_raw(raw: i32) -> Self {
        Self {
            state: ShutterState::from_raw(raw),
            raw: Some(raw),
        }
    }
}

/// Emission state derived from the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// No status read yet.
    #[default]
    Unknown,
    /// Any status other than running/alignment.
    Off,
    /// Status 50 or 60.
    On,
}

impl PowerState {
    /// Derive the emission state from a status code.
    pub fn from_status(code: i32) -> Self {
        if LaserPhase::classify(code).is_emitting() {
            Self::On
        } else {
            Self::Off
        }
    }

    /// Button face for this state. An unknown state shows as off.
    pub fn face(&self) -> ButtonFace {
        match self {
            Self::On => ButtonFace::new(TEXT_ON, Indicator::Open),
            Self::Off | Self::Unknown => ButtonFace::new(TEXT_OFF, Indicator::Closed),
        }
    }
}

/// Operating mode tracked by the run/align toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaserMode {
    /// Normal running mode (status 50).
    #[default]
    Run,
    /// Alignment mode (status 60).
    Align,
}

impl LaserMode {
    /// Mode confirmed by a status code, if the code pins one down.
    pub fn from_status(code: i32) -> Option<Self> {
        match LaserPhase::classify(code) {
            LaserPhase::Running => Some(Self::Run),
            LaserPhase::Alignment => Some(Self::Align),
            _ => None,
        }
    }

    /// The mode a click switches to.
    pub fn toggled(&self) -> Self {
        match self {
            Self::Run => Self::Align,
            Self::Align => Self::Run,
        }
    }

    /// Mode button caption: the current mode and the one a click switches to.
    pub fn button_label(&self) -> &'static str {
        match self {
            Self::Run => "Running mode (press to switch to Alignment)",
            Self::Align => "Alignment mode (press to switch to Run)",
        }
    }
}

impl fmt::Display for LaserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => f.write_str("Run"),
            Self::Align => f.write_str("Align"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutter_from_raw() {
        assert_eq!(ShutterState::from_raw(0), ShutterState::Closed);
        assert_eq!(ShutterState::from_raw(1), ShutterState::Open);
        assert_eq!(ShutterState::from_raw(2), ShutterState::Unknown);
        assert_eq!(ShutterState::from_raw(-1), ShutterState::Unknown);

        let reading = ShutterReading::from_raw(2);
        assert_eq!(reading.raw, Some(2));
        assert_eq!(ShutterReading::default().raw, None);
    }

    #[test]
    fn test_faces() {
        assert_eq!(ShutterState::Open.face().text, TEXT_OPEN);
        assert_eq!(ShutterState::Closed.face().indicator, Indicator::Closed);
        assert_eq!(ShutterState::Unknown.face().indicator, Indicator::Fault);
        assert_eq!(PowerState::On.face().text, TEXT_ON);
        assert_eq!(PowerState::Unknown.face().text, TEXT_OFF);
    }

    #[test]
    fn test_power_from_status() {
        assert_eq!(PowerState::from_status(50), PowerState::On);
        assert_eq!(PowerState::from_status(60), PowerState::On);
        assert_eq!(PowerState::from_status(25), PowerState::Off);
        assert_eq!(PowerState::from_status(55), PowerState::Off);
    }

    #[test]
    fn test_mode_label_names_next_target() {
        assert!(LaserMode::Run.button_label().ends_with("switch to Alignment)"));
        assert!(LaserMode::Align.button_label().ends_with("switch to Run)"));
        assert_eq!(LaserMode::Run.toggled(), LaserMode::Align);
        assert_eq!(LaserMode::Align.toggled(), LaserMode::Run);
    }

    #[test]
    fn test_mode_from_status() {
        assert_eq!(LaserMode::from_status(50), Some(LaserMode::Run));
        assert_eq!(LaserMode::from_status(60), Some(LaserMode::Align));
        assert_eq!(LaserMode::from_status(55), None);
    }
}
