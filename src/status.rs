//! Laser status-code classification.
//!
//! The laser reports its lifecycle as a single integer in `0..=127`. Each
//! disjoint range maps to one phase:
//!
//! | Code     | Phase                               |
//! |----------|-------------------------------------|
//! | 0-24     | Initializing (not ready to turn on) |
//! | 25       | Ready to turn on                    |
//! | 26-49    | Turning on                          |
//! | 50       | Running                             |
//! | 51-59    | Entering alignment mode             |
//! | 60       | Alignment mode                      |
//! | 61-69    | Exiting alignment mode              |
//! | 70-127   | Reserved                            |
//!
//! Anything outside `0..=127` is an invalid code. Classification is pure and
//! total over `i32`.

use std::fmt;

/// Status code reported when the laser is warmed up and may be switched on.
pub const STATUS_READY: i32 = 25;

/// Status code reported while the laser runs in normal mode.
pub const STATUS_RUNNING: i32 = 50;

/// Status code reported while the laser runs in alignment mode.
pub const STATUS_ALIGNMENT: i32 = 60;

/// Highest status code the laser may legitimately report.
pub const STATUS_MAX: i32 = 127;

/// Lifecycle phase derived from a raw status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaserPhase {
    /// 0-24: warming up, not ready to turn on.
    Initializing,
    /// 25: ready to turn on.
    Ready,
    /// 26-49: power-on sequence in progress.
    TurningOn,
    /// 50: running mode.
    Running,
    /// 51-59: transitioning into alignment mode.
    EnteringAlignment,
    /// 60: alignment mode.
    Alignment,
    /// 61-69: transitioning out of alignment mode.
    ExitingAlignment,
    /// 70-127: defined by the device but without an assigned meaning.
    Reserved(i32),
    /// Outside `0..=127`.
    Invalid(i32),
}

impl LaserPhase {
    /// Classify a raw status code.
    pub fn classify(code: i32) -> Self {
        match code {
            0..=24 => Self::Initializing,
            STATUS_READY => Self::Ready,
            26..=49 => Self::TurningOn,
            STATUS_RUNNING => Self::Running,
            51..=59 => Self::EnteringAlignment,
            STATUS_ALIGNMENT => Self::Alignment,
            61..=69 => Self::ExitingAlignment,
            70..=STATUS_MAX => Self::Reserved(code),
            _ => Self::Invalid(code),
        }
    }

    /// Whether emission is on (running or aligning).
    pub fn is_emitting(&self) -> bool {
        matches!(self, Self::Running | Self::Alignment)
    }

    /// Human-readable label shown in the status field.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LaserPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => f.write_str("Initializing... (not ready to turn on)"),
            Self::Ready => f.write_str("Ready to turn on"),
            Self::TurningOn => f.write_str("Turning on..."),
            Self::Running => f.write_str("Running mode"),
            Self::EnteringAlignment => f.write_str("Initializing alignment mode..."),
            Self::Alignment => f.write_str("Alignment mode"),
            Self::ExitingAlignment => f.write_str("Exiting alignment mode..."),
            Self::Reserved(code) => write!(f, "Reserved status code {}", code),
            Self::Invalid(code) => write!(f, "Invalid status code {}", code),
        }
    }
}

/// Shorthand for `LaserPhase::classify(code).label()`.
pub fn describe(code: i32) -> String {
    LaserPhase::classify(code).label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_labels() {
        let cases: &[(std::ops::RangeInclusive<i32>, &str)] = &[
            (0..=24, "Initializing... (not ready to turn on)"),
            (25..=25, "Ready to turn on"),
            (26..=49, "Turning on..."),
            (50..=50, "Running mode"),
            (51..=59, "Initializing alignment mode..."),
            (60..=60, "Alignment mode"),
            (61..=69, "Exiting alignment mode..."),
        ];

        for (range, expected) in cases {
            for code in range.clone() {
                assert_eq!(describe(code), *expected, "code {}", code);
            }
        }
    }

    #[test]
    fn test_reserved_codes_embed_value() {
        for code in 70..=127 {
            assert_eq!(describe(code), format!("Reserved status code {}", code));
        }
    }

    #[test]
    fn test_invalid_codes_embed_value() {
        assert_eq!(describe(-1), "Invalid status code -1");
        assert_eq!(describe(128), "Invalid status code 128");
        assert_eq!(describe(200), "Invalid status code 200");
        assert_eq!(
            describe(i32::MIN),
            format!("Invalid status code {}", i32::MIN)
        );
    }

    #[test]
    fn test_domain_is_partitioned() {
        // Every code in the declared domain lands in exactly one non-invalid phase,
        // and the phase changes only at the documented boundaries.
        let mut boundaries = Vec::new();
        let mut previous = LaserPhase::classify(0);
        for code in 0..=STATUS_MAX {
            let phase = LaserPhase::classify(code);
            assert!(!matches!(phase, LaserPhase::Invalid(_)), "gap at {}", code);
            let same_kind = std::mem::discriminant(&phase) == std::mem::discriminant(&previous);
            if !same_kind {
                boundaries.push(code);
            }
            previous = phase;
        }
        assert_eq!(boundaries, vec![25, 26, 50, 51, 60, 61, 70]);
    }

    #[test]
    fn test_emitting_phases() {
        assert!(LaserPhase::classify(STATUS_RUNNING).is_emitting());
        assert!(LaserPhase::classify(STATUS_ALIGNMENT).is_emitting());
        assert!(!LaserPhase::classify(STATUS_READY).is_emitting());
        assert!(!LaserPhase::classify(40).is_emitting());
    }
}
