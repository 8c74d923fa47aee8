// Practice session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Practice error code constants
///
/// Error code range: 2001-2004
pub struct PracticeErrorCodes {}

impl PracticeErrorCodes {
    /// No score collaborator attached yet
    pub const SCORE_NOT_ATTACHED: i32 = 2001;

    /// Score collaborator could not report its state
    pub const SCORE_UNAVAILABLE: i32 = 2002;

    /// Configuration rejected by validation
    pub const INVALID_CONFIG: i32 = 2003;

    /// Score note carries values outside the instrument model
    pub const INVALID_NOTE: i32 = 2004;
}

/// Log a practice error with structured context
pub fn log_practice_error(err: &PracticeError, context: &str) {
    error!(
        "Practice error in {}: code={}, component=PracticeEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Practice-related errors
///
/// Raised by score collaborators and configuration validation. The match
/// engine never propagates these out of a tick: they are logged and the
/// tick is skipped.
///
/// Error code ranges: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeError {
    /// No score collaborator attached to the service
    ScoreNotAttached,

    /// Score collaborator failed to report position or accept a cursor move
    ScoreUnavailable { reason: String },

    /// Configuration value out of range
    InvalidConfig { field: String, reason: String },

    /// Score note could not be interpreted
    InvalidNote { note_id: u64, reason: String },
}

impl ErrorCode for PracticeError {
    fn code(&self) -> i32 {
        match self {
            PracticeError::ScoreNotAttached => PracticeErrorCodes::SCORE_NOT_ATTACHED,
            PracticeError::ScoreUnavailable { .. } => PracticeErrorCodes::SCORE_UNAVAILABLE,
            PracticeError::InvalidConfig { .. } => PracticeErrorCodes::INVALID_CONFIG,
            PracticeError::InvalidNote { .. } => PracticeErrorCodes::INVALID_NOTE,
        }
    }

    fn message(&self) -> String {
        match self {
            PracticeError::ScoreNotAttached => {
                "No score attached. Call attach_score() first.".to_string()
            }
            PracticeError::ScoreUnavailable { reason } => {
                format!("Score state unavailable: {}", reason)
            }
            PracticeError::InvalidConfig { field, reason } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            PracticeError::InvalidNote { note_id, reason } => {
                format!("Invalid score note {}: {}", note_id, reason)
            }
        }
    }
}

impl fmt::Display for PracticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PracticeError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PracticeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_practice_error_codes() {
        assert_eq!(
            PracticeError::ScoreNotAttached.code(),
            PracticeErrorCodes::SCORE_NOT_ATTACHED
        );
        assert_eq!(
            PracticeError::ScoreUnavailable {
                reason: "x".to_string()
            }
            .code(),
            PracticeErrorCodes::SCORE_UNAVAILABLE
        );
        assert_eq!(
            PracticeError::InvalidConfig {
                field: "a".to_string(),
                reason: "b".to_string()
            }
            .code(),
            PracticeErrorCodes::INVALID_CONFIG
        );
        assert_eq!(
            PracticeError::InvalidNote {
                note_id: 3,
                reason: "c".to_string()
            }
            .code(),
            PracticeErrorCodes::INVALID_NOTE
        );
    }

    #[test]
    fn test_practice_error_display() {
        let err = PracticeError::InvalidConfig {
            field: "stabilizer.decay_frames".to_string(),
            reason: "must be greater than 0".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("PracticeError"));
        assert!(display.contains("2003"));
        assert!(display.contains("stabilizer.decay_frames"));
    }
}
