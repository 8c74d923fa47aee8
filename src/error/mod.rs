// Error types for the fret trainer
//
// This module defines custom error types for audio capture and practice
// operations, providing structured error handling with numeric error codes
// suitable for reporting across the UI boundary.

mod audio;
mod practice;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use practice::{log_practice_error, PracticeError, PracticeErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the UI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Failure of a practice service operation
///
/// Wraps the error of whichever layer refused the request so callers can
/// still read a single numeric code.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    Audio(AudioError),
    Practice(PracticeError),
}

impl ErrorCode for ServiceError {
    fn code(&self) -> i32 {
        match self {
            ServiceError::Audio(err) => err.code(),
            ServiceError::Practice(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            ServiceError::Audio(err) => err.message(),
            ServiceError::Practice(err) => err.message(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Audio(err) => err.fmt(f),
            ServiceError::Practice(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Audio(err) => Some(err),
            ServiceError::Practice(err) => Some(err),
        }
    }
}

impl From<AudioError> for ServiceError {
    fn from(err: AudioError) -> Self {
        ServiceError::Audio(err)
    }
}

impl From<PracticeError> for ServiceError {
    fn from(err: PracticeError) -> Self {
        ServiceError::Practice(err)
    }
}
