// Fret Trainer Core - guitar practice engine
// Microphone pitch detection matched against a score in real time

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;
pub mod practice;
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{PitchUpdate, PracticeService, TickOutcome};
pub use error::{AudioError, ErrorCode, PracticeError, ServiceError};
pub use practice::{ExternalRef, ResultEvent, ScoreCollaborator, ScoreNote, SessionSummary};
