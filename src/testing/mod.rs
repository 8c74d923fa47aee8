//! Testability harness utilities.
//!
//! Deterministic signal synthesis, WAV loading and a simulated score, shared
//! by the unit tests, the integration tests and the `fret_cli` tool so all of
//! them exercise the pipeline without live audio or a real score engine.

pub mod score;
pub mod synth;
pub mod wav;

pub use score::{score_note, SimulatedScore, STANDARD_TUNING};
