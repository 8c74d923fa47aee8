//! Engine module housing capture backends and the practice service.
//!
//! `backend` abstracts the microphone behind a trait so the service can run
//! on cpal or on a scripted stub; `service` owns one practice session.

pub mod backend;
pub mod service;

pub use backend::{
    list_input_devices, CaptureBackend, CpalBackend, StubBackend, StubHandle, StubTimeSource,
    SystemTimeSource, TimeSource,
};
pub use service::{PitchUpdate, PracticeService, TickOutcome};
