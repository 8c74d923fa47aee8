// Audio module - microphone capture, conditioning and signal history

pub mod buffer_pool;
pub mod capture;
pub mod filter;
pub mod ring_buffer;

// Re-export commonly used types for convenience
pub use buffer_pool::{AudioBuffer, BufferPool, BufferPoolChannels};
pub use capture::{rms_db, AnalysisWindow, AudioCapture, SILENCE_DB};
pub use filter::{Biquad, FilterChain, FilterKind};
pub use ring_buffer::RingBuffer;
