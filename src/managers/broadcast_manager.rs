// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

use crate::engine::PitchUpdate;
use crate::practice::ResultEvent;

/// Per-frame pitch updates; ~2 seconds of frames at a 16 ms tick
const PITCH_CAPACITY: usize = 128;
/// Hit/miss results; a dense beat produces at most a handful per tick
const RESULT_CAPACITY: usize = 100;

type Slot<T> = Arc<Mutex<Option<broadcast::Sender<T>>>>;

fn lock<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<broadcast::Sender<T>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Manages the UI-facing broadcast channels
///
/// # Channel Types
/// - Pitch: stabilized notes and input level for every analyzed frame
/// - Results: Hit and Miss events for expected score notes
///
/// Channels must be initialized before subscribers can attach. Publishing
/// with no subscribers is not an error; the update is simply dropped.
pub struct BroadcastChannelManager {
    pitch: Slot<PitchUpdate>,
    results: Slot<ResultEvent>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    pub fn new() -> Self {
        Self {
            pitch: Arc::new(Mutex::new(None)),
            results: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // PITCH CHANNEL
    // ========================================================================

    /// Initialize the pitch channel, replacing any previous sender
    ///
    /// Slow subscribers lag and lose the oldest frames rather than blocking
    /// the tick.
    pub fn init_pitch(&self) -> broadcast::Sender<PitchUpdate> {
        let (tx, _) = broadcast::channel(PITCH_CAPACITY);
        *lock(&self.pitch) = Some(tx.clone());
        tx
    }

    /// Subscribe to pitch updates, or None if the channel is not initialized
    pub fn subscribe_pitch(&self) -> Option<broadcast::Receiver<PitchUpdate>> {
        lock(&self.pitch).as_ref().map(|tx| tx.subscribe())
    }

    /// Returns the number of subscribers that received the update
    pub fn publish_pitch(&self, update: PitchUpdate) -> usize {
        lock(&self.pitch)
            .as_ref()
            .and_then(|tx| tx.send(update).ok())
            .unwrap_or(0)
    }

    // ========================================================================
    // RESULT CHANNEL
    // ========================================================================

    /// Initialize the result channel, replacing any previous sender
    pub fn init_results(&self) -> broadcast::Sender<ResultEvent> {
        let (tx, _) = broadcast::channel(RESULT_CAPACITY);
        *lock(&self.results) = Some(tx.clone());
        tx
    }

    /// Subscribe to hit/miss results, or None if the channel is not initialized
    pub fn subscribe_results(&self) -> Option<broadcast::Receiver<ResultEvent>> {
        lock(&self.results).as_ref().map(|tx| tx.subscribe())
    }

    /// Returns the number of subscribers that received the event
    pub fn publish_result(&self, event: ResultEvent) -> usize {
        lock(&self.results)
            .as_ref()
            .and_then(|tx| tx.send(event).ok())
            .unwrap_or(0)
    }

    /// Drop both senders so subscribers observe a closed channel
    pub fn close(&self) {
        lock(&self.pitch).take();
        lock(&self.results).take();
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
