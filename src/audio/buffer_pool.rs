// BufferPool - lock-free block recycling between the audio callback and the frame tick
//
// Two SPSC (Single Producer Single Consumer) ring buffers carry pre-allocated
// sample blocks so the audio callback never allocates:
// - DATA_QUEUE: audio callback pushes filled blocks, the tick drains them
// - POOL_QUEUE: the tick returns emptied blocks, the audio callback reuses them
//
// Block flow:
// 1. Audio callback pops an empty block from POOL_QUEUE
// 2. Audio callback fills it with mono samples
// 3. Audio callback pushes it to DATA_QUEUE
// 4. Tick pops filled blocks from DATA_QUEUE and conditions them into the ring
// 5. Tick clears each block and pushes it back to POOL_QUEUE

use rtrb::{Consumer, Producer};

use crate::error::AudioError;

/// Audio buffer type - pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// Unsplit buffer pool channels
///
/// Returned by [`BufferPool::new`]; call [`BufferPoolChannels::split_for_threads`]
/// to hand each side its half.
pub struct BufferPoolChannels {
    /// Producer for sending filled blocks to the tick
    pub data_producer: Producer<AudioBuffer>,
    /// Consumer for receiving filled blocks on the tick side
    pub data_consumer: Consumer<AudioBuffer>,
    /// Producer for returning empty blocks from the tick side
    pub pool_producer: Producer<AudioBuffer>,
    /// Consumer for retrieving empty blocks in the audio callback
    pub pool_consumer: Consumer<AudioBuffer>,
    /// Capacity every block was allocated with
    pub block_size: usize,
}

/// Half owned by the real-time audio callback
pub struct AudioThreadChannels {
    pub pool_consumer: Consumer<AudioBuffer>,
    pub data_producer: Producer<AudioBuffer>,
    block_size: usize,
}

/// Half owned by the frame tick
pub struct AnalysisThreadChannels {
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
}

impl BufferPoolChannels {
    /// Split into the callback half and the tick half
    pub fn split_for_threads(self) -> (AudioThreadChannels, AnalysisThreadChannels) {
        (
            AudioThreadChannels {
                pool_consumer: self.pool_consumer,
                data_producer: self.data_producer,
                block_size: self.block_size,
            },
            AnalysisThreadChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

impl AudioThreadChannels {
    /// Copy one callback's worth of mono samples into recycled blocks
    ///
    /// Input longer than `block_size` is split across several blocks so no
    /// block ever grows past its pre-allocated capacity. Returns false when
    /// any piece was dropped because no empty block was available or the
    /// data queue was full (the tick is lagging and only the freshest audio
    /// matters).
    pub fn push_samples(&mut self, samples: &[f32]) -> bool {
        let mut delivered = true;
        for chunk in samples.chunks(self.block_size) {
            delivered &= self.push_block(chunk);
        }
        delivered
    }

    fn push_block(&mut self, chunk: &[f32]) -> bool {
        match self.pool_consumer.pop() {
            Ok(mut block) => {
                block.clear();
                block.extend_from_slice(chunk);
                self.data_producer.push(block).is_ok()
            }
            Err(_) => false,
        }
    }
}

impl AnalysisThreadChannels {
    /// Drain every filled block, handing each to `sink` before recycling it
    ///
    /// Returns the number of samples drained.
    pub fn drain<F: FnMut(&[f32])>(&mut self, mut sink: F) -> usize {
        let mut drained = 0;
        while let Ok(mut block) = self.data_consumer.pop() {
            sink(&block);
            drained += block.len();
            block.clear();
            // Pool queue has room for every block ever allocated
            let _ = self.pool_producer.push(block);
        }
        drained
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// Pre-allocates a fixed number of blocks and manages them through two
/// lock-free queues. All heap allocation happens here, before the stream
/// starts.
///
/// # Example
/// ```ignore
/// let (mut audio, mut tick) = BufferPool::new(32, 1024)?.split_for_threads();
///
/// // In the audio callback:
/// audio.push_samples(&data);
///
/// // In the frame tick:
/// tick.drain(|block| ring.write(block));
/// ```
pub struct BufferPool;

impl BufferPool {
    /// Create a new BufferPool with specified buffer count and size
    ///
    /// # Arguments
    /// * `buffer_count` - Number of blocks to pre-allocate (typical: 16-64)
    /// * `buffer_size` - Capacity of each block in f32 samples (typical: 256-2048)
    ///
    /// # Errors
    /// `StreamOpenFailed` if buffer_count or buffer_size is 0, or if the pool
    /// queue cannot take every pre-allocated block
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> Result<BufferPoolChannels, AudioError> {
        if buffer_count == 0 {
            return Err(AudioError::StreamOpenFailed {
                reason: "buffer_count must be greater than 0".to_string(),
            });
        }
        if buffer_size == 0 {
            return Err(AudioError::StreamOpenFailed {
                reason: "buffer_size must be greater than 0".to_string(),
            });
        }

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            let buffer = Vec::with_capacity(buffer_size);
            pool_producer
                .push(buffer)
                .map_err(|_| AudioError::StreamOpenFailed {
                    reason: format!("pool queue full before {} blocks", buffer_count),
                })?;
        }

        Ok(BufferPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
            block_size: buffer_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_creation() {
        let mut channels = BufferPool::new(16, 2048).unwrap();

        let mut available_buffers = 0;
        while channels.pool_consumer.pop().is_ok() {
            available_buffers += 1;
        }
        assert_eq!(available_buffers, 16, "Expected 16 buffers in pool queue");

        assert!(
            channels.data_consumer.pop().is_err(),
            "Data queue should be empty initially"
        );
    }

    #[test]
    fn test_buffer_capacity() {
        let mut channels = BufferPool::new(1, 512).unwrap();
        let buffer = channels
            .pool_consumer
            .pop()
            .expect("Should have one buffer in pool");
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 512, "Buffer capacity mismatch");
    }

    #[test]
    fn test_push_and_drain_preserves_order() {
        let (mut audio, mut tick) = BufferPool::new(4, 8).unwrap().split_for_threads();

        assert!(audio.push_samples(&[1.0, 2.0]));
        assert!(audio.push_samples(&[3.0]));

        let mut seen = Vec::new();
        let drained = tick.drain(|block| seen.extend_from_slice(block));

        assert_eq!(drained, 3);
        assert_eq!(seen, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_blocks_recycle_after_drain() {
        let (mut audio, mut tick) = BufferPool::new(2, 4).unwrap().split_for_threads();

        assert!(audio.push_samples(&[0.1]));
        assert!(audio.push_samples(&[0.2]));
        // Pool exhausted until the tick drains
        assert!(!audio.push_samples(&[0.3]));

        tick.drain(|_| {});
        assert!(audio.push_samples(&[0.4]));
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioThreadChannels>();
        assert_send::<AnalysisThreadChannels>();
        assert_send::<BufferPoolChannels>();
    }

    #[test]
    fn test_oversized_push_is_split_without_growing_blocks() {
        let (mut audio, mut tick) = BufferPool::new(4, 4).unwrap().split_for_threads();
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();

        assert!(audio.push_samples(&samples));

        let mut lengths = Vec::new();
        let mut seen = Vec::new();
        tick.drain(|block| {
            lengths.push(block.len());
            seen.extend_from_slice(block);
        });
        assert_eq!(lengths, vec![4, 4, 2]);
        assert_eq!(seen, samples);
    }

    #[test]
    fn test_oversized_push_reports_dropped_tail() {
        let (mut audio, mut tick) = BufferPool::new(2, 4).unwrap().split_for_threads();

        // Third piece finds the pool empty
        assert!(!audio.push_samples(&[0.5; 10]));
        assert_eq!(tick.drain(|_| {}), 8);
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        match BufferPool::new(0, 1024) {
            Err(AudioError::StreamOpenFailed { reason }) => {
                assert!(reason.contains("buffer_count"))
            }
            Err(other) => panic!("Expected StreamOpenFailed, got {:?}", other),
            Ok(_) => panic!("Expected an error for an empty pool"),
        }
        assert!(matches!(
            BufferPool::new(16, 0),
            Err(AudioError::StreamOpenFailed { .. })
        ));
    }
}
