//! Input → output block transfer
//!
//! Capture and playback run in separate cpal callbacks. Blocks travel from
//! one to the other over a bounded crossbeam channel; a second channel
//! returns emptied buffers so that, after construction, neither side
//! allocates.
//!
//! When the consumer runs dry it writes silence (an underrun). When the
//! producer finds no free buffer the incoming block is dropped (an
//! overrun). Both are counted.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    overruns: CachePadded<AtomicU64>,
    underruns: CachePadded<AtomicU64>,
}

/// Capture side of a [`block_queue`]
pub struct BlockProducer {
    free: Receiver<Vec<f32>>,
    filled: Sender<Vec<f32>>,
    counters: Arc<Counters>,
}

/// Playback side of a [`block_queue`]
pub struct BlockConsumer {
    filled: Receiver<Vec<f32>>,
    free: Sender<Vec<f32>>,
    current: Option<Vec<f32>>,
    offset: usize,
    counters: Arc<Counters>,
}

/// Create a queue of `blocks` preallocated buffers of `block_len` samples
pub fn block_queue(blocks: usize, block_len: usize) -> (BlockProducer, BlockConsumer) {
    let blocks = blocks.max(1);
    let (free_tx, free_rx) = bounded(blocks);
    let (filled_tx, filled_rx) = bounded(blocks);

    for _ in 0..blocks {
        // Capacity is fixed here; `push` never grows a buffer past it.
        let _ = free_tx.try_send(Vec::with_capacity(block_len.max(1)));
    }

    let counters = Arc::new(Counters::default());

    (
        BlockProducer {
            free: free_rx,
            filled: filled_tx,
            counters: Arc::clone(&counters),
        },
        BlockConsumer {
            filled: filled_rx,
            free: free_tx,
            current: None,
            offset: 0,
            counters,
        },
    )
}

impl BlockProducer {
    /// Queue a copy of `samples`; returns `false` if the block was dropped
    ///
    /// Samples beyond a buffer's capacity are discarded.
    pub fn push(&self, samples: &[f32]) -> bool {
        let Ok(mut buffer) = self.free.try_recv() else {
            self.counters.overruns.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let len = samples.len().min(buffer.capacity());
        buffer.clear();
        buffer.extend_from_slice(&samples[..len]);

        match self.filled.try_send(buffer) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.counters.overruns.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn overruns(&self) -> u64 {
        self.counters.overruns.load(Ordering::Relaxed)
    }
}

impl BlockConsumer {
    /// Fill `out` from queued blocks, padding with silence when none remain
    ///
    /// Returns the number of samples that came from the queue.
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;

        while written < out.len() {
            if self.current.is_none() {
                match self.filled.try_recv() {
                    Ok(block) => {
                        self.current = Some(block);
                        self.offset = 0;
                    }
                    Err(_) => break,
                }
            }

            let Some(block) = self.current.as_ref() else {
                break;
            };

            let available = block.len() - self.offset;
            let n = available.min(out.len() - written);
            out[written..written + n].copy_from_slice(&block[self.offset..self.offset + n]);
            written += n;
            self.offset += n;

            if self.offset >= block.len() {
                if let Some(done) = self.current.take() {
                    let _ = self.free.try_send(done);
                }
            }
        }

        if written < out.len() {
            out[written..].fill(0.0);
            self.counters.underruns.fetch_add(1, Ordering::Relaxed);
        }

        written
    }

    pub fn underruns(&self) -> u64 {
        self.counters.underruns.load(Ordering::Relaxed)
    }

    pub(crate) fn counters(&self) -> QueueCounters {
        QueueCounters(Arc::clone(&self.counters))
    }
}

/// Read-only view of a queue's overrun/underrun counters
#[derive(Clone)]
pub(crate) struct QueueCounters(Arc<Counters>);

impl QueueCounters {
    pub(crate) fn overruns(&self) -> u64 {
        self.0.overruns.load(Ordering::Relaxed)
    }

    pub(crate) fn underruns(&self) -> u64 {
        self.0.underruns.load(Ordering::Relaxed)
    }
}
