//! Lock-free queue of decoded frames
//!
//! Single-producer single-consumer ring buffer between a decoder worker and
//! the guest thread calling GetAudioData/GetVideoData.
//!
//! - Producer (decoder thread): blocks with a short sleep while the queue is full
//! - Consumer (guest call): never blocks, an empty queue means "no frame yet"

use crate::backend::DecodedFrame;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Producer back-off while the queue is full
const FULL_BACKOFF: Duration = Duration::from_millis(2);

/// Largest frame queue a session may request
///
/// Guest buffer sizes arrive unchecked from InitEx/PostInit and every slot is
/// allocated up front.
pub const MAX_FRAME_QUEUE_DEPTH: usize = 256;

/// Clamp a requested queue depth to `1..=MAX_FRAME_QUEUE_DEPTH`
pub fn clamp_depth(requested: usize) -> usize {
    requested.clamp(1, MAX_FRAME_QUEUE_DEPTH)
}

/// Bounded frame queue before splitting
pub struct FrameQueue {
    buffer: HeapRb<DecodedFrame>,

    /// Times the producer found the queue full
    overruns: Arc<AtomicU64>,

    /// Times the consumer found the queue empty
    underruns: Arc<AtomicU64>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: HeapRb::new(clamp_depth(capacity)),
            overruns: Arc::new(AtomicU64::new(0)),
            underruns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Split into producer and consumer halves
    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        let (prod, cons) = self.buffer.split();

        let producer = FrameProducer {
            producer: prod,
            overruns: Arc::clone(&self.overruns),
        };

        let consumer = FrameConsumer {
            consumer: cons,
            underruns: Arc::clone(&self.underruns),
            overruns: Arc::clone(&self.overruns),
        };

        (producer, consumer)
    }
}

/// Producer half (decoder thread)
pub struct FrameProducer {
    producer: ringbuf::HeapProd<DecodedFrame>,
    overruns: Arc<AtomicU64>,
}

impl FrameProducer {
    /// Push a frame, waiting while the queue is full
    ///
    /// Returns false if `stop` was raised before the frame could be queued.
    pub fn push_blocking(&mut self, mut frame: DecodedFrame, stop: &AtomicBool) -> bool {
        loop {
            match self.producer.try_push(frame) {
                Ok(()) => return true,
                Err(rejected) => {
                    if stop.load(Ordering::Acquire) {
                        return false;
                    }
                    let count = self.overruns.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 1000 == 0 {
                        trace!("Frame queue full (total: {})", count);
                    }
                    frame = rejected;
                    thread::sleep(FULL_BACKOFF);
                }
            }
        }
    }

    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }
}

/// Consumer half (guest calls)
pub struct FrameConsumer {
    consumer: ringbuf::HeapCons<DecodedFrame>,
    underruns: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
}

impl FrameConsumer {
    pub fn pop(&mut self) -> Option<DecodedFrame> {
        let frame = self.consumer.try_pop();
        if frame.is_none() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn occupied_len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn stats(&self) -> FrameQueueStats {
        FrameQueueStats {
            underruns: self.underruns.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            occupied: self.consumer.occupied_len(),
            capacity: self.consumer.capacity().get(),
        }
    }
}

/// Frame queue statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameQueueStats {
    pub underruns: u64,
    pub overruns: u64,
    pub occupied: usize,
    pub capacity: usize,
}
