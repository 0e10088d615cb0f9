//! Demuxer and decoder worker threads
//!
//! **Architecture:**
//! - Demuxer thread: reads packets, routes packets of the selected streams to
//!   the matching decoder, hands each decoder a fresh [`StreamDecoder`] when
//!   the selection changes
//! - Video/audio decoder threads: decode packets into their frame queue,
//!   blocking while the guest has not consumed earlier frames
//!
//! The demuxer thread returns its [`Demuxer`] when it exits so a stopped
//! session can be resumed from the same position.

use super::controller::EventSender;
use super::frame_queue::FrameProducer;
use super::state::StreamSelection;
use crate::backend::{Demuxer, Packet, StreamDecoder};
use crate::error::Result;
use crate::types::{Event, StreamType, ThreadPriority};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Decoder wake-up interval for checking the stop flag
const DECODER_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Messages from the demuxer to a decoder
pub(super) enum DecoderInput {
    /// Decode packets of `stream_index` with `decoder` from now on
    Configure {
        stream_index: u32,
        decoder: Box<dyn StreamDecoder>,
    },
    /// Drop the current decoder, ignore packets until reconfigured
    Reset,
    Packet(Packet),
    EndOfStream,
}

/// Spawn one named worker thread
///
/// Guest priority and affinity are recorded on the worker; mapping them onto
/// host scheduling belongs to the emulated kernel.
pub(super) fn spawn_worker<F, T>(
    name: &str,
    priority: ThreadPriority,
    body: F,
) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let thread_name = format!("avplayer-{}", name);
    debug!(
        "Spawning {} (priority {}, affinity {:#x})",
        thread_name, priority.priority, priority.affinity
    );
    let handle = thread::Builder::new().name(thread_name).spawn(body)?;
    Ok(handle)
}

/// Demuxer thread state
pub(super) struct DemuxerWorker {
    pub demuxer: Box<dyn Demuxer>,
    pub selection: Arc<Mutex<StreamSelection>>,
    pub video_tx: SyncSender<DecoderInput>,
    pub audio_tx: SyncSender<DecoderInput>,
    pub stop: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
    pub events: EventSender,
}

impl DemuxerWorker {
    pub fn run(self) -> Box<dyn Demuxer> {
        let DemuxerWorker {
            mut demuxer,
            selection,
            video_tx,
            audio_tx,
            stop,
            finished,
            events,
        } = self;

        debug!("Demuxer started");

        // Decoders start unconfigured
        let mut routed = StreamSelection::default();

        while !stop.load(Ordering::Acquire) {
            let wanted = *selection.lock().unwrap_or_else(|e| e.into_inner());
            if !reconfigure(&*demuxer, routed.video, wanted.video, &video_tx)
                || !reconfigure(&*demuxer, routed.audio, wanted.audio, &audio_tx)
            {
                break;
            }
            routed = wanted;

            match demuxer.next_packet() {
                Ok(Some(packet)) => {
                    let target = if routed.video == Some(packet.stream_index) {
                        Some(&video_tx)
                    } else if routed.audio == Some(packet.stream_index) {
                        Some(&audio_tx)
                    } else {
                        None
                    };

                    if let Some(tx) = target {
                        // Blocks while the decoder is behind; fails once the decoder exited
                        if tx.send(DecoderInput::Packet(packet)).is_err() {
                            break;
                        }
                    }
                }
                Ok(None) => {
                    debug!("Demuxer reached end of source");
                    end_of_stream(&video_tx, &audio_tx, &finished);
                    break;
                }
                Err(e) => {
                    warn!("Demuxer error, ending playback: {}", e);
                    events.notify(Event::WarningId);
                    end_of_stream(&video_tx, &audio_tx, &finished);
                    break;
                }
            }
        }

        debug!("Demuxer exiting");
        demuxer
    }
}

fn end_of_stream(
    video_tx: &SyncSender<DecoderInput>,
    audio_tx: &SyncSender<DecoderInput>,
    finished: &AtomicBool,
) {
    // A decoder that already exited has nothing left to flush
    let _ = video_tx.send(DecoderInput::EndOfStream);
    let _ = audio_tx.send(DecoderInput::EndOfStream);
    finished.store(true, Ordering::Release);
}

/// Push a decoder change when the selection moved; false if the decoder is gone
fn reconfigure(
    demuxer: &dyn Demuxer,
    routed: Option<u32>,
    wanted: Option<u32>,
    tx: &SyncSender<DecoderInput>,
) -> bool {
    if routed == wanted {
        return true;
    }

    let input = match wanted {
        Some(stream_index) => match demuxer.make_decoder(stream_index) {
            Ok(decoder) => {
                debug!("Routing stream {} to decoder", stream_index);
                DecoderInput::Configure {
                    stream_index,
                    decoder,
                }
            }
            Err(e) => {
                warn!("Failed to create decoder for stream {}: {}", stream_index, e);
                DecoderInput::Reset
            }
        },
        None => DecoderInput::Reset,
    };

    tx.send(input).is_ok()
}

/// Decoder thread state (one per stream kind)
pub(super) struct DecoderWorker {
    pub kind: StreamType,
    pub input: Receiver<DecoderInput>,
    pub frames: FrameProducer,
    pub stop: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
}

impl DecoderWorker {
    pub fn run(mut self) {
        debug!("{:?} decoder started", self.kind);

        let mut active: Option<(u32, Box<dyn StreamDecoder>)> = None;

        while !self.stop.load(Ordering::Acquire) {
            let input = match self.input.recv_timeout(DECODER_POLL_INTERVAL) {
                Ok(input) => input,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match input {
                DecoderInput::Configure {
                    stream_index,
                    decoder,
                } => {
                    active = Some((stream_index, decoder));
                }
                DecoderInput::Reset => {
                    active = None;
                }
                DecoderInput::Packet(packet) => {
                    let Some((stream_index, decoder)) = active.as_mut() else {
                        continue;
                    };
                    if *stream_index != packet.stream_index {
                        continue;
                    }

                    match decoder.decode(&packet) {
                        Ok(Some(frame)) => {
                            trace!("{:?} frame at {}ms", self.kind, frame.timestamp_ms);
                            if !self.frames.push_blocking(frame, &self.stop) {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(
                                "{:?} decode failed at {}ms: {}",
                                self.kind, packet.timestamp_ms, e
                            );
                        }
                    }
                }
                DecoderInput::EndOfStream => {
                    debug!("{:?} decoder reached end of stream", self.kind);
                    self.finished.store(true, Ordering::Release);
                }
            }
        }

        debug!("{:?} decoder exiting", self.kind);
    }
}
