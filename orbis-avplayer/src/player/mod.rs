//! Player session behind a handle
//!
//! **Architecture:**
//! - Controller thread (whole session): delivers events to the guest
//! - Demuxer thread (while active): reads packets, routes selected streams
//! - Video and audio decoder threads (while active): fill frame queues
//! - Guest calls (GetVideoData/GetAudioData): pop frames, never block
//!
//! **State machine:** `Idle → (AddSource) → Ready → (Start) → Active ⇄
//! (Stop) Ready`. Closing the handle drops the session from any state.

pub mod controller;
pub mod frame_queue;
pub mod state;
mod workers;

pub use controller::EventSender;
pub use frame_queue::{FrameConsumer, FrameQueue, FrameQueueStats, MAX_FRAME_QUEUE_DEPTH};
pub use state::{PlayerState, StreamSelection};

use crate::backend::{DecodedFrame, Demuxer, MediaBackend};
use crate::config::AvPlayerConfig;
use crate::error::{Error, Result};
use crate::types::{
    Event, FrameDetails, FrameInfo, FrameInfoEx, InitData, PostInitData, StreamInfo, StreamType,
    ThreadPriorities, VideoFrameDetailsEx,
};
use controller::ControllerWorker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};
use workers::{spawn_worker, DecoderWorker, DemuxerWorker};

/// Alignment requested for audio frame buffers
const AUDIO_BUFFER_ALIGNMENT: u32 = 0x40;

/// Alignment requested for video frame textures
const VIDEO_BUFFER_ALIGNMENT: u32 = 0x100;

/// Worker threads and frame queues of a running playback
struct Playback {
    stop: Arc<AtomicBool>,
    demuxer_done: Arc<AtomicBool>,
    video_done: Arc<AtomicBool>,
    audio_done: Arc<AtomicBool>,
    demuxer: JoinHandle<Box<dyn Demuxer>>,
    video_decoder: JoinHandle<()>,
    audio_decoder: JoinHandle<()>,
    video_frames: FrameConsumer,
    audio_frames: FrameConsumer,
}

impl Playback {
    /// Source exhausted and every decoded frame handed out
    fn is_drained(&self) -> bool {
        self.demuxer_done.load(Ordering::Acquire)
            && self.video_done.load(Ordering::Acquire)
            && self.audio_done.load(Ordering::Acquire)
            && self.video_frames.is_empty()
            && self.audio_frames.is_empty()
    }

    /// Stop and join all workers, returning the demuxer if it survived
    fn shutdown(self) -> Option<Box<dyn Demuxer>> {
        self.stop.store(true, Ordering::Release);

        let demuxer = match self.demuxer.join() {
            Ok(demuxer) => Some(demuxer),
            Err(_) => {
                error!("Demuxer thread panicked, source is lost");
                None
            }
        };
        if self.video_decoder.join().is_err() {
            error!("Video decoder thread panicked");
        }
        if self.audio_decoder.join().is_err() {
            error!("Audio decoder thread panicked");
        }
        demuxer
    }
}

/// Guest buffers currently lent out for the last delivered frames
#[derive(Debug, Default)]
struct LentBuffers {
    audio: Option<u64>,
    video: Option<u64>,
}

/// Frames popped from a queue but not yet handed to the guest
#[derive(Default)]
struct PendingFrames {
    audio: Option<DecodedFrame>,
    video: Option<DecodedFrame>,
}

impl PendingFrames {
    fn slot(&mut self, kind: StreamType) -> &mut Option<DecodedFrame> {
        match kind {
            StreamType::Video => &mut self.video,
            _ => &mut self.audio,
        }
    }

    fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    fn clear(&mut self) {
        self.audio = None;
        self.video = None;
    }
}

/// One playback session
pub struct AvPlayer {
    init: InitData,
    priorities: ThreadPriorities,
    backend: Arc<dyn MediaBackend>,

    state: PlayerState,
    streams: Vec<StreamInfo>,
    selection: Arc<Mutex<StreamSelection>>,

    /// Demuxer while no playback is running
    demuxer: Option<Box<dyn Demuxer>>,
    playback: Option<Playback>,

    video_queue_depth: usize,
    audio_queue_depth: usize,
    packet_queue_depth: usize,

    current_time_ms: u64,
    lent: LentBuffers,
    pending: PendingFrames,
    drain_reported: bool,

    events: EventSender,
    controller_stop: Arc<AtomicBool>,
    controller: Option<JoinHandle<()>>,
}

impl AvPlayer {
    /// Create a session and spawn its controller thread
    ///
    /// The caller has already checked that the memory callbacks are complete.
    pub fn new(
        init: InitData,
        priorities: ThreadPriorities,
        config: &AvPlayerConfig,
        backend: Arc<dyn MediaBackend>,
    ) -> Result<Self> {
        let controller_stop = Arc::new(AtomicBool::new(false));
        let (worker, events) =
            ControllerWorker::new(init.event_replacement.clone(), Arc::clone(&controller_stop));
        let controller = spawn_worker("controller", priorities.controller, move || worker.run())?;

        info!(
            "AvPlayer session created (language '{}', {} output framebuffers, auto start {}, debug level {})",
            init.default_language,
            init.num_output_video_framebuffers,
            init.auto_start,
            init.debug_level
        );
        debug!("Thread priorities: {:?}", priorities);

        Ok(Self {
            init,
            priorities,
            backend,
            state: PlayerState::Idle,
            streams: Vec::new(),
            selection: Arc::new(Mutex::new(StreamSelection::default())),
            demuxer: None,
            playback: None,
            video_queue_depth: frame_queue::clamp_depth(config.frame_queue_depth),
            audio_queue_depth: frame_queue::clamp_depth(config.frame_queue_depth),
            packet_queue_depth: config.packet_queue_depth,
            current_time_ms: 0,
            lent: LentBuffers::default(),
            pending: PendingFrames::default(),
            drain_reported: false,
            events,
            controller_stop,
            controller: Some(controller),
        })
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn priorities(&self) -> ThreadPriorities {
        self.priorities
    }

    /// Frame queue depths used by the next Start (0 keeps the current value)
    ///
    /// Depths above [`MAX_FRAME_QUEUE_DEPTH`] are clamped.
    pub fn set_queue_depths(&mut self, video: u32, audio: u32) {
        if let Some(depth) = requested_depth(StreamType::Video, video) {
            self.video_queue_depth = depth;
        }
        if let Some(depth) = requested_depth(StreamType::Audio, audio) {
            self.audio_queue_depth = depth;
        }
    }

    /// Frame queue depths `(video, audio)` used by the next Start
    pub fn queue_depths(&self) -> (usize, usize) {
        (self.video_queue_depth, self.audio_queue_depth)
    }

    /// Statistics of the running frame queue of `kind`
    pub fn frame_queue_stats(&self, kind: StreamType) -> Option<FrameQueueStats> {
        let playback = self.playback.as_ref()?;
        Some(match kind {
            StreamType::Video => playback.video_frames.stats(),
            _ => playback.audio_frames.stats(),
        })
    }

    pub fn add_source(&mut self, uri: &str) -> Result<()> {
        if self.state != PlayerState::Idle {
            return Err(Error::OperationFailed(
                "A source was already added to this player".to_string(),
            ));
        }

        let demuxer = self.backend.open(uri, &self.init.file_replacement)?;
        self.streams = demuxer.streams().to_vec();
        self.demuxer = Some(demuxer);
        self.state = PlayerState::Ready;
        info!("Added source {} ({} stream(s))", uri, self.streams.len());
        self.events.notify(Event::StateReady);

        // The source stays added when auto start fails; the guest may Start again
        if self.init.auto_start {
            self.select_default_streams();
            if let Err(e) = self.start() {
                warn!("Auto start failed, player stays ready: {}", e);
            }
        }
        Ok(())
    }

    /// Select the first stream of each decodable kind that has no selection yet
    fn select_default_streams(&mut self) {
        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        for (index, stream) in self.streams.iter().enumerate() {
            if selection.get(stream.stream_type).is_none() {
                selection.select(stream.stream_type, index as u32);
            }
        }
    }

    pub fn stream_count(&self) -> Result<u32> {
        self.require_source()?;
        Ok(self.streams.len() as u32)
    }

    pub fn get_stream_info(&self, stream_id: u32, info: &mut StreamInfo) -> Result<()> {
        self.require_source()?;
        *info = self.stream(stream_id)?.clone();
        Ok(())
    }

    pub fn enable_stream(&mut self, stream_id: u32) -> Result<()> {
        self.require_source()?;
        let kind = self.stream(stream_id)?.stream_type;

        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        let previous = selection.get(kind);
        if !selection.select(kind, stream_id) {
            return Err(Error::NotSupported(format!(
                "Stream {} of type {:?} cannot be decoded",
                stream_id, kind
            )));
        }
        drop(selection);
        if previous != Some(stream_id) {
            *self.pending.slot(kind) = None;
        }
        debug!("Enabled stream {} ({:?})", stream_id, kind);
        Ok(())
    }

    pub fn disable_stream(&mut self, stream_id: u32) -> Result<()> {
        self.require_source()?;
        let kind = self.stream(stream_id)?.stream_type;

        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        if selection.deselect(stream_id) {
            drop(selection);
            *self.pending.slot(kind) = None;
            debug!("Disabled stream {}", stream_id);
        }
        Ok(())
    }

    pub fn post_init(&mut self, data: &PostInitData) -> Result<()> {
        if self.state == PlayerState::Active {
            return Err(Error::OperationFailed(
                "PostInit must precede Start".to_string(),
            ));
        }
        self.set_queue_depths(data.demux_video_buffer_size, 0);
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            PlayerState::Idle => {
                return Err(Error::OperationFailed("No source added".to_string()));
            }
            PlayerState::Active => return Ok(()),
            PlayerState::Ready => {}
        }

        let demuxer = self
            .demuxer
            .take()
            .ok_or_else(|| Error::OperationFailed("Source is no longer available".to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let demuxer_done = Arc::new(AtomicBool::new(false));
        let video_done = Arc::new(AtomicBool::new(false));
        let audio_done = Arc::new(AtomicBool::new(false));

        let (video_tx, video_rx) = mpsc::sync_channel(self.packet_queue_depth);
        let (audio_tx, audio_rx) = mpsc::sync_channel(self.packet_queue_depth);
        let (video_prod, video_frames) = FrameQueue::new(self.video_queue_depth).split();
        let (audio_prod, audio_frames) = FrameQueue::new(self.audio_queue_depth).split();

        let video = DecoderWorker {
            kind: StreamType::Video,
            input: video_rx,
            frames: video_prod,
            stop: Arc::clone(&stop),
            finished: Arc::clone(&video_done),
        };
        let video_decoder = match spawn_worker("video-decoder", self.priorities.video_decoder, move || {
            video.run()
        }) {
            Ok(handle) => handle,
            Err(e) => {
                self.demuxer = Some(demuxer);
                return Err(e);
            }
        };

        let audio = DecoderWorker {
            kind: StreamType::Audio,
            input: audio_rx,
            frames: audio_prod,
            stop: Arc::clone(&stop),
            finished: Arc::clone(&audio_done),
        };
        let audio_decoder = match spawn_worker("audio-decoder", self.priorities.audio_decoder, move || {
            audio.run()
        }) {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::Release);
                let _ = video_decoder.join();
                self.demuxer = Some(demuxer);
                return Err(e);
            }
        };

        let demux = DemuxerWorker {
            demuxer,
            selection: Arc::clone(&self.selection),
            video_tx,
            audio_tx,
            stop: Arc::clone(&stop),
            finished: Arc::clone(&demuxer_done),
            events: self.events.clone(),
        };
        let demuxer = match spawn_worker("demuxer", self.priorities.demuxer, move || demux.run()) {
            Ok(handle) => handle,
            Err(e) => {
                // The demuxer went down with the unspawned closure
                stop.store(true, Ordering::Release);
                let _ = video_decoder.join();
                let _ = audio_decoder.join();
                return Err(e);
            }
        };

        self.playback = Some(Playback {
            stop,
            demuxer_done,
            video_done,
            audio_done,
            demuxer,
            video_decoder,
            audio_decoder,
            video_frames,
            audio_frames,
        });
        self.state = PlayerState::Active;
        self.drain_reported = false;
        info!("Playback started");
        self.events.notify(Event::StatePlay);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.state != PlayerState::Active {
            return Err(Error::OperationFailed(format!(
                "Cannot stop a player that is {}",
                self.state
            )));
        }

        self.halt_playback();
        self.state = PlayerState::Ready;
        info!("Playback stopped");
        self.events.notify(Event::StateStop);
        Ok(())
    }

    fn halt_playback(&mut self) {
        self.pending.clear();
        if let Some(playback) = self.playback.take() {
            self.demuxer = playback.shutdown();
        }
    }

    /// Playback running and not yet drained
    pub fn is_active(&mut self) -> bool {
        self.state == PlayerState::Active && !self.check_drained()
    }

    /// Report end of playback to the guest once
    fn check_drained(&mut self) -> bool {
        let drained = self.pending.is_empty()
            && self.playback.as_ref().map(Playback::is_drained).unwrap_or(false);
        if drained && !self.drain_reported {
            self.drain_reported = true;
            info!("Playback reached end of source");
            self.events.notify(Event::StateStop);
        }
        drained
    }

    pub fn current_time(&self) -> u64 {
        self.current_time_ms
    }

    pub fn get_audio_data(&mut self, info: &mut FrameInfo) -> Result<bool> {
        let Some((frame, address)) = self.deliver_frame(StreamType::Audio)? else {
            return Ok(false);
        };

        if self.selected(StreamType::Video).is_none() {
            self.current_time_ms = frame.timestamp_ms;
        }

        *info = FrameInfo {
            data: frame.data,
            buffer_address: address,
            timestamp_ms: frame.timestamp_ms,
            details: frame.details,
        };
        Ok(true)
    }

    pub fn get_video_data(&mut self, info: &mut FrameInfo) -> Result<bool> {
        let Some((frame, address)) = self.deliver_frame(StreamType::Video)? else {
            return Ok(false);
        };

        self.current_time_ms = frame.timestamp_ms;

        *info = FrameInfo {
            data: frame.data,
            buffer_address: address,
            timestamp_ms: frame.timestamp_ms,
            details: frame.details,
        };
        Ok(true)
    }

    pub fn get_video_data_ex(&mut self, info: &mut FrameInfoEx) -> Result<bool> {
        let Some((frame, address)) = self.deliver_frame(StreamType::Video)? else {
            return Ok(false);
        };

        self.current_time_ms = frame.timestamp_ms;

        let video = match frame.details {
            FrameDetails::Video(v) => VideoFrameDetailsEx {
                width: v.width,
                height: v.height,
                aspect_ratio: v.aspect_ratio,
                pitch: v.width,
                luma_bit_depth: 8,
                chroma_bit_depth: 8,
                ..Default::default()
            },
            _ => VideoFrameDetailsEx::default(),
        };

        *info = FrameInfoEx {
            data: frame.data,
            buffer_address: address,
            timestamp_ms: frame.timestamp_ms,
            video,
        };
        Ok(true)
    }

    /// Next frame of `kind` together with the guest buffer lent for it
    ///
    /// A frame whose buffer the guest refused is kept and offered again.
    fn deliver_frame(&mut self, kind: StreamType) -> Result<Option<(DecodedFrame, u64)>> {
        let Some(frame) = self.next_frame(kind)? else {
            return Ok(None);
        };

        match self.lend_buffer(kind, frame.data.len()) {
            Ok(address) => Ok(Some((frame, address))),
            Err(e) => {
                *self.pending.slot(kind) = Some(frame);
                Err(e)
            }
        }
    }

    fn next_frame(&mut self, kind: StreamType) -> Result<Option<DecodedFrame>> {
        self.require_source()?;
        if self.selected(kind).is_none() {
            return Ok(None);
        }
        if let Some(frame) = self.pending.slot(kind).take() {
            return Ok(Some(frame));
        }

        let frame = match self.playback.as_mut() {
            Some(playback) => match kind {
                StreamType::Video => playback.video_frames.pop(),
                _ => playback.audio_frames.pop(),
            },
            None => None,
        };
        if frame.is_none() {
            self.check_drained();
        }
        Ok(frame)
    }

    fn selected(&self, kind: StreamType) -> Option<u32> {
        self.selection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(kind)
    }

    /// Obtain a guest buffer for a new frame and release the previous one
    fn lend_buffer(&mut self, kind: StreamType, size: usize) -> Result<u64> {
        let memory = &self.init.memory_replacement;
        let (allocate, alignment) = match kind {
            StreamType::Video => (&memory.allocate_texture, VIDEO_BUFFER_ALIGNMENT),
            _ => (&memory.allocate, AUDIO_BUFFER_ALIGNMENT),
        };
        let allocate = allocate
            .as_ref()
            .ok_or_else(|| Error::InvalidParams("Missing allocator".to_string()))?;

        let size = guest_buffer_size(kind, size)?;
        let address = allocate(alignment, size);
        if address == 0 {
            return Err(Error::NoMemory(format!(
                "Guest allocator refused {} bytes for a {:?} frame",
                size, kind
            )));
        }

        let previous = match kind {
            StreamType::Video => self.lent.video.replace(address),
            _ => self.lent.audio.replace(address),
        };
        if let Some(previous) = previous {
            self.release_buffer(kind, previous);
        }
        Ok(address)
    }

    fn release_buffer(&self, kind: StreamType, address: u64) {
        let memory = &self.init.memory_replacement;
        let deallocate = match kind {
            StreamType::Video => &memory.deallocate_texture,
            _ => &memory.deallocate,
        };
        if let Some(deallocate) = deallocate {
            deallocate(address);
        }
    }

    fn require_source(&self) -> Result<()> {
        if self.state.has_source() {
            Ok(())
        } else {
            Err(Error::OperationFailed(format!(
                "Player is {}, no source added",
                self.state
            )))
        }
    }

    fn stream(&self, stream_id: u32) -> Result<&StreamInfo> {
        self.streams
            .get(stream_id as usize)
            .ok_or_else(|| Error::InvalidParams(format!("No stream {}", stream_id)))
    }

    /// Join every worker and return lent guest buffers
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        self.halt_playback();

        if let Some(address) = self.lent.video.take() {
            self.release_buffer(StreamType::Video, address);
        }
        if let Some(address) = self.lent.audio.take() {
            self.release_buffer(StreamType::Audio, address);
        }

        if let Some(controller) = self.controller.take() {
            self.controller_stop.store(true, Ordering::Release);
            if controller.join().is_err() {
                warn!("Controller thread panicked");
            }
            debug!("AvPlayer session shut down");
        }
    }
}

/// Frame size as a guest allocation request
fn guest_buffer_size(kind: StreamType, size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| {
        Error::NoMemory(format!("{:?} frame of {} bytes exceeds a guest buffer", kind, size))
    })
}

/// Queue depth requested by the guest, `None` for 0 (keep current)
fn requested_depth(kind: StreamType, requested: u32) -> Option<usize> {
    if requested == 0 {
        return None;
    }
    let requested = usize::try_from(requested).unwrap_or(usize::MAX);
    let depth = frame_queue::clamp_depth(requested);
    if depth != requested {
        warn!(
            "{:?} frame queue depth {} clamped to {}",
            kind, requested, depth
        );
    }
    Some(depth)
}

impl Drop for AvPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
