//! Guest-visible data model
//!
//! Callback groups, init data, frame and stream descriptions exchanged
//! through the façade. Guest function pointers are modelled as shared
//! closures; an absent callback is `None`.

use std::fmt;
use std::sync::Arc;

/// Guest allocator: `(alignment, size) -> guest address` (0 on failure)
pub type AllocateFn = Arc<dyn Fn(u32, u32) -> u64 + Send + Sync>;

/// Guest deallocator: releases an address returned by an [`AllocateFn`]
pub type DeallocateFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Guest file open: `path -> descriptor` (negative on failure)
pub type FileOpenFn = Arc<dyn Fn(&str) -> i32 + Send + Sync>;

/// Guest file close: `descriptor -> status`
pub type FileCloseFn = Arc<dyn Fn(i32) -> i32 + Send + Sync>;

/// Guest positional read: `(descriptor, offset, buffer) -> bytes read` (negative on failure)
pub type FileReadOffsetFn = Arc<dyn Fn(i32, u64, &mut [u8]) -> i32 + Send + Sync>;

/// Guest file size: `descriptor -> size in bytes`
pub type FileSizeFn = Arc<dyn Fn(i32) -> u64 + Send + Sync>;

/// Guest event sink: `(event id, source id)`
pub type EventFn = Arc<dyn Fn(i32, i32) + Send + Sync>;

/// Guest log sink used by `SetLogCallback`
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Guest memory allocators
///
/// All four callbacks are mandatory for initialization.
#[derive(Clone, Default)]
pub struct MemoryReplacement {
    pub allocate: Option<AllocateFn>,
    pub deallocate: Option<DeallocateFn>,
    pub allocate_texture: Option<AllocateFn>,
    pub deallocate_texture: Option<DeallocateFn>,
}

impl MemoryReplacement {
    pub fn is_complete(&self) -> bool {
        self.allocate.is_some()
            && self.deallocate.is_some()
            && self.allocate_texture.is_some()
            && self.deallocate_texture.is_some()
    }
}

impl fmt::Debug for MemoryReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryReplacement")
            .field("allocate", &self.allocate.is_some())
            .field("deallocate", &self.deallocate.is_some())
            .field("allocate_texture", &self.allocate_texture.is_some())
            .field("deallocate_texture", &self.deallocate_texture.is_some())
            .finish()
    }
}

/// Guest file I/O callbacks
///
/// When all four are present, sources are read through them instead of the
/// host file system.
#[derive(Clone, Default)]
pub struct FileReplacement {
    pub open: Option<FileOpenFn>,
    pub close: Option<FileCloseFn>,
    pub read_offset: Option<FileReadOffsetFn>,
    pub size: Option<FileSizeFn>,
}

impl FileReplacement {
    pub fn is_complete(&self) -> bool {
        self.open.is_some() && self.close.is_some() && self.read_offset.is_some() && self.size.is_some()
    }
}

impl fmt::Debug for FileReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReplacement")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Guest event callback
#[derive(Clone, Default)]
pub struct EventReplacement {
    pub event_callback: Option<EventFn>,
}

impl fmt::Debug for EventReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReplacement")
            .field("event_callback", &self.event_callback.is_some())
            .finish()
    }
}

/// Events delivered through [`EventReplacement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StateStop,
    StateReady,
    StatePlay,
    StatePause,
    StateBuffering,
    WarningId,
}

impl Event {
    pub fn id(self) -> i32 {
        match self {
            Event::StateStop => 0x01,
            Event::StateReady => 0x02,
            Event::StatePlay => 0x03,
            Event::StatePause => 0x04,
            Event::StateBuffering => 0x05,
            Event::WarningId => 0x20,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0x01 => Some(Event::StateStop),
            0x02 => Some(Event::StateReady),
            0x03 => Some(Event::StatePlay),
            0x04 => Some(Event::StatePause),
            0x05 => Some(Event::StateBuffering),
            0x20 => Some(Event::WarningId),
            _ => None,
        }
    }
}

/// Simple init data (`sceAvPlayerInit`)
#[derive(Debug, Clone, Default)]
pub struct InitData {
    pub memory_replacement: MemoryReplacement,
    pub file_replacement: FileReplacement,
    pub event_replacement: EventReplacement,
    pub debug_level: u32,
    /// Base priority for worker threads (0 = default)
    pub base_priority: u32,
    pub num_output_video_framebuffers: i32,
    pub auto_start: bool,
    pub default_language: String,
}

/// Extended init data (`sceAvPlayerInitEx`)
///
/// A priority of 0 means "derive from the calling thread's priority".
#[derive(Debug, Clone, Default)]
pub struct InitDataEx {
    pub memory_replacement: MemoryReplacement,
    pub file_replacement: FileReplacement,
    pub event_replacement: EventReplacement,
    pub default_language: String,
    pub debug_level: u32,
    pub audio_decoder_priority: u32,
    pub audio_decoder_affinity: u64,
    pub video_decoder_priority: u32,
    pub video_decoder_affinity: u64,
    pub demuxer_priority: u32,
    pub demuxer_affinity: u64,
    pub controller_priority: u32,
    pub controller_affinity: u64,
    pub num_output_video_framebuffers: i32,
    pub auto_start: bool,
    pub demux_audio_buffer_size: u32,
    pub demux_video_buffer_size: u32,
}

impl InitDataEx {
    /// The subset shared with the simple init data
    pub fn to_init_data(&self) -> InitData {
        InitData {
            memory_replacement: self.memory_replacement.clone(),
            file_replacement: self.file_replacement.clone(),
            event_replacement: self.event_replacement.clone(),
            debug_level: self.debug_level,
            base_priority: 0,
            num_output_video_framebuffers: self.num_output_video_framebuffers,
            auto_start: self.auto_start,
            default_language: self.default_language.clone(),
        }
    }
}

/// Scheduling parameters for one worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadPriority {
    pub priority: u32,
    pub affinity: u64,
}

/// Scheduling parameters of all player worker threads
///
/// Derived once at initialization and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadPriorities {
    pub video_decoder: ThreadPriority,
    pub audio_decoder: ThreadPriority,
    pub demuxer: ThreadPriority,
    pub controller: ThreadPriority,
}

/// Data applied by `sceAvPlayerPostInit`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostInitData {
    /// Decoded-video queue depth in frames (0 keeps the configured default)
    pub demux_video_buffer_size: u32,
}

/// Stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamType {
    Video,
    Audio,
    TimedText,
    #[default]
    Unknown,
}

impl StreamType {
    pub fn code(self) -> u32 {
        match self {
            StreamType::Video => 0,
            StreamType::Audio => 1,
            StreamType::TimedText => 2,
            StreamType::Unknown => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioStreamDetails {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub language_code: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoStreamDetails {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
    pub language_code: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum StreamDetails {
    Audio(AudioStreamDetails),
    Video(VideoStreamDetails),
    TimedText { language_code: String },
    #[default]
    None,
}

/// Description of one stream of a source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamInfo {
    pub stream_type: StreamType,
    pub details: StreamDetails,
    pub duration_ms: u64,
    pub start_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioFrameDetails {
    pub channel_count: u16,
    pub sample_rate: u32,
    /// Payload size in bytes
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoFrameDetails {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FrameDetails {
    Audio(AudioFrameDetails),
    Video(VideoFrameDetails),
    #[default]
    None,
}

/// One decoded unit handed to the guest
#[derive(Debug, Clone, Default)]
pub struct FrameInfo {
    pub data: Vec<u8>,
    /// Guest buffer obtained from the memory callbacks for this frame
    pub buffer_address: u64,
    pub timestamp_ms: u64,
    pub details: FrameDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoFrameDetailsEx {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
    pub pitch: u32,
    pub crop_left_offset: u32,
    pub crop_right_offset: u32,
    pub crop_top_offset: u32,
    pub crop_bottom_offset: u32,
    pub luma_bit_depth: u8,
    pub chroma_bit_depth: u8,
    pub video_full_range_flag: bool,
}

/// Extended video frame description (`sceAvPlayerGetVideoDataEx`)
#[derive(Debug, Clone, Default)]
pub struct FrameInfoEx {
    pub data: Vec<u8>,
    pub buffer_address: u64,
    pub timestamp_ms: u64,
    pub video: VideoFrameDetailsEx,
}

/// Audio/video synchronization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvSyncMode {
    #[default]
    Default,
    None,
}

/// URI kind for `sceAvPlayerAddSourceEx`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UriType {
    #[default]
    Source,
}

#[derive(Debug, Clone, Default)]
pub struct SourceDetails {
    pub uri: String,
    pub mime_type: String,
}
