//! Guest-callable AvPlayer entry points
//!
//! Every operation validates its handle and required arguments first and
//! answers a null, closed or unknown handle with `INVALID_PARAMS` before any
//! session is touched. Results from the session are passed through; internal
//! errors become status codes here and nowhere else.
//!
//! **Sentinels for non-status returns:**
//! - `bool` operations (GetAudioData, GetVideoData, GetVideoDataEx,
//!   IsActive) report every failure as `false`
//! - CurrentTime reports argument errors as `INVALID_PARAMS` zero-extended
//!   to `u64`
//! - StreamCount reports failures as the negative status code

use crate::backend::{MediaBackend, SymphoniaBackend};
use crate::config::AvPlayerConfig;
use crate::error::{Error, Result};
use crate::handle::{HandleTable, PlayerHandle, SharedPlayer};
use crate::player::{AvPlayer, FrameQueueStats};
use crate::priority;
use crate::status;
use crate::types::{
    AvSyncMode, FrameInfo, FrameInfoEx, InitData, InitDataEx, LogFn, PostInitData,
    SourceDetails, StreamInfo, StreamType, ThreadPriorities, UriType,
};
use std::cell::Cell;
use std::sync::{Arc, MutexGuard};
use tracing::{error, trace, warn};

/// Query of the calling guest thread's scheduling priority
///
/// Stands in for the emulated kernel's `scePthreadGetprio(scePthreadSelf())`.
pub trait ThreadContext: Send + Sync {
    fn current_priority(&self) -> Result<u32>;
}

thread_local! {
    static GUEST_PRIORITY: Cell<u32> = const { Cell::new(0) };
}

/// Guest priority recorded per host thread by the emulated kernel
///
/// Threads that never recorded a priority report 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostThreadContext;

impl HostThreadContext {
    /// Record the guest priority of the calling host thread
    pub fn set_current_priority(priority: u32) {
        GUEST_PRIORITY.with(|p| p.set(priority));
    }
}

impl ThreadContext for HostThreadContext {
    fn current_priority(&self) -> Result<u32> {
        Ok(GUEST_PRIORITY.with(Cell::get))
    }
}

/// Fixed answer, `None` simulates a failing query
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedThreadContext(pub Option<u32>);

impl ThreadContext for FixedThreadContext {
    fn current_priority(&self) -> Result<u32> {
        self.0
            .ok_or_else(|| Error::OperationFailed("Thread priority query failed".to_string()))
    }
}

/// The libSceAvPlayer entry points
pub struct AvPlayerLibrary {
    handles: HandleTable,
    backend: Arc<dyn MediaBackend>,
    config: AvPlayerConfig,
    threads: Arc<dyn ThreadContext>,
}

impl AvPlayerLibrary {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        config: AvPlayerConfig,
        threads: Arc<dyn ThreadContext>,
    ) -> Self {
        Self {
            handles: HandleTable::new(),
            backend,
            config,
            threads,
        }
    }

    /// Library with the symphonia host backend and configuration from disk
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(SymphoniaBackend),
            AvPlayerConfig::load(&AvPlayerConfig::default_path()),
            Arc::new(HostThreadContext),
        )
    }

    pub fn config(&self) -> &AvPlayerConfig {
        &self.config
    }

    /// Number of live handles
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// Worker priorities a live session was created with
    pub fn thread_priorities(&self, handle: PlayerHandle) -> Option<ThreadPriorities> {
        self.handles.get(handle).map(|player| lock(&player).priorities())
    }

    /// Frame queue depths `(video, audio)` a live session starts with
    pub fn frame_queue_depths(&self, handle: PlayerHandle) -> Option<(usize, usize)> {
        self.handles.get(handle).map(|player| lock(&player).queue_depths())
    }

    /// Statistics of a running session's frame queue
    pub fn frame_queue_stats(
        &self,
        handle: PlayerHandle,
        kind: StreamType,
    ) -> Option<FrameQueueStats> {
        self.handles
            .get(handle)
            .and_then(|player| lock(&player).frame_queue_stats(kind))
    }

    /// `sceAvPlayerInit`
    pub fn init(&self, data: Option<&InitData>) -> PlayerHandle {
        trace!("called");
        let Some(data) = data else {
            return PlayerHandle::NULL;
        };

        if !data.memory_replacement.is_complete() {
            error!("All allocators are required for AVPlayer Initialisation.");
            return PlayerHandle::NULL;
        }

        let priorities = priority::from_base(data.base_priority);
        match self.create_player(data.clone(), priorities, 0, 0) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to create player: {}", e);
                PlayerHandle::NULL
            }
        }
    }

    /// `sceAvPlayerInitEx`
    pub fn init_ex(&self, data: Option<&InitDataEx>, player: Option<&mut PlayerHandle>) -> i32 {
        trace!("called");
        let (Some(data), Some(player)) = (data, player) else {
            return status::INVALID_PARAMS;
        };

        if !data.memory_replacement.is_complete() {
            error!("All allocators are required for AVPlayer Initialisation.");
            return status::INVALID_PARAMS;
        }

        let base_priority = match self.threads.current_priority() {
            Ok(p) => p,
            Err(e) => {
                trace!("Thread priority unavailable ({}), using default base", e);
                0
            }
        };
        let priorities = priority::from_init_ex(data, base_priority);

        match self.create_player(
            data.to_init_data(),
            priorities,
            data.demux_video_buffer_size,
            data.demux_audio_buffer_size,
        ) {
            Ok(handle) => {
                *player = handle;
                status::OK
            }
            Err(e) => {
                error!("Failed to create player: {}", e);
                e.status()
            }
        }
    }

    /// Shared constructor behind both init variants
    fn create_player(
        &self,
        data: InitData,
        priorities: ThreadPriorities,
        video_queue_depth: u32,
        audio_queue_depth: u32,
    ) -> Result<PlayerHandle> {
        let mut player = AvPlayer::new(data, priorities, &self.config, Arc::clone(&self.backend))?;
        player.set_queue_depths(video_queue_depth, audio_queue_depth);
        let handle = self.handles.insert(player);
        trace!("returning {}", handle);
        Ok(handle)
    }

    /// `sceAvPlayerAddSource`
    pub fn add_source(&self, handle: PlayerHandle, filename: Option<&str>) -> i32 {
        trace!("filename = {:?}", filename);
        let (Some(player), Some(filename)) = (self.handles.get(handle), filename) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).add_source(filename));
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerAddSourceEx`
    pub fn add_source_ex(
        &self,
        handle: PlayerHandle,
        _uri_type: UriType,
        _source_details: Option<&SourceDetails>,
    ) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerChangeStream`
    pub fn change_stream(&self) -> i32 {
        stub()
    }

    /// `sceAvPlayerClose`
    ///
    /// Joins the session's workers and releases its guest buffers before
    /// returning. The handle is dead afterwards.
    pub fn close(&self, handle: PlayerHandle) -> i32 {
        trace!("called");
        let Some(player) = self.handles.remove(handle) else {
            return status::INVALID_PARAMS;
        };
        lock(&player).shutdown();
        status::OK
    }

    /// `sceAvPlayerCurrentTime`
    pub fn current_time(&self, handle: PlayerHandle) -> u64 {
        trace!("called");
        let Some(player) = self.handles.get(handle) else {
            return status::INVALID_PARAMS as u32 as u64;
        };
        let res = lock(&player).current_time();
        trace!("returning {}", res);
        res
    }

    /// `sceAvPlayerDisableStream`
    pub fn disable_stream(&self, handle: PlayerHandle, stream_id: u32) -> i32 {
        trace!("stream_id = {}", stream_id);
        let Some(player) = self.handles.get(handle) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).disable_stream(stream_id));
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerEnableStream`
    pub fn enable_stream(&self, handle: PlayerHandle, stream_id: u32) -> i32 {
        trace!("stream_id = {}", stream_id);
        let Some(player) = self.handles.get(handle) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).enable_stream(stream_id));
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerGetAudioData`
    pub fn get_audio_data(&self, handle: PlayerHandle, info: Option<&mut FrameInfo>) -> bool {
        trace!("called");
        let (Some(player), Some(info)) = (self.handles.get(handle), info) else {
            return false;
        };
        let res = to_flag(lock(&player).get_audio_data(info));
        trace!("returning {}", res);
        res
    }

    /// `sceAvPlayerGetStreamInfo`
    pub fn get_stream_info(
        &self,
        handle: PlayerHandle,
        stream_id: u32,
        info: Option<&mut StreamInfo>,
    ) -> i32 {
        trace!("stream_id = {}", stream_id);
        let (Some(player), Some(info)) = (self.handles.get(handle), info) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).get_stream_info(stream_id, info));
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerGetVideoData`
    pub fn get_video_data(&self, handle: PlayerHandle, info: Option<&mut FrameInfo>) -> bool {
        trace!("called");
        let (Some(player), Some(info)) = (self.handles.get(handle), info) else {
            return false;
        };
        let res = to_flag(lock(&player).get_video_data(info));
        trace!("returning {}", res);
        res
    }

    /// `sceAvPlayerGetVideoDataEx`
    pub fn get_video_data_ex(&self, handle: PlayerHandle, info: Option<&mut FrameInfoEx>) -> bool {
        trace!("called");
        let (Some(player), Some(info)) = (self.handles.get(handle), info) else {
            return false;
        };
        let res = to_flag(lock(&player).get_video_data_ex(info));
        trace!("returning {}", res);
        res
    }

    /// `sceAvPlayerIsActive`
    pub fn is_active(&self, handle: PlayerHandle) -> bool {
        trace!("called");
        let Some(player) = self.handles.get(handle) else {
            trace!("returning false (invalid handle)");
            return false;
        };
        let res = lock(&player).is_active();
        trace!("returning {}", res);
        res
    }

    /// `sceAvPlayerJumpToTime`
    pub fn jump_to_time(&self, handle: PlayerHandle, _jump_time_ms: u64) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerPause`
    pub fn pause(&self, handle: PlayerHandle) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerPostInit`
    pub fn post_init(&self, handle: PlayerHandle, data: Option<&PostInitData>) -> i32 {
        trace!("called");
        let (Some(player), Some(data)) = (self.handles.get(handle), data) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).post_init(data));
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerPrintf`
    pub fn printf(&self, _message: &str) -> i32 {
        stub()
    }

    /// `sceAvPlayerResume`
    pub fn resume(&self, handle: PlayerHandle) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerSetAvSyncMode`
    pub fn set_av_sync_mode(&self, handle: PlayerHandle, _sync_mode: AvSyncMode) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerSetLogCallback`
    pub fn set_log_callback(&self, _callback: Option<LogFn>) -> i32 {
        stub()
    }

    /// `sceAvPlayerSetLooping`
    pub fn set_looping(&self, handle: PlayerHandle, _loop_flag: bool) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerSetTrickSpeed`
    pub fn set_trick_speed(&self, handle: PlayerHandle, _trick_speed: i32) -> i32 {
        self.stub_with_handle(handle)
    }

    /// `sceAvPlayerStart`
    pub fn start(&self, handle: PlayerHandle) -> i32 {
        trace!("called");
        let Some(player) = self.handles.get(handle) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).start());
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerStop`
    pub fn stop(&self, handle: PlayerHandle) -> i32 {
        trace!("called");
        let Some(player) = self.handles.get(handle) else {
            return status::INVALID_PARAMS;
        };
        let res = to_status(lock(&player).stop());
        trace!("returning {}", status::name(res));
        res
    }

    /// `sceAvPlayerStreamCount`
    pub fn stream_count(&self, handle: PlayerHandle) -> i32 {
        trace!("called");
        let Some(player) = self.handles.get(handle) else {
            return status::INVALID_PARAMS;
        };
        let res = match lock(&player).stream_count() {
            Ok(count) => count_to_status(count),
            Err(e) => e.status(),
        };
        trace!("returning {}", res);
        res
    }

    /// `sceAvPlayerVprintf`
    pub fn vprintf(&self, _message: &str) -> i32 {
        stub()
    }

    fn stub_with_handle(&self, handle: PlayerHandle) -> i32 {
        warn!("(STUBBED) called");
        if self.handles.get(handle).is_none() {
            return status::INVALID_PARAMS;
        }
        status::OK
    }
}

fn stub() -> i32 {
    warn!("(STUBBED) called");
    status::OK
}

fn lock(player: &SharedPlayer) -> MutexGuard<'_, AvPlayer> {
    player.lock().unwrap_or_else(|e| e.into_inner())
}

fn to_status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => status::OK,
        Err(e) => {
            trace!("{}", e);
            e.status()
        }
    }
}

/// Non-negative count, or `OPERATION_FAILED` when it does not fit the status range
fn count_to_status(count: u32) -> i32 {
    i32::try_from(count).unwrap_or_else(|_| {
        error!("Count {} does not fit a status return", count);
        status::OPERATION_FAILED
    })
}

fn to_flag(result: Result<bool>) -> bool {
    result.unwrap_or_else(|e| {
        trace!("{}", e);
        false
    })
}
