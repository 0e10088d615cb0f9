//! Test helper modules for orbis-avplayer integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedBackend: in-memory media backend with a fixed stream table
//! - GuestMemory / GuestEvents: recording guest callbacks
//! - Audio generator: WAV files for the symphonia backend

#![allow(dead_code)]

pub mod audio_generator;
pub mod guest;
pub mod scripted_backend;

pub use guest::{wait_for, GuestEvents, GuestMemory};
pub use scripted_backend::{audio_stream, video_stream, ScriptedBackend};

use orbis_avplayer::config::AvPlayerConfig;
use orbis_avplayer::types::InitData;
use orbis_avplayer::{AvPlayerLibrary, FixedThreadContext};
use std::sync::Arc;

/// Library over `backend` with default configuration and a failing priority query
pub fn library(backend: ScriptedBackend) -> AvPlayerLibrary {
    library_with_priority(backend, None)
}

pub fn library_with_priority(backend: ScriptedBackend, priority: Option<u32>) -> AvPlayerLibrary {
    AvPlayerLibrary::new(
        Arc::new(backend),
        AvPlayerConfig::default(),
        Arc::new(FixedThreadContext(priority)),
    )
}

/// Init data with complete recording allocators and an event recorder
pub fn init_data(memory: &GuestMemory, events: &GuestEvents) -> InitData {
    InitData {
        memory_replacement: memory.replacement(),
        event_replacement: events.replacement(),
        default_language: "en".to_string(),
        ..Default::default()
    }
}
