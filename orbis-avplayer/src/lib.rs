//! # Orbis AvPlayer Library (orbis-avplayer)
//!
//! High-level emulation of the console media-player library.
//!
//! **Purpose:** Expose the guest-callable AvPlayer entry points, validate
//! their arguments, and drive one playback session per handle.
//!
//! **Architecture:** Façade → handle arena → player session with demuxer,
//! video decoder, audio decoder and controller worker threads. Decoding is
//! delegated to a pluggable [`backend::MediaBackend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod exports;
pub mod facade;
pub mod handle;
pub mod player;
pub mod priority;
pub mod status;
pub mod types;

pub use error::{Error, Result};
pub use facade::{AvPlayerLibrary, FixedThreadContext, HostThreadContext, ThreadContext};
pub use handle::PlayerHandle;
