//! Media backend abstraction
//!
//! The player session never parses containers or decodes codecs itself. A
//! [`MediaBackend`] opens a source into a [`Demuxer`], which yields packets
//! and builds one [`StreamDecoder`] per selected stream.

pub mod symphonia_backend;

use crate::error::Result;
use crate::types::{FileReplacement, FrameDetails, StreamInfo};

pub use symphonia_backend::SymphoniaBackend;

/// One demuxed, still-encoded unit
#[derive(Debug, Clone, Default)]
pub struct Packet {
    /// Index into [`Demuxer::streams`]
    pub stream_index: u32,
    /// Presentation time in milliseconds
    pub timestamp_ms: u64,
    /// Presentation time in the stream's own time base
    pub ts: u64,
    /// Duration in the stream's own time base
    pub duration: u64,
    pub data: Vec<u8>,
}

/// One decoded unit ready for the guest
#[derive(Debug, Clone, Default)]
pub struct DecodedFrame {
    pub timestamp_ms: u64,
    pub data: Vec<u8>,
    pub details: FrameDetails,
}

/// Opens sources into demuxers
pub trait MediaBackend: Send + Sync {
    /// Open `uri`, reading through `files` when the guest supplied file callbacks
    fn open(&self, uri: &str, files: &FileReplacement) -> Result<Box<dyn Demuxer>>;
}

/// Container reader for one source
pub trait Demuxer: Send {
    fn streams(&self) -> &[StreamInfo];

    /// Next packet of any stream, `None` at end of source
    fn next_packet(&mut self) -> Result<Option<Packet>>;

    fn make_decoder(&self, stream_index: u32) -> Result<Box<dyn StreamDecoder>>;
}

/// Decoder for one stream
pub trait StreamDecoder: Send {
    /// Decode one packet; `None` when the packet produced no output
    fn decode(&mut self, packet: &Packet) -> Result<Option<DecodedFrame>>;
}
