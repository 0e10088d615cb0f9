//! In-memory media backend
//!
//! Every packet decodes to exactly one frame whose payload is the packet's
//! data, so tests can follow individual packets through the pipeline.

use orbis_avplayer::backend::{DecodedFrame, Demuxer, MediaBackend, Packet, StreamDecoder};
use orbis_avplayer::types::{
    AudioFrameDetails, AudioStreamDetails, FileReplacement, FrameDetails, StreamDetails,
    StreamInfo, StreamType, VideoFrameDetails, VideoStreamDetails,
};
use orbis_avplayer::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn audio_stream(sample_rate: u32) -> StreamInfo {
    StreamInfo {
        stream_type: StreamType::Audio,
        details: StreamDetails::Audio(AudioStreamDetails {
            channel_count: 2,
            sample_rate,
            language_code: "en".to_string(),
        }),
        duration_ms: 1000,
        start_time_ms: 0,
    }
}

pub fn video_stream(width: u32, height: u32) -> StreamInfo {
    StreamInfo {
        stream_type: StreamType::Video,
        details: StreamDetails::Video(VideoStreamDetails {
            width,
            height,
            aspect_ratio: width as f32 / height as f32,
            language_code: String::new(),
        }),
        duration_ms: 1000,
        start_time_ms: 0,
    }
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    streams: Vec<StreamInfo>,
    packets: Vec<Packet>,
    fail_after: Option<usize>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    /// Source with one audio and one video stream, `frames` packets each, 10ms apart
    pub fn audio_video(frames: u64) -> Self {
        let streams = vec![video_stream(1920, 1080), audio_stream(48000)];
        let mut packets = Vec::new();
        for i in 0..frames {
            packets.push(packet(0, i * 10));
            packets.push(packet(1, i * 10));
        }
        Self::new(streams, packets)
    }

    pub fn new(streams: Vec<StreamInfo>, packets: Vec<Packet>) -> Self {
        Self {
            streams,
            packets,
            fail_after: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reading fails after `packets` packets were delivered
    pub fn failing_after(mut self, packets: usize) -> Self {
        self.fail_after = Some(packets);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

pub fn packet(stream_index: u32, timestamp_ms: u64) -> Packet {
    Packet {
        stream_index,
        timestamp_ms,
        ts: timestamp_ms,
        duration: 10,
        data: vec![stream_index as u8; 16],
    }
}

impl MediaBackend for ScriptedBackend {
    fn open(&self, uri: &str, _files: &FileReplacement) -> Result<Box<dyn Demuxer>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        if uri.starts_with("missing") {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                uri.to_string(),
            )));
        }
        Ok(Box::new(ScriptedDemuxer {
            streams: self.streams.clone(),
            packets: self.packets.clone().into_iter(),
            fail_after: self.fail_after,
        }))
    }
}

struct ScriptedDemuxer {
    streams: Vec<StreamInfo>,
    packets: std::vec::IntoIter<Packet>,
    fail_after: Option<usize>,
}

impl Demuxer for ScriptedDemuxer {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        match self.fail_after.as_mut() {
            Some(0) => return Err(Error::Backend("corrupt packet".to_string())),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        Ok(self.packets.next())
    }

    fn make_decoder(&self, stream_index: u32) -> Result<Box<dyn StreamDecoder>> {
        let stream = self
            .streams
            .get(stream_index as usize)
            .ok_or_else(|| Error::InvalidParams(format!("No stream {}", stream_index)))?;
        Ok(Box::new(ScriptedDecoder {
            details: stream.details.clone(),
        }))
    }
}

struct ScriptedDecoder {
    details: StreamDetails,
}

impl StreamDecoder for ScriptedDecoder {
    fn decode(&mut self, packet: &Packet) -> Result<Option<DecodedFrame>> {
        let details = match &self.details {
            StreamDetails::Audio(a) => FrameDetails::Audio(AudioFrameDetails {
                channel_count: a.channel_count,
                sample_rate: a.sample_rate,
                size: packet.data.len() as u32,
            }),
            StreamDetails::Video(v) => FrameDetails::Video(VideoFrameDetails {
                width: v.width,
                height: v.height,
                aspect_ratio: v.aspect_ratio,
            }),
            _ => FrameDetails::None,
        };
        Ok(Some(DecodedFrame {
            timestamp_ms: packet.timestamp_ms,
            data: packet.data.clone(),
            details,
        }))
    }
}
