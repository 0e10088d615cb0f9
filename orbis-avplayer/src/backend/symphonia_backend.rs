//! Host audio backend using symphonia
//!
//! Probes the source container, exposes its audio tracks as streams and
//! decodes packets to interleaved signed 16-bit little-endian PCM. Video
//! tracks are not supported by symphonia and are not listed.

use super::{DecodedFrame, Demuxer, MediaBackend, Packet, StreamDecoder};
use crate::error::{Error, Result};
use crate::types::{
    AudioFrameDetails, AudioStreamDetails, FileCloseFn, FileReadOffsetFn, FileReplacement,
    FrameDetails, StreamDetails, StreamInfo, StreamType,
};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::{debug, warn};

/// Media backend decoding host audio formats (MP3, FLAC, AAC, Vorbis, WAV)
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaBackend;

impl MediaBackend for SymphoniaBackend {
    fn open(&self, uri: &str, files: &FileReplacement) -> Result<Box<dyn Demuxer>> {
        let source: Box<dyn MediaSource> = if files.is_complete() {
            debug!("Opening {} through guest file callbacks", uri);
            Box::new(GuestFile::open(uri, files)?)
        } else {
            debug!("Opening {} from host file system", uri);
            Box::new(std::fs::File::open(uri)?)
        };

        let mss = MediaSourceStream::new(source, Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext_str) = Path::new(uri).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Backend(format!("Failed to probe format of {}: {}", uri, e)))?;

        let format = probed.format;
        let tracks: Vec<Track> = format
            .tracks()
            .iter()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .cloned()
            .collect();

        if tracks.is_empty() {
            return Err(Error::NotSupported(format!("No decodable stream in {}", uri)));
        }

        let streams = tracks.iter().map(stream_info).collect();
        debug!("Probed {}: {} stream(s)", uri, tracks.len());

        Ok(Box::new(SymphoniaDemuxer {
            format,
            tracks,
            streams,
        }))
    }
}

fn stream_info(track: &Track) -> StreamInfo {
    let params = &track.codec_params;
    let duration_ms = match (params.time_base, params.n_frames) {
        (Some(tb), Some(n_frames)) => to_millis(tb, n_frames),
        _ => 0,
    };
    let start_time_ms = params.time_base.map(|tb| to_millis(tb, params.start_ts)).unwrap_or(0);

    StreamInfo {
        stream_type: StreamType::Audio,
        details: StreamDetails::Audio(AudioStreamDetails {
            channel_count: params.channels.map(|c| c.count() as u16).unwrap_or(0),
            sample_rate: params.sample_rate.unwrap_or(0),
            language_code: track.language.clone().unwrap_or_default(),
        }),
        duration_ms,
        start_time_ms,
    }
}

fn to_millis(time_base: TimeBase, ts: u64) -> u64 {
    let time = time_base.calc_time(ts);
    time.seconds * 1000 + (time.frac * 1000.0) as u64
}

struct SymphoniaDemuxer {
    format: Box<dyn FormatReader>,
    tracks: Vec<Track>,
    streams: Vec<StreamInfo>,
}

impl Demuxer for SymphoniaDemuxer {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of source");
                    return Ok(None);
                }
                Err(e) => return Err(Error::Backend(format!("Failed to read packet: {}", e))),
            };

            // Skip packets for tracks that were not listed
            let Some(index) = self.tracks.iter().position(|t| t.id == packet.track_id()) else {
                continue;
            };

            let timestamp_ms = self.tracks[index]
                .codec_params
                .time_base
                .map(|tb| to_millis(tb, packet.ts()))
                .unwrap_or(0);

            return Ok(Some(Packet {
                stream_index: index as u32,
                timestamp_ms,
                ts: packet.ts(),
                duration: packet.dur(),
                data: packet.buf().to_vec(),
            }));
        }
    }

    fn make_decoder(&self, stream_index: u32) -> Result<Box<dyn StreamDecoder>> {
        let track = self
            .tracks
            .get(stream_index as usize)
            .ok_or_else(|| Error::InvalidParams(format!("No stream {}", stream_index)))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::NotSupported(format!("Failed to create decoder: {}", e)))?;

        Ok(Box::new(SymphoniaDecoder {
            decoder,
            track_id: track.id,
        }))
    }
}

struct SymphoniaDecoder {
    decoder: Box<dyn Decoder>,
    track_id: u32,
}

impl StreamDecoder for SymphoniaDecoder {
    fn decode(&mut self, packet: &Packet) -> Result<Option<DecodedFrame>> {
        let sym_packet = symphonia::core::formats::Packet::new_from_slice(
            self.track_id,
            packet.ts,
            packet.duration,
            &packet.data,
        );

        let decoded = match self.decoder.decode(&sym_packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packets are skipped, the stream continues
                warn!("Decode error at {}ms: {}", packet.timestamp_ms, e);
                return Ok(None);
            }
            Err(e) => return Err(Error::Backend(format!("Decoder failed: {}", e))),
        };

        let spec = *decoded.spec();
        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        let data: Vec<u8> = samples
            .samples()
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        Ok(Some(DecodedFrame {
            timestamp_ms: packet.timestamp_ms,
            details: FrameDetails::Audio(AudioFrameDetails {
                channel_count: spec.channels.count() as u16,
                sample_rate: spec.rate,
                size: data.len() as u32,
            }),
            data,
        }))
    }
}

/// Source read through the guest's file callbacks
struct GuestFile {
    fd: i32,
    size: u64,
    position: u64,
    read_offset: FileReadOffsetFn,
    close: FileCloseFn,
}

impl GuestFile {
    fn open(uri: &str, files: &FileReplacement) -> Result<Self> {
        let (Some(open), Some(close), Some(read_offset), Some(size)) =
            (&files.open, &files.close, &files.read_offset, &files.size)
        else {
            return Err(Error::InvalidParams("Incomplete file callbacks".to_string()));
        };

        let fd = open(uri);
        if fd < 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Guest open of {} failed with {}", uri, fd),
            )));
        }

        Ok(Self {
            fd,
            size: size(fd),
            position: 0,
            read_offset: read_offset.clone(),
            close: close.clone(),
        })
    }
}

impl Read for GuestFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let remaining = (self.size - self.position).min(buf.len() as u64) as usize;
        let read = (self.read_offset)(self.fd, self.position, &mut buf[..remaining]);
        if read < 0 {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("Guest read failed with {}", read),
            ));
        }
        self.position += read as u64;
        Ok(read as usize)
    }
}

impl Seek for GuestFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "Seek before start of file")),
        }
    }
}

impl MediaSource for GuestFile {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.size)
    }
}

impl Drop for GuestFile {
    fn drop(&mut self) {
        let status = (self.close)(self.fd);
        if status < 0 {
            warn!("Guest close of descriptor {} failed with {}", self.fd, status);
        }
    }
}
