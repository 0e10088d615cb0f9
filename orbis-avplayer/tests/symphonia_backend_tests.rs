//! Symphonia host backend tests
//!
//! Decodes generated WAV files directly and through the library entry
//! points, from the host file system and through guest file callbacks.

mod helpers;

use helpers::audio_generator::{generate_sine_wav, TEST_SAMPLE_RATE};
use helpers::{wait_for, GuestEvents, GuestMemory};
use orbis_avplayer::backend::{MediaBackend, SymphoniaBackend};
use orbis_avplayer::config::AvPlayerConfig;
use orbis_avplayer::status;
use orbis_avplayer::types::{
    FileCloseFn, FileOpenFn, FileReadOffsetFn, FileReplacement, FileSizeFn, FrameDetails,
    FrameInfo, InitData, StreamDetails, StreamInfo, StreamType,
};
use orbis_avplayer::{AvPlayerLibrary, FixedThreadContext};
use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Bytes of interleaved s16 stereo PCM for `duration_ms`
fn expected_bytes(duration_ms: u64) -> usize {
    (TEST_SAMPLE_RATE as u64 * duration_ms / 1000) as usize * 2 * 2
}

fn sine_file(dir: &TempDir, duration_ms: u64) -> String {
    let path = dir.path().join("sine.wav");
    generate_sine_wav(&path, duration_ms, 440.0).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_probe_and_decode_wav() {
    let dir = tempfile::tempdir().unwrap();
    let file = sine_file(&dir, 500);

    let mut demuxer = SymphoniaBackend
        .open(&file, &FileReplacement::default())
        .unwrap();

    let streams = demuxer.streams().to_vec();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].stream_type, StreamType::Audio);
    match &streams[0].details {
        StreamDetails::Audio(a) => {
            assert_eq!(a.channel_count, 2);
            assert_eq!(a.sample_rate, TEST_SAMPLE_RATE);
        }
        other => panic!("Expected audio details, got {:?}", other),
    }
    assert!((490..=510).contains(&streams[0].duration_ms));

    let mut decoder = demuxer.make_decoder(0).unwrap();
    let mut bytes = 0;
    let mut last_ts = None;
    while let Some(packet) = demuxer.next_packet().unwrap() {
        if let Some(frame) = decoder.decode(&packet).unwrap() {
            if let Some(last) = last_ts {
                assert!(frame.timestamp_ms >= last, "timestamps must not go backwards");
            }
            last_ts = Some(frame.timestamp_ms);
            bytes += frame.data.len();
        }
    }
    assert_eq!(bytes, expected_bytes(500));
}

#[test]
fn test_missing_file_fails_to_open() {
    let result = SymphoniaBackend.open("/nonexistent/orbis/sine.wav", &FileReplacement::default());
    assert!(result.is_err());
}

#[test]
fn test_unknown_stream_has_no_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let file = sine_file(&dir, 100);

    let demuxer = SymphoniaBackend.open(&file, &FileReplacement::default()).unwrap();
    assert!(demuxer.make_decoder(3).is_err());
}

/// File callbacks backed by host files, tracking open descriptors
fn guest_files(open_count: Arc<AtomicI32>) -> FileReplacement {
    let files: Arc<Mutex<HashMap<i32, File>>> = Arc::new(Mutex::new(HashMap::new()));
    let next_fd = Arc::new(AtomicI32::new(3));

    let open: FileOpenFn = {
        let files = Arc::clone(&files);
        let open_count = Arc::clone(&open_count);
        Arc::new(move |path: &str| match File::open(Path::new(path)) {
            Ok(file) => {
                let fd = next_fd.fetch_add(1, Ordering::Relaxed);
                files.lock().unwrap().insert(fd, file);
                open_count.fetch_add(1, Ordering::Relaxed);
                fd
            }
            Err(_) => -1,
        })
    };
    let close: FileCloseFn = {
        let files = Arc::clone(&files);
        Arc::new(move |fd: i32| match files.lock().unwrap().remove(&fd) {
            Some(_) => {
                open_count.fetch_sub(1, Ordering::Relaxed);
                0
            }
            None => -1,
        })
    };
    let read_offset: FileReadOffsetFn = {
        let files = Arc::clone(&files);
        Arc::new(move |fd: i32, offset: u64, buf: &mut [u8]| {
            let files = files.lock().unwrap();
            match files.get(&fd).map(|f| f.read_at(buf, offset)) {
                Some(Ok(n)) => n as i32,
                _ => -1,
            }
        })
    };
    let size: FileSizeFn = Arc::new(move |fd: i32| {
        files
            .lock()
            .unwrap()
            .get(&fd)
            .and_then(|f| f.metadata().ok())
            .map(|m| m.len())
            .unwrap_or(0)
    });

    FileReplacement {
        open: Some(open),
        close: Some(close),
        read_offset: Some(read_offset),
        size: Some(size),
    }
}

fn play_to_end(files: FileReplacement, file: &str) -> usize {
    let lib = AvPlayerLibrary::new(
        Arc::new(SymphoniaBackend),
        AvPlayerConfig::default(),
        Arc::new(FixedThreadContext(None)),
    );
    let memory = GuestMemory::new();
    let data = InitData {
        memory_replacement: memory.replacement(),
        file_replacement: files,
        event_replacement: GuestEvents::new().replacement(),
        ..Default::default()
    };
    let handle = lib.init(Some(&data));
    assert!(!handle.is_null());

    assert_eq!(lib.add_source(handle, Some(file)), status::OK);
    assert_eq!(lib.stream_count(handle), 1);
    let mut info = StreamInfo::default();
    assert_eq!(lib.get_stream_info(handle, 0, Some(&mut info)), status::OK);
    assert_eq!(info.stream_type, StreamType::Audio);

    assert_eq!(lib.enable_stream(handle, 0), status::OK);
    assert_eq!(lib.start(handle), status::OK);

    let mut bytes = 0;
    let finished = wait_for(Duration::from_secs(10), || {
        let mut frame = FrameInfo::default();
        while lib.get_audio_data(handle, Some(&mut frame)) {
            assert!(matches!(frame.details, FrameDetails::Audio(_)));
            bytes += frame.data.len();
        }
        !lib.is_active(handle)
    });
    assert!(finished, "playback did not drain");
    assert!(lib.current_time(handle) > 0);

    assert_eq!(lib.close(handle), status::OK);
    assert_eq!(memory.live_count(), 0);
    bytes
}

#[test]
fn test_library_plays_host_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = sine_file(&dir, 300);

    assert_eq!(play_to_end(FileReplacement::default(), &file), expected_bytes(300));
}

#[test]
fn test_library_reads_through_guest_file_callbacks() {
    let dir = tempfile::tempdir().unwrap();
    let file = sine_file(&dir, 300);
    let open_count = Arc::new(AtomicI32::new(0));

    let bytes = play_to_end(guest_files(Arc::clone(&open_count)), &file);
    assert_eq!(bytes, expected_bytes(300));

    // The guest descriptor was closed with the session
    assert_eq!(open_count.load(Ordering::Relaxed), 0);
}
