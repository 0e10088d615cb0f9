//! AvPlayer probe (avplayer-probe) - Main entry point
//!
//! Drives the libSceAvPlayer entry points against a host media file the way
//! a guest would: init, add source, list streams, play a number of audio
//! frames, close.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use orbis_avplayer::backend::SymphoniaBackend;
use orbis_avplayer::config::AvPlayerConfig;
use orbis_avplayer::status;
use orbis_avplayer::types::{
    AllocateFn, DeallocateFn, Event, EventReplacement, FrameDetails, FrameInfo, InitData,
    MemoryReplacement, StreamDetails, StreamInfo, StreamType,
};
use orbis_avplayer::{AvPlayerLibrary, HostThreadContext};
use orbis_common::{SettingEntry, Settings};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for a frame before giving up
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for avplayer-probe
#[derive(Parser, Debug)]
#[command(name = "avplayer-probe")]
#[command(about = "Play a media file through the AvPlayer HLE library")]
#[command(version)]
struct Args {
    /// Media file to open
    file: PathBuf,

    /// Guest base priority for worker threads (0 = library default)
    #[arg(short, long, default_value = "0", env = "ORBIS_AVPLAYER_BASE_PRIORITY")]
    base_priority: u32,

    /// Number of audio frames to fetch before stopping
    #[arg(short, long, default_value = "64")]
    frames: u32,

    /// Configuration file (defaults to avplayer.toml in the config directory)
    #[arg(short, long, env = "ORBIS_AVPLAYER_CONFIG")]
    config: Option<PathBuf>,

    /// Do not record the file in the recent sources list
    #[arg(long)]
    no_history: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(AvPlayerConfig::default_path);
    let config = AvPlayerConfig::load(&config_path);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("orbis_avplayer={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration: {}", config_path.display());

    let library = AvPlayerLibrary::new(
        Arc::new(SymphoniaBackend),
        config,
        Arc::new(HostThreadContext),
    );

    let file = args
        .file
        .to_str()
        .context("Media file path is not valid UTF-8")?
        .to_string();

    let data = InitData {
        memory_replacement: host_memory(),
        event_replacement: EventReplacement {
            event_callback: Some(Arc::new(|id: i32, _: i32| match Event::from_id(id) {
                Some(event) => info!("Event: {:?}", event),
                None => warn!("Unknown event {:#x}", id),
            })),
        },
        base_priority: args.base_priority,
        default_language: "en".to_string(),
        ..Default::default()
    };

    let handle = library.init(Some(&data));
    if handle.is_null() {
        bail!("sceAvPlayerInit failed");
    }

    let result = play(&library, handle, &file, args.frames);
    let close = library.close(handle);
    if close != status::OK {
        warn!("sceAvPlayerClose returned {}", status::name(close));
    }

    let streams = result?;
    if !args.no_history {
        if let Err(e) = remember_source(&file, &streams) {
            warn!("Failed to update recent sources: {}", e);
        }
    }

    Ok(())
}

fn play(
    library: &AvPlayerLibrary,
    handle: orbis_avplayer::PlayerHandle,
    file: &str,
    frames: u32,
) -> Result<Vec<StreamInfo>> {
    check(library.add_source(handle, Some(file)), "sceAvPlayerAddSource")?;

    let count = library.stream_count(handle);
    if count < 0 {
        bail!("sceAvPlayerStreamCount failed: {}", status::name(count));
    }

    let mut streams = Vec::with_capacity(count as usize);
    for stream_id in 0..count as u32 {
        let mut info = StreamInfo::default();
        check(
            library.get_stream_info(handle, stream_id, Some(&mut info)),
            "sceAvPlayerGetStreamInfo",
        )?;
        println!("stream {}: {}", stream_id, describe(&info));
        streams.push(info);
    }

    let Some(audio) = streams.iter().position(|s| s.stream_type == StreamType::Audio) else {
        println!("no audio stream to play");
        return Ok(streams);
    };
    check(library.enable_stream(handle, audio as u32), "sceAvPlayerEnableStream")?;
    check(library.start(handle), "sceAvPlayerStart")?;

    let mut delivered = 0;
    let mut bytes = 0usize;
    let mut last_frame = Instant::now();
    while delivered < frames {
        let mut info = FrameInfo::default();
        if library.get_audio_data(handle, Some(&mut info)) {
            delivered += 1;
            bytes += info.data.len();
            last_frame = Instant::now();
            if let FrameDetails::Audio(details) = info.details {
                debug!(
                    "Frame {} at {}ms: {} channel(s) @ {}Hz, {} bytes",
                    delivered,
                    info.timestamp_ms,
                    details.channel_count,
                    details.sample_rate,
                    details.size
                );
            }
            continue;
        }

        if !library.is_active(handle) {
            info!("Playback finished");
            break;
        }
        if last_frame.elapsed() > FRAME_TIMEOUT {
            warn!("No frame within {:?}, giving up", FRAME_TIMEOUT);
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    println!(
        "played {} frame(s), {} bytes, current time {}ms",
        delivered,
        bytes,
        library.current_time(handle)
    );

    if library.is_active(handle) {
        check(library.stop(handle), "sceAvPlayerStop")?;
    }
    Ok(streams)
}

fn check(code: i32, operation: &str) -> Result<()> {
    if code < 0 {
        bail!("{} failed: {}", operation, status::name(code));
    }
    Ok(())
}

fn describe(info: &StreamInfo) -> String {
    let details = match &info.details {
        StreamDetails::Audio(a) => format!(
            "audio, {} channel(s) @ {}Hz, language '{}'",
            a.channel_count, a.sample_rate, a.language_code
        ),
        StreamDetails::Video(v) => format!(
            "video, {}x{} (aspect {:.2}), language '{}'",
            v.width, v.height, v.aspect_ratio, v.language_code
        ),
        StreamDetails::TimedText { language_code } => {
            format!("timed text, language '{}'", language_code)
        }
        StreamDetails::None => "unknown".to_string(),
    };
    format!("{}, {}ms", details, info.duration_ms)
}

/// Bump allocator standing in for guest memory
fn host_memory() -> MemoryReplacement {
    let next = Arc::new(AtomicU64::new(0x1_0000_0000));
    let allocate: AllocateFn = Arc::new(move |alignment, size| {
        let align = u64::from(alignment.max(1));
        let size = (u64::from(size) + align - 1) / align * align;
        next.fetch_add(size.max(align), Ordering::Relaxed)
    });
    let deallocate: DeallocateFn = Arc::new(|_| {});

    MemoryReplacement {
        allocate: Some(Arc::clone(&allocate)),
        deallocate: Some(Arc::clone(&deallocate)),
        allocate_texture: Some(allocate),
        deallocate_texture: Some(deallocate),
    }
}

/// Number of entries kept in the recent sources list
const RECENT_SOURCES_LIMIT: usize = 10;

fn remember_source(file: &str, streams: &[StreamInfo]) -> Result<()> {
    let settings = Settings::open_default().context("Failed to open settings")?;
    let entry = SettingEntry::new("probe", "recent_sources", toml::Value::Array(Vec::new()));

    let mut recent = Settings::value_to_list(&settings.entry_value(&entry));
    recent.retain(|(path, _)| path != file);
    recent.insert(0, (file.to_string(), format!("{} stream(s)", streams.len())));
    recent.truncate(RECENT_SOURCES_LIMIT);

    settings
        .set_entry(&entry, Settings::list_to_value(&recent))
        .context("Failed to save settings")?;
    Ok(())
}
