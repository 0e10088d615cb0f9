//! Worker thread priority derivation
//!
//! Every derived priority stays inside the guest scheduler's legal band no
//! matter what base the caller supplies.

use crate::types::{InitDataEx, ThreadPriorities, ThreadPriority};

/// Base priority used when none is supplied or the query fails
pub const DEFAULT_BASE_PRIORITY: u32 = 700;

/// Lowest base accepted before adding an offset (0x27D)
pub const MIN_BASE_PRIORITY: u32 = 637;

/// Highest base accepted before adding an offset (0x2FC)
pub const MAX_BASE_PRIORITY: u32 = 764;

/// Highest derived priority (0x2FF)
pub const MAX_PRIORITY: u32 = 767;

pub const VIDEO_DECODER_OFFSET: u32 = 5;
pub const AUDIO_DECODER_OFFSET: u32 = 6;
pub const DEMUXER_OFFSET: u32 = 9;
pub const CONTROLLER_OFFSET: u32 = 2;

/// `min(clamp(base, 637, 764) + offset, 767)`
pub const fn derive(base: u32, offset: u32) -> u32 {
    let clamped = if base < MIN_BASE_PRIORITY {
        MIN_BASE_PRIORITY
    } else if base > MAX_BASE_PRIORITY {
        MAX_BASE_PRIORITY
    } else {
        base
    };
    let priority = clamped.saturating_add(offset);
    if priority > MAX_PRIORITY {
        MAX_PRIORITY
    } else {
        priority
    }
}

/// Priorities for the simple init path
///
/// A zero base selects [`DEFAULT_BASE_PRIORITY`]. Affinities are left at 0.
pub fn from_base(base_priority: u32) -> ThreadPriorities {
    let base = if base_priority != 0 {
        base_priority
    } else {
        DEFAULT_BASE_PRIORITY
    };

    let derived = |offset| ThreadPriority {
        priority: derive(base, offset),
        affinity: 0,
    };

    ThreadPriorities {
        video_decoder: derived(VIDEO_DECODER_OFFSET),
        audio_decoder: derived(AUDIO_DECODER_OFFSET),
        demuxer: derived(DEMUXER_OFFSET),
        controller: derived(CONTROLLER_OFFSET),
    }
}

/// Priorities for the extended init path
///
/// `base_priority` is the calling thread's priority (0 selects the default).
/// Non-zero overrides are used verbatim; affinities are always copied.
pub fn from_init_ex(data: &InitDataEx, base_priority: u32) -> ThreadPriorities {
    let base = if base_priority != 0 {
        base_priority
    } else {
        DEFAULT_BASE_PRIORITY
    };

    let pick = |override_priority: u32, offset: u32, affinity: u64| ThreadPriority {
        priority: if override_priority != 0 {
            override_priority
        } else {
            derive(base, offset)
        },
        affinity,
    };

    ThreadPriorities {
        video_decoder: pick(
            data.video_decoder_priority,
            VIDEO_DECODER_OFFSET,
            data.video_decoder_affinity,
        ),
        audio_decoder: pick(
            data.audio_decoder_priority,
            AUDIO_DECODER_OFFSET,
            data.audio_decoder_affinity,
        ),
        demuxer: pick(data.demuxer_priority, DEMUXER_OFFSET, data.demuxer_affinity),
        controller: pick(
            data.controller_priority,
            CONTROLLER_OFFSET,
            data.controller_affinity,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSETS: [u32; 4] = [
        CONTROLLER_OFFSET,
        VIDEO_DECODER_OFFSET,
        AUDIO_DECODER_OFFSET,
        DEMUXER_OFFSET,
    ];

    #[test]
    fn test_derive_known_values() {
        assert_eq!(derive(0, 5), 642);
        assert_eq!(derive(700, 5), 705);
        assert_eq!(derive(1000, 9), 767);
        assert_eq!(derive(637, 2), 639);
        assert_eq!(derive(764, 2), 766);
        assert_eq!(derive(764, 9), 767);
    }

    #[test]
    fn test_derive_matches_formula_over_range() {
        for base in 0..=1000u32 {
            for offset in OFFSETS {
                let expected = (base.max(637).min(764) + offset).min(767);
                assert_eq!(derive(base, offset), expected, "base={} offset={}", base, offset);
            }
        }
    }

    #[test]
    fn test_derive_stays_in_band() {
        for base in [0, 1, 636, 637, 700, 764, 765, u32::MAX] {
            for offset in OFFSETS {
                let p = derive(base, offset);
                assert!((MIN_BASE_PRIORITY..=MAX_PRIORITY).contains(&p));
            }
        }
    }

    #[test]
    fn test_zero_base_equals_default_base() {
        assert_eq!(from_base(0), from_base(DEFAULT_BASE_PRIORITY));

        let p = from_base(0);
        assert_eq!(p.video_decoder.priority, 705);
        assert_eq!(p.audio_decoder.priority, 706);
        assert_eq!(p.demuxer.priority, 709);
        assert_eq!(p.controller.priority, 702);
    }

    #[test]
    fn test_init_ex_overrides_are_verbatim() {
        let data = InitDataEx {
            video_decoder_priority: 300,
            video_decoder_affinity: 0x3,
            demuxer_priority: 900,
            controller_affinity: 0x10,
            ..Default::default()
        };
        let p = from_init_ex(&data, 650);

        assert_eq!(p.video_decoder, ThreadPriority { priority: 300, affinity: 0x3 });
        assert_eq!(p.demuxer.priority, 900);
        assert_eq!(p.audio_decoder.priority, derive(650, AUDIO_DECODER_OFFSET));
        assert_eq!(p.controller, ThreadPriority { priority: 652, affinity: 0x10 });
    }

    #[test]
    fn test_init_ex_zero_base_falls_back_to_default() {
        let data = InitDataEx::default();
        assert_eq!(from_init_ex(&data, 0), from_base(DEFAULT_BASE_PRIORITY));
    }
}
