//! Player session state

use crate::types::StreamType;

/// Lifecycle state of a live session
///
/// `Uninitialized` and `Destroyed` are outside a session's lifetime: they
/// correspond to "no handle yet" and "handle closed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Initialized, no source added
    Idle,
    /// Source added, workers not running
    Ready,
    /// Workers running
    Active,
}

impl PlayerState {
    /// Stream selection and frame retrieval need a source
    pub fn has_source(self) -> bool {
        matches!(self, PlayerState::Ready | PlayerState::Active)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Active => write!(f, "active"),
        }
    }
}

/// Currently selected stream per kind
///
/// At most one video and one audio stream are routed to decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSelection {
    pub video: Option<u32>,
    pub audio: Option<u32>,
}

impl StreamSelection {
    pub fn get(&self, kind: StreamType) -> Option<u32> {
        match kind {
            StreamType::Video => self.video,
            StreamType::Audio => self.audio,
            StreamType::TimedText | StreamType::Unknown => None,
        }
    }

    /// Select `stream_id` for `kind`; returns false for kinds that are not decoded
    pub fn select(&mut self, kind: StreamType, stream_id: u32) -> bool {
        match kind {
            StreamType::Video => self.video = Some(stream_id),
            StreamType::Audio => self.audio = Some(stream_id),
            StreamType::TimedText | StreamType::Unknown => return false,
        }
        true
    }

    /// Clear the selection if it currently points at `stream_id`
    pub fn deselect(&mut self, stream_id: u32) -> bool {
        if self.video == Some(stream_id) {
            self.video = None;
            true
        } else if self.audio == Some(stream_id) {
            self.audio = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_replaces_same_kind() {
        let mut sel = StreamSelection::default();
        assert!(sel.select(StreamType::Audio, 1));
        assert!(sel.select(StreamType::Audio, 3));
        assert_eq!(sel.audio, Some(3));
        assert_eq!(sel.video, None);
    }

    #[test]
    fn test_timed_text_is_not_selectable() {
        let mut sel = StreamSelection::default();
        assert!(!sel.select(StreamType::TimedText, 2));
        assert_eq!(sel, StreamSelection::default());
    }

    #[test]
    fn test_deselect_only_matching() {
        let mut sel = StreamSelection {
            video: Some(0),
            audio: Some(1),
        };
        assert!(!sel.deselect(5));
        assert!(sel.deselect(1));
        assert_eq!(sel.audio, None);
        assert_eq!(sel.video, Some(0));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PlayerState::Active.to_string(), "active");
        assert!(PlayerState::Ready.has_source());
        assert!(!PlayerState::Idle.has_source());
    }
}
