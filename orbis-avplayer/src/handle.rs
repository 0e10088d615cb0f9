//! Player handle arena
//!
//! Guests hold an opaque [`PlayerHandle`]. The arena owns the sessions and
//! never reuses an id, so a closed or forged handle simply fails to resolve
//! instead of reaching freed state.

use crate::player::AvPlayer;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Opaque reference to one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlayerHandle(u64);

impl PlayerHandle {
    /// The null handle returned by a failed simple init
    pub const NULL: PlayerHandle = PlayerHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw id as exchanged with the guest
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        PlayerHandle(raw)
    }
}

impl fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Shared, individually locked session
pub type SharedPlayer = Arc<Mutex<AvPlayer>>;

/// Arena of live sessions keyed by handle
pub struct HandleTable {
    next_id: AtomicU64,
    players: Mutex<HashMap<u64, SharedPlayer>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            players: Mutex::new(HashMap::new()),
        }
    }

    /// Take ownership of a session and issue a fresh handle for it
    pub fn insert(&self, player: AvPlayer) -> PlayerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Arc::new(Mutex::new(player)));
        PlayerHandle(id)
    }

    /// Resolve a live handle; null and closed handles yield `None`
    pub fn get(&self, handle: PlayerHandle) -> Option<SharedPlayer> {
        if handle.is_null() {
            return None;
        }
        self.lock().get(&handle.0).cloned()
    }

    /// Detach a session from the arena; the handle is dead afterwards
    pub fn remove(&self, handle: PlayerHandle) -> Option<SharedPlayer> {
        if handle.is_null() {
            return None;
        }
        self.lock().remove(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, SharedPlayer>> {
        self.players.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
