//! Recording guest callbacks

use orbis_avplayer::types::{
    AllocateFn, DeallocateFn, Event, EventReplacement, MemoryReplacement,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Guest allocator tracking which addresses are live
#[derive(Clone, Default)]
pub struct GuestMemory {
    next: Arc<AtomicU64>,
    live: Arc<Mutex<HashSet<u64>>>,
    freed: Arc<Mutex<Vec<u64>>>,
    allocations: Arc<AtomicU64>,
    refusals: Arc<AtomicU64>,
}

impl GuestMemory {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(0x1000)),
            ..Default::default()
        }
    }

    /// Complete set of callbacks; texture and plain memory share the pool
    pub fn replacement(&self) -> MemoryReplacement {
        let allocate: AllocateFn = {
            let memory = self.clone();
            Arc::new(move |_alignment, size| {
                let refused = memory
                    .refusals
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                    .is_ok();
                if refused {
                    return 0;
                }
                let address = memory.next.fetch_add(u64::from(size.max(1)) + 0x100, Ordering::Relaxed);
                memory.allocations.fetch_add(1, Ordering::Relaxed);
                memory.live.lock().unwrap().insert(address);
                address
            })
        };
        let deallocate: DeallocateFn = {
            let memory = self.clone();
            Arc::new(move |address| {
                assert!(
                    memory.live.lock().unwrap().remove(&address),
                    "released unknown or already released address {:#x}",
                    address
                );
                memory.freed.lock().unwrap().push(address);
            })
        };

        MemoryReplacement {
            allocate: Some(Arc::clone(&allocate)),
            deallocate: Some(Arc::clone(&deallocate)),
            allocate_texture: Some(allocate),
            deallocate_texture: Some(deallocate),
        }
    }

    /// Allocator that always refuses
    pub fn exhausted() -> MemoryReplacement {
        let allocate: AllocateFn = Arc::new(|_, _| 0);
        let deallocate: DeallocateFn = Arc::new(|_| {});
        MemoryReplacement {
            allocate: Some(Arc::clone(&allocate)),
            deallocate: Some(Arc::clone(&deallocate)),
            allocate_texture: Some(allocate),
            deallocate_texture: Some(deallocate),
        }
    }

    /// Make the next `count` allocations return 0
    pub fn refuse_next(&self, count: u64) {
        self.refusals.store(count, Ordering::Relaxed);
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn allocation_count(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn freed(&self) -> Vec<u64> {
        self.freed.lock().unwrap().clone()
    }
}

/// Guest event callback recording event ids
#[derive(Clone, Default)]
pub struct GuestEvents {
    seen: Arc<Mutex<Vec<i32>>>,
}

impl GuestEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replacement(&self) -> EventReplacement {
        let seen = Arc::clone(&self.seen);
        EventReplacement {
            event_callback: Some(Arc::new(move |id: i32, _: i32| seen.lock().unwrap().push(id))),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|id| Event::from_id(*id))
            .collect()
    }

    pub fn count(&self, event: Event) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    /// Wait until `event` was seen at least `times` times
    pub fn wait_for(&self, event: Event, times: usize) -> bool {
        wait_for(Duration::from_secs(2), || self.count(event) >= times)
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
