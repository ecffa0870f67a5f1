use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Single-slot guard for overlapping requests.
///
/// Each request takes a ticket on start. Only the holder of the most
/// recent ticket may publish its result: last writer wins.
#[derive(Debug, Clone, Default)]
pub struct RequestSlot {
    latest: Arc<AtomicU64>,
}

#[derive(Debug)]
pub struct RequestTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RequestSlot {
    pub fn new() -> RequestSlot {
        RequestSlot::default()
    }

    pub fn begin(&self) -> RequestTicket {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        RequestTicket { generation, latest: self.latest.clone() }
    }

    /// Generation of the most recently started request, 0 if none.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes() {
        let slot = RequestSlot::new();
        assert_eq!(slot.latest(), 0);
        let first = slot.begin();
        assert!(first.is_current());
        let second = slot.begin();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!((first.generation(), second.generation()), (1, 2));
    }

    #[test]
    fn tickets_are_unique_across_threads() {
        let slot = RequestSlot::new();
        let mut generations: Vec<u64> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8).map(|_| s.spawn(|| slot.begin().generation())).collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        generations.sort();
        assert_eq!(generations, (1..=8).collect::<Vec<_>>());
        assert_eq!(slot.latest(), 8);
    }
}
