// src/snapshot.rs
//
// 单槽快照交换: 轮询端 publish，绘图端 borrow_and_clear 拿一份私有拷贝。
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::types::Snapshot;

const IDLE: u8 = 0;
const READING: u8 = 1;
const WRITING: u8 = 2;

#[derive(Debug)]
pub enum Publish {
    /// Stored; carries the new generation number.
    Published(u64),
    /// A reader held the guard. The snapshot comes back so the caller can retry.
    Deferred(Box<Snapshot>),
}

/// A renderer's private copy of the current snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Borrowed {
    pub generation: u64,
    pub snapshot: Snapshot,
}

/// Single-writer / single-reader exchange of the latest decoded waveform.
///
/// The phase word is the two-phase guard: while a reader holds it no publish may land,
/// and while a publish is in flight no reader may start. Neither side ever waits.
#[derive(Default)]
pub struct SnapshotCoordinator {
    slot: ArcSwapOption<Snapshot>,
    phase: AtomicU8,
    generation: AtomicU64,
}

/// Guard asserted by a reader; publishing is deferred until it drops.
pub struct ReadHold<'a> {
    owner: &'a SnapshotCoordinator,
}

impl ReadHold<'_> {
    pub fn copy(&self) -> Option<Borrowed> {
        let current = self.owner.slot.load_full()?;
        Some(Borrowed {
            generation: self.owner.generation.load(Ordering::Acquire),
            snapshot: Snapshot::clone(&current),
        })
    }
}

impl Drop for ReadHold<'_> {
    fn drop(&mut self) {
        self.owner.phase.store(IDLE, Ordering::Release);
    }
}

impl SnapshotCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: Box<Snapshot>) -> Publish {
        if self
            .phase
            .compare_exchange(IDLE, WRITING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::trace!("publish deferred, snapshot in use");
            return Publish::Deferred(snapshot);
        }
        self.slot.store(Some(Arc::from(snapshot)));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.phase.store(IDLE, Ordering::Release);
        Publish::Published(generation)
    }

    /// Assert the read guard, or `None` while a publish is in flight.
    pub fn hold(&self) -> Option<ReadHold<'_>> {
        self.phase
            .compare_exchange(IDLE, READING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReadHold { owner: self })
    }

    /// Copy the current snapshot and release the guard straight away. `None` when nothing
    /// has been published yet or a publish is in flight; callers keep their last copy.
    pub fn borrow_and_clear(&self) -> Option<Borrowed> {
        let hold = self.hold()?;
        hold.copy()
    }

    pub fn is_busy(&self) -> bool {
        self.phase.load(Ordering::Acquire) != IDLE
    }

    /// Bumped on every successful publish; 0 means nothing published yet.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::las::PointRecord;
    use crate::types::{Bounds, SourceInfo, Waveform};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;

    pub(crate) fn snapshot_of(tag: u32, len: usize) -> Box<Snapshot> {
        Box::new(Snapshot {
            waveform: Waveform {
                samples: vec![tag; len],
                bounds: Bounds::for_waveform(len, 8),
                bits_per_sample: 8,
                temporal_spacing: 1,
                return_bin: 0,
            },
            point: PointRecord::default(),
            source: SourceInfo {
                path: PathBuf::from("/data/a.las"),
                record_number: tag,
                version_minor: 4,
                point_data_format: 4,
                global_encoding: 2,
            },
        })
    }

    #[test]
    fn nothing_to_borrow_before_first_publish() {
        let coordinator = SnapshotCoordinator::new();
        assert!(coordinator.borrow_and_clear().is_none());
        assert_eq!(coordinator.generation(), 0);
        assert!(!coordinator.is_busy());
    }

    #[test]
    fn borrowing_twice_returns_the_same_copy() {
        let coordinator = SnapshotCoordinator::new();
        assert!(matches!(
            coordinator.publish(snapshot_of(3, 16)),
            Publish::Published(1)
        ));
        let first = coordinator.borrow_and_clear().unwrap();
        let second = coordinator.borrow_and_clear().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.snapshot.source.record_number, 3);
    }

    #[test]
    fn publish_while_held_is_deferred() {
        let coordinator = SnapshotCoordinator::new();
        coordinator.publish(snapshot_of(1, 8));
        let hold = coordinator.hold().unwrap();
        let copy = hold.copy().unwrap();
        let returned = match coordinator.publish(snapshot_of(2, 8)) {
            Publish::Deferred(s) => s,
            other => panic!("expected deferral, got {other:?}"),
        };
        assert!(coordinator.is_busy());
        assert_eq!(copy.snapshot.waveform.samples, vec![1; 8]);
        drop(hold);
        assert!(matches!(coordinator.publish(returned), Publish::Published(2)));
        assert_eq!(
            coordinator.borrow_and_clear().unwrap().snapshot.waveform.samples,
            vec![2; 8]
        );
    }

    #[test]
    fn concurrent_readers_never_see_a_mixed_snapshot() {
        let coordinator = Arc::new(SnapshotCoordinator::new());
        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let coordinator = Arc::clone(&coordinator);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut deferred = 0u32;
                for tag in 1..=2_000u32 {
                    let mut pending = snapshot_of(tag, 64 + (tag as usize % 7));
                    loop {
                        match coordinator.publish(pending) {
                            Publish::Published(_) => break,
                            Publish::Deferred(back) => {
                                deferred += 1;
                                pending = back;
                                std::thread::yield_now();
                            }
                        }
                    }
                }
                done.store(true, Ordering::Release);
                deferred
            })
        };
        let mut seen = 0u32;
        while !done.load(Ordering::Acquire) {
            if let Some(b) = coordinator.borrow_and_clear() {
                let tag = b.snapshot.source.record_number;
                assert_eq!(b.snapshot.waveform.samples.len(), 64 + (tag as usize % 7));
                assert!(b.snapshot.waveform.samples.iter().all(|&s| s == tag));
                assert!(tag >= seen, "snapshots went backwards");
                seen = tag;
            }
        }
        writer.join().unwrap();
        let last = coordinator.borrow_and_clear().unwrap();
        assert_eq!(last.snapshot.source.record_number, 2_000);
        assert_eq!(last.generation, 2_000);
    }
}
