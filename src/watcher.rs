// src/watcher.rs
//
// 定时轮询 mailbox: 检测新选择 / 强制重绘请求，每次变化只提取一次。
use crate::las::{ExtractError, Extraction, NoWaveformsReason, WaveformExtractor};
use crate::mailbox::{
    MailboxLock, SharedMailbox, SharedSelection, ANCILLARY_FORCE_EXIT, CHILD_PROCESS_FORCE_EXIT,
    LAS_RECORD_TYPE, WAVEMONITOR_FORCE_REDRAW,
};
use crate::snapshot::{Publish, SnapshotCoordinator};
use crate::types::Snapshot;

/// What one tick of the watcher did.
#[derive(Debug)]
pub enum PollOutcome {
    /// The editor asked us to go away.
    Terminate { key: u32 },
    /// A render held the snapshot, or the mailbox lock was busy.
    Skipped,
    /// Nothing new.
    Idle,
    Published { record_number: u32, generation: u64 },
    /// Decoded, but a render held the guard; retried next tick.
    Deferred { record_number: u32 },
    NoWaveforms(NoWaveformsReason),
    /// Surfaced once, the previous snapshot stays.
    Failed(ExtractError),
    /// Caller must release the mailbox and exit.
    Fatal(ExtractError),
}

pub struct SelectionWatcher {
    mailbox: SharedMailbox,
    kill_switch: u32,
    extractor: WaveformExtractor,
    last_selection: Option<SharedSelection>,
    force_redraw: bool,
    pending: Option<Box<Snapshot>>,
    ack_pending: bool,
}

impl SelectionWatcher {
    pub fn new(mailbox: SharedMailbox, kill_switch: u32) -> Self {
        Self {
            mailbox,
            kill_switch,
            extractor: WaveformExtractor::new(),
            last_selection: None,
            force_redraw: false,
            pending: None,
            ack_pending: false,
        }
    }

    /// Local redraw request (action keys); handled on the next poll.
    pub fn request_redraw(&mut self) {
        self.force_redraw = true;
    }

    fn is_kill_code(&self, key: u32) -> bool {
        key == CHILD_PROCESS_FORCE_EXIT || key == ANCILLARY_FORCE_EXIT || key == self.kill_switch
    }

    pub fn poll(&mut self, snapshots: &SnapshotCoordinator) -> PollOutcome {
        let key = self.mailbox.key();
        if self.is_kill_code(key) {
            log::info!("shutdown requested through mailbox key {key}");
            return PollOutcome::Terminate { key };
        }
        if snapshots.is_busy() {
            log::trace!("snapshot in use, poll skipped");
            return PollOutcome::Skipped;
        }

        let mut outcome = PollOutcome::Idle;
        if let Some(pending) = self.pending.take() {
            outcome = self.publish(snapshots, pending);
        }

        // only the copy happens under the lock
        let selection = {
            let Some(lock) = self.mailbox.try_lock() else {
                return match outcome {
                    PollOutcome::Idle => PollOutcome::Skipped,
                    other => other,
                };
            };
            let selection = lock.selection();
            if self.ack_pending {
                acknowledge(&lock, self.kill_switch);
                self.ack_pending = false;
            }
            selection
        };
        if selection.modcode == WAVEMONITOR_FORCE_REDRAW {
            self.force_redraw = true;
        }

        let changed = selection.record_type == LAS_RECORD_TYPE
            && self.last_selection.as_ref().map_or(true, |last| {
                last.record_number != selection.record_number || last.file != selection.file
            });
        let target = if changed {
            self.last_selection = Some(selection.clone());
            selection
        } else if self.force_redraw {
            match &self.last_selection {
                Some(last) => last.clone(),
                None => {
                    log::debug!("redraw requested before any point was selected");
                    self.force_redraw = false;
                    self.ack_pending = true;
                    self.flush_acknowledgement();
                    return outcome;
                }
            }
        } else {
            return outcome;
        };
        self.force_redraw = false;

        log::debug!(
            "extracting record {} of {}",
            target.record_number,
            target.file.display()
        );
        let result = self.extractor.extract(&target.file, target.record_number);
        // a newer selection replaces anything still waiting to be published
        self.pending = None;
        outcome = match result {
            Ok(Extraction::Waveform(snapshot)) => self.publish(snapshots, snapshot),
            Ok(Extraction::NoWaveforms(reason)) => {
                log::info!(
                    "record {} of {} has no waveform ({reason:?})",
                    target.record_number,
                    target.file.display()
                );
                PollOutcome::NoWaveforms(reason)
            }
            Err(err) if err.is_fatal() => {
                log::error!("{err}");
                return PollOutcome::Fatal(err);
            }
            Err(err) => {
                log::warn!("record {}: {err}", target.record_number);
                PollOutcome::Failed(err)
            }
        };
        self.ack_pending = true;
        self.flush_acknowledgement();
        outcome
    }

    fn publish(&mut self, snapshots: &SnapshotCoordinator, snapshot: Box<Snapshot>) -> PollOutcome {
        let record_number = snapshot.source.record_number;
        log::debug!(
            "{} is LAS 1.{} format {}: {} samples of {} bits, {} ps apart",
            snapshot.source.path.display(),
            snapshot.source.version_minor,
            snapshot.source.point_data_format,
            snapshot.waveform.samples.len(),
            snapshot.waveform.bits_per_sample,
            snapshot.waveform.temporal_spacing
        );
        match snapshots.publish(snapshot) {
            Publish::Published(generation) => {
                log::info!("published record {record_number} (generation {generation})");
                PollOutcome::Published {
                    record_number,
                    generation,
                }
            }
            Publish::Deferred(snapshot) => {
                self.pending = Some(snapshot);
                PollOutcome::Deferred { record_number }
            }
        }
    }

    fn flush_acknowledgement(&mut self) {
        if let Some(lock) = self.mailbox.try_lock() {
            acknowledge(&lock, self.kill_switch);
            self.ack_pending = false;
        }
    }

    /// Detach from the mailbox, telling the editor if we left on our own.
    pub fn shutdown(self) {
        self.mailbox.release(self.kill_switch);
    }
}

/// Clear the processed request so the editor does not resend it. Kill codes are left alone.
fn acknowledge(lock: &MailboxLock<'_>, kill_switch: u32) {
    if lock.modcode() == WAVEMONITOR_FORCE_REDRAW {
        lock.set_modcode(LAS_RECORD_TYPE);
    }
    let key = lock.key();
    if key != CHILD_PROCESS_FORCE_EXIT && key != ANCILLARY_FORCE_EXIT && key != kill_switch {
        lock.set_key(0);
    }
}
