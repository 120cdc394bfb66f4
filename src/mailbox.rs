// src/mailbox.rs
//
// 与编辑器进程共享的小块内存 ("mailbox")。
// 只在拷贝选择记录/清除标志时短暂加锁，绝不在文件 I/O 期间持有锁。
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use anyhow::{bail, Context, Result};
use memmap2::{MmapMut, MmapOptions};

/// Every child of the editor exits when it sees this key.
pub const CHILD_PROCESS_FORCE_EXIT: u32 = 999_999;
/// Ancillary programs exit when it sees this key; also our default kill switch.
pub const ANCILLARY_FORCE_EXIT: u32 = 888_888;
/// Modification code asking the monitor to re-extract the current selection.
pub const WAVEMONITOR_FORCE_REDRAW: u32 = 7;
/// Record type tag of LAS point selections.
pub const LAS_RECORD_TYPE: u32 = 25;

pub const FILENAME_LEN: usize = 512;
const LOCK_SPINS: u32 = 64;

#[repr(C)]
struct Layout {
    lock: AtomicU32,
    key: AtomicU32,
    modcode: AtomicU32,
    killed: AtomicU32,
    record_type: AtomicU32,
    record_number: AtomicU32,
    filename: [AtomicU8; FILENAME_LEN],
}

/// Size in bytes of the mapped region.
pub const MAILBOX_LEN: usize = std::mem::size_of::<Layout>();

/// Local copy of the editor's selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedSelection {
    pub file: PathBuf,
    /// 1-based point record number.
    pub record_number: u32,
    pub record_type: u32,
    pub modcode: u32,
}

pub struct SharedMailbox {
    path: PathBuf,
    map: MmapMut,
}

impl SharedMailbox {
    /// Regions are named `<key>_abe` inside `dir`.
    pub fn region_path(dir: &Path, key: i32) -> PathBuf {
        dir.join(format!("{key}_abe"))
    }

    /// Attach to a region the editor already created. Never creates one.
    pub fn attach(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("shared memory {} is not available", path.display()))?;
        let len = file.metadata()?.len();
        if len < MAILBOX_LEN as u64 {
            bail!(
                "shared memory {} is {len} bytes, expected at least {MAILBOX_LEN}",
                path.display()
            );
        }
        // Safety: the region is only ever accessed through the atomics in `Layout`.
        let map = unsafe { MmapOptions::new().len(MAILBOX_LEN).map_mut(&file) }
            .with_context(|| format!("failed to map {}", path.display()))?;
        if map.as_ptr() as usize % std::mem::align_of::<Layout>() != 0 {
            bail!("shared memory {} is misaligned", path.display());
        }
        log::info!("attached to shared memory {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    /// Editor side: create a zeroed region. Only the tests play the editor.
    #[cfg(test)]
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(MAILBOX_LEN as u64)?;
        drop(file);
        Self::attach(path)
    }

    fn layout(&self) -> &Layout {
        // Safety: length and alignment were checked in `attach`, the mapping lives as long
        // as `self`, and every field is an atomic so concurrent peers are fine.
        unsafe { &*(self.map.as_ptr() as *const Layout) }
    }

    /// Unlocked read, like the editor's own liveness checks.
    pub fn key(&self) -> u32 {
        self.layout().key.load(Ordering::Acquire)
    }

    /// Editor side of a shutdown request.
    #[cfg(test)]
    pub fn set_key(&self, key: u32) {
        self.layout().key.store(key, Ordering::Release);
    }

    /// Editor side: why the viewer went away.
    #[cfg(test)]
    pub fn killed(&self) -> u32 {
        self.layout().killed.load(Ordering::Acquire)
    }

    /// Take the lock if it is free within a short spin. Never blocks: a peer that died
    /// holding it costs us skipped polls, not a hang.
    pub fn try_lock(&self) -> Option<MailboxLock<'_>> {
        let layout = self.layout();
        for _ in 0..LOCK_SPINS {
            if layout
                .lock
                .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Some(MailboxLock { layout });
            }
            std::hint::spin_loop();
        }
        log::trace!("mailbox lock busy");
        None
    }

    /// Tell the editor why we went away, then drop the mapping.
    pub fn release(self, kill_switch: u32) {
        if self.key() != kill_switch {
            self.layout().killed.store(kill_switch, Ordering::Release);
        }
        if let Err(err) = self.map.flush() {
            log::warn!("flushing {} failed: {err}", self.path.display());
        }
        log::info!("detached from shared memory {}", self.path.display());
    }
}

/// Held lock on the mailbox; released on drop.
pub struct MailboxLock<'a> {
    layout: &'a Layout,
}

impl MailboxLock<'_> {
    pub fn selection(&self) -> SharedSelection {
        let l = self.layout;
        let name: Vec<u8> = l
            .filename
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .take_while(|&b| b != 0)
            .collect();
        SharedSelection {
            file: PathBuf::from(String::from_utf8_lossy(&name).into_owned()),
            record_number: l.record_number.load(Ordering::Relaxed),
            record_type: l.record_type.load(Ordering::Relaxed),
            modcode: l.modcode.load(Ordering::Relaxed),
        }
    }

    pub fn modcode(&self) -> u32 {
        self.layout.modcode.load(Ordering::Relaxed)
    }

    pub fn set_modcode(&self, code: u32) {
        self.layout.modcode.store(code, Ordering::Relaxed);
    }

    pub fn key(&self) -> u32 {
        self.layout.key.load(Ordering::Relaxed)
    }

    pub fn set_key(&self, key: u32) {
        self.layout.key.store(key, Ordering::Relaxed);
    }

    /// Editor side of a selection change.
    #[cfg(test)]
    pub fn select(&self, file: &Path, record_number: u32, record_type: u32) {
        let l = self.layout;
        let bytes = file.to_string_lossy().into_owned().into_bytes();
        for (i, slot) in l.filename.iter().enumerate() {
            slot.store(bytes.get(i).copied().unwrap_or(0), Ordering::Relaxed);
        }
        l.record_type.store(record_type, Ordering::Relaxed);
        l.record_number.store(record_number, Ordering::Relaxed);
    }
}

impl Drop for MailboxLock<'_> {
    fn drop(&mut self) {
        self.layout.lock.store(0, Ordering::Release);
    }
}
