// src/engine.rs
//
// 无界面模式: 单线程定时循环。每次发布后把波形画成 PNG 并把状态字段写进日志。
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::render::{render_png, PlotStyle};
use crate::snapshot::SnapshotCoordinator;
use crate::status::status_rows;
use crate::types::{Snapshot, Viewport};
use crate::watcher::{PollOutcome, SelectionWatcher};

pub struct HeadlessOptions {
    pub png_out: PathBuf,
    pub viewport: Viewport,
    pub style: PlotStyle,
    pub poll_interval: Duration,
}

/// How the loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Exit {
    Requested,
    Fatal,
}

fn write_png(snapshot: &Snapshot, options: &HeadlessOptions) -> Result<()> {
    let png = render_png(snapshot, options.viewport, &options.style)?;
    write_atomically(&options.png_out, &png)
}

// 先写临时文件再改名，读者不会看到半张图
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("png.tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// One tick: poll, then render whatever got published. `None` keeps the loop going.
pub fn tick(
    watcher: &mut SelectionWatcher,
    snapshots: &SnapshotCoordinator,
    options: &HeadlessOptions,
) -> Option<Exit> {
    match watcher.poll(snapshots) {
        PollOutcome::Terminate { key } => {
            log::info!("editor closed us (key {key})");
            return Some(Exit::Requested);
        }
        PollOutcome::Fatal(err) => {
            log::error!("giving up: {err}");
            return Some(Exit::Fatal);
        }
        PollOutcome::Published {
            record_number,
            generation,
        } => {
            let Some(borrowed) = snapshots.borrow_and_clear() else {
                return None;
            };
            for row in status_rows(&borrowed.snapshot) {
                let line: Vec<String> = row.iter().map(ToString::to_string).collect();
                log::info!("{}", line.join(" | "));
            }
            match write_png(&borrowed.snapshot, options) {
                Ok(()) => log::info!(
                    "wrote record {record_number} to {} (generation {generation})",
                    options.png_out.display()
                ),
                Err(err) => log::warn!("{err:#}"),
            }
        }
        PollOutcome::NoWaveforms(reason) => log::info!("no waveforms ({reason:?})"),
        PollOutcome::Deferred { record_number } => {
            log::debug!("record {record_number} waits for the renderer")
        }
        PollOutcome::Failed(_) | PollOutcome::Skipped | PollOutcome::Idle => {}
    }
    None
}

pub fn run_headless(mut watcher: SelectionWatcher, options: HeadlessOptions) -> Exit {
    log::info!(
        "headless mode, polling every {:?}, writing {}",
        options.poll_interval,
        options.png_out.display()
    );
    let snapshots = SnapshotCoordinator::new();
    let exit = loop {
        if let Some(exit) = tick(&mut watcher, &snapshots, &options) {
            break exit;
        }
        thread::sleep(options.poll_interval);
    };
    watcher.shutdown();
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::las::fixture::{descriptor_payload, point_record, temp_path, LasFixture, WaveRef};
    use crate::las::header::ENCODING_WAVEFORMS_INTERNAL;
    use crate::mailbox::{SharedMailbox, LAS_RECORD_TYPE};

    #[test]
    fn publish_writes_a_png_and_kill_stops_the_loop() {
        let mut f = LasFixture::new(4, ENCODING_WAVEFORMS_INTERNAL, 4);
        f.add_vlr(101, descriptor_payload(8, 0, 64, 1, 1.0, 0.0))
            .add_point(point_record(4, Some(WaveRef::new(2, 0, 64, 8.0)), 0.0))
            .add_packet(0, (0..64).collect());
        let (_las_dir, las) = temp_path("headless", "las");
        f.write(&las);

        let (_region_dir, region) = temp_path("headless_mbx", "shm");
        let editor = SharedMailbox::create(&region).unwrap();
        let mut watcher = SelectionWatcher::new(SharedMailbox::attach(&region).unwrap(), 31);
        let options = HeadlessOptions {
            png_out: las.with_extension("png"),
            viewport: Viewport {
                width: 120,
                height: 160,
            },
            style: PlotStyle::default(),
            poll_interval: Duration::from_millis(1),
        };
        let snapshots = SnapshotCoordinator::new();

        editor.try_lock().unwrap().select(&las, 1, LAS_RECORD_TYPE);
        assert_eq!(tick(&mut watcher, &snapshots, &options), None);
        let png = std::fs::read(&options.png_out).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        editor.set_key(31);
        assert_eq!(run_headless(watcher, options), Exit::Requested);
        assert_eq!(editor.killed(), 0);
    }

    #[test]
    fn atomic_write_replaces_the_target() {
        let (_path_dir, path) = temp_path("atomic", "png");
        write_atomically(&path, b"one").unwrap();
        write_atomically(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!path.with_extension("png.tmp").exists());
    }
}
