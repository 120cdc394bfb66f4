// src/main.rs
mod config;
mod engine;
mod gui;
mod las;
mod mailbox;
mod projector;
mod render;
mod snapshot;
mod status;
mod types;
mod watcher;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;

use crate::config::ViewerConfig;
use crate::engine::{Exit, HeadlessOptions};
use crate::mailbox::{SharedMailbox, ANCILLARY_FORCE_EXIT};
use crate::watcher::SelectionWatcher;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Shows the digitized LAS waveform of the point selected in the editor"
)]
struct Args {
    /// Key of the editor's shared memory region
    #[arg(long = "shared_memory_key", alias = "shared-memory-key")]
    shared_memory_key: i32,

    /// Our own kill code; the editor writes it into the key field to close us
    #[arg(long = "kill_switch", alias = "kill-switch", default_value_t = ANCILLARY_FORCE_EXIT)]
    kill_switch: u32,

    /// Action keys; any of them forces a redraw
    #[arg(long = "actionkey00")]
    actionkey00: Option<char>,
    #[arg(long = "actionkey01")]
    actionkey01: Option<char>,
    #[arg(long = "actionkey02")]
    actionkey02: Option<char>,
    #[arg(long = "actionkey03")]
    actionkey03: Option<char>,

    /// Viewer configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding named shared memory regions
    #[arg(long)]
    shm_dir: Option<PathBuf>,

    /// Run without a window, rendering PNG files instead
    #[arg(long, requires = "png_out")]
    headless: bool,

    /// Where headless mode writes the plot
    #[arg(long)]
    png_out: Option<PathBuf>,
}

impl Args {
    fn action_keys(&self) -> Vec<char> {
        [
            self.actionkey00,
            self.actionkey01,
            self.actionkey02,
            self.actionkey03,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn default_shm_dir() -> PathBuf {
    let dev_shm = PathBuf::from("/dev/shm");
    if cfg!(target_os = "linux") && dev_shm.is_dir() {
        dev_shm
    } else {
        std::env::temp_dir()
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = ViewerConfig::load(args.config.as_deref())?;

    let shm_dir = args.shm_dir.clone().unwrap_or_else(default_shm_dir);
    let region = SharedMailbox::region_path(&shm_dir, args.shared_memory_key);
    let mailbox = SharedMailbox::attach(&region)
        .with_context(|| format!("cannot attach to shared memory key {}", args.shared_memory_key))?;
    let watcher = SelectionWatcher::new(mailbox, args.kill_switch);

    if args.headless {
        let png_out = args
            .png_out
            .clone()
            .context("--headless needs --png-out")?;
        let options = HeadlessOptions {
            png_out,
            viewport: config.viewport(),
            style: config.plot_style(),
            poll_interval: config.poll_interval(),
        };
        if engine::run_headless(watcher, options) == Exit::Fatal {
            std::process::exit(1);
        }
        return Ok(());
    }

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([config.window_width as f32, config.window_height as f32])
        .with_title("LAS waveform monitor");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let app = gui::WaveMonitorApp::new(
        watcher,
        config.plot_style(),
        config.poll_interval(),
        args.action_keys(),
    );
    eframe::run_native("laswave-monitor", options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("window closed with an error: {e}"))
}
