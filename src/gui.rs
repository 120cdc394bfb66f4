// src/gui.rs
use std::time::{Duration, Instant};

use eframe::egui;
use egui::epaint::TextShape;
use egui::{Color32, FontId, Painter, Pos2, Rect, Stroke, Vec2};

use crate::las::NoWaveformsReason;
use crate::render::{plot_waveform, Canvas, PlotStyle};
use crate::snapshot::SnapshotCoordinator;
use crate::status::{status_rows, StatusField};
use crate::types::{Rgba, Snapshot, Viewport};
use crate::watcher::{PollOutcome, SelectionWatcher};

fn color32(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.0, c.1, c.2, c.3)
}

/// egui painter as a plot canvas; coordinates are relative to `rect`.
pub struct PainterCanvas<'a> {
    painter: &'a Painter,
    rect: Rect,
}

impl<'a> PainterCanvas<'a> {
    pub fn new(painter: &'a Painter, rect: Rect) -> Self {
        Self { painter, rect }
    }

    fn at(&self, x: i32, y: i32) -> Pos2 {
        self.rect.min + Vec2::new(x as f32, y as f32)
    }
}

impl Canvas for PainterCanvas<'_> {
    fn clear(&mut self, color: Rgba) {
        self.painter.rect_filled(self.rect, 0.0, color32(color));
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba, width: u32) {
        let points = [self.at(x0, y0), self.at(x1, y1)];
        self.painter
            .line_segment(points, Stroke::new(width as f32, color32(color)));
    }

    fn fill_rectangle(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba) {
        let rect = Rect::from_min_size(self.at(x, y), Vec2::new(w as f32, h as f32));
        self.painter.rect_filled(rect, 0.0, color32(color));
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, rotation: f32, size: u32, color: Rgba) {
        let galley =
            self.painter
                .layout_no_wrap(text.to_owned(), FontId::proportional(size as f32), color32(color));
        let mut shape = TextShape::new(self.at(x, y), galley);
        shape.angle = rotation.to_radians();
        self.painter.add(shape);
    }
}

fn describe(reason: NoWaveformsReason) -> String {
    match reason {
        NoWaveformsReason::EncodingFlags => "No waveforms!".to_owned(),
        NoWaveformsReason::PointFormat(f) => format!("No waveforms in point format {f}"),
        NoWaveformsReason::NoDescriptor => "No waveform for this point".to_owned(),
    }
}

pub struct WaveMonitorApp {
    watcher: Option<SelectionWatcher>,
    snapshots: SnapshotCoordinator,
    style: PlotStyle,
    poll_interval: Duration,
    last_poll: Instant,
    action_keys: Vec<char>,

    // 当前显示的数据 (私有拷贝)
    shown: Option<Snapshot>,
    shown_generation: u64,
    rows: Vec<Vec<StatusField>>,

    // 提示与错误 (每次只弹一次)
    notice: Option<String>,
    error: Option<String>,
}

impl WaveMonitorApp {
    pub fn new(
        watcher: SelectionWatcher,
        style: PlotStyle,
        poll_interval: Duration,
        action_keys: Vec<char>,
    ) -> Self {
        Self {
            watcher: Some(watcher),
            snapshots: SnapshotCoordinator::new(),
            style,
            poll_interval,
            last_poll: Instant::now(),
            action_keys,
            shown: None,
            shown_generation: 0,
            rows: Vec::new(),
            notice: None,
            error: None,
        }
    }

    fn quit(&mut self, ctx: &egui::Context) {
        if let Some(watcher) = self.watcher.take() {
            watcher.shutdown();
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn poll(&mut self, ctx: &egui::Context) {
        if self.last_poll.elapsed() < self.poll_interval {
            return;
        }
        self.last_poll = Instant::now();
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        match watcher.poll(&self.snapshots) {
            PollOutcome::Terminate { .. } => self.quit(ctx),
            PollOutcome::Fatal(err) => {
                log::error!("giving up: {err}");
                if let Some(watcher) = self.watcher.take() {
                    watcher.shutdown();
                }
                std::process::exit(1);
            }
            PollOutcome::Published { .. } => self.notice = None,
            PollOutcome::NoWaveforms(reason) => self.notice = Some(describe(reason)),
            PollOutcome::Failed(err) => self.error = Some(err.to_string()),
            PollOutcome::Skipped | PollOutcome::Idle | PollOutcome::Deferred { .. } => {}
        }
    }

    /// Take a private copy of a newer snapshot, if there is one.
    fn refresh(&mut self) {
        if self.snapshots.generation() == self.shown_generation {
            return;
        }
        if let Some(borrowed) = self.snapshots.borrow_and_clear() {
            self.rows = status_rows(&borrowed.snapshot);
            self.shown_generation = borrowed.generation;
            self.shown = Some(borrowed.snapshot);
        }
    }

    fn action_key_pressed(&self, ctx: &egui::Context) -> bool {
        ctx.input(|i| {
            i.events.iter().any(|e| match e {
                egui::Event::Text(t) => t.chars().any(|c| self.action_keys.contains(&c)),
                _ => false,
            })
        })
    }
}

impl eframe::App for WaveMonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 动作键 -> 强制重绘
        if self.action_key_pressed(ctx) {
            if let Some(watcher) = self.watcher.as_mut() {
                watcher.request_redraw();
            }
        }

        // 2. 轮询 mailbox，再取最新快照
        self.poll(ctx);
        self.refresh();

        // 3. UI
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Quit").clicked() {
                    self.quit(ctx);
                }
                ui.toggle_value(&mut self.style.line_mode, "Line mode")
                    .on_hover_text("Draw the waveform as connected lines or as dots");
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            if let Some(notice) = &self.notice {
                ui.label(egui::RichText::new(notice).strong());
            }
            for row in &self.rows {
                ui.horizontal(|ui| {
                    for field in row {
                        ui.monospace(field.to_string());
                        ui.separator();
                    }
                });
            }
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(color32(self.style.background)))
            .show(ctx, |ui| {
                let size = ui.available_size();
                let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
                let rect = response.rect;
                if let Some(snapshot) = &self.shown {
                    let viewport = Viewport {
                        width: rect.width().max(1.0) as u32,
                        height: rect.height().max(1.0) as u32,
                    };
                    let mut canvas = PainterCanvas::new(&painter, rect);
                    plot_waveform(&mut canvas, snapshot, viewport, &self.style);
                }
            });

        if let Some(message) = &self.error {
            let mut open = true;
            egui::Window::new("LAS waveform monitor")
                .collapsible(false)
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(message.as_str());
                });
            if !open {
                self.error = None;
            }
        }

        ctx.request_repaint_after(self.poll_interval);
    }
}

impl Drop for WaveMonitorApp {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.shutdown();
        }
    }
}
