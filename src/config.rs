// src/config.rs
//
// 可选的 JSON 配置 (只读)。缺省字段取默认值。
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::render::PlotStyle;
use crate::types::{Rgba, Viewport};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub wave_color: Rgba,
    pub marker_color: Rgba,
    pub background_color: Rgba,
    pub axis_color: Rgba,
    /// Draw the trace as connected segments (true) or dots.
    pub wave_line_mode: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub poll_interval_ms: u64,
    pub dot_size: i32,
    pub marker_size: i32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            wave_color: Rgba::WHITE,
            marker_color: Rgba::GREEN,
            background_color: Rgba::BLACK,
            axis_color: Rgba::GRAY,
            wave_line_mode: true,
            window_width: 440,
            window_height: 620,
            poll_interval_ms: 10,
            dot_size: 2,
            marker_size: 10,
        }
    }
}

impl ViewerConfig {
    /// Defaults when `path` is `None` or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::info!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        log::info!("loaded config {}", path.display());
        Ok(config)
    }

    pub fn parse(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        anyhow::ensure!(config.poll_interval_ms > 0, "poll_interval_ms must be positive");
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.window_width,
            height: self.window_height,
        }
    }

    pub fn plot_style(&self) -> PlotStyle {
        PlotStyle {
            wave: self.wave_color,
            marker: self.marker_color,
            background: self.background_color,
            axis: self.axis_color,
            line_mode: self.wave_line_mode,
            dot_size: self.dot_size,
            marker_size: self.marker_size,
        }
    }
}
