// src/render.rs
//
// 绘图: 把快照画成坐标轴 + 刻度 + 波形 + 回波标记。
// Canvas 只有三种图元，egui 画笔和 plotters 位图都实现它。
use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontTransform, RGBAColor};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use thiserror::Error;

use crate::projector::project;
use crate::types::{Rgba, Snapshot, Viewport};

const AXIS_WIDTH: u32 = 2;
const TRACE_WIDTH: u32 = 2;
const TICK_LABEL_SIZE: u32 = 8;
const TICK_INTERVALS: i64 = 5;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("viewport {width}x{height} has no pixels")]
    EmptyViewport { width: u32, height: u32 },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for RenderError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        RenderError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for RenderError {
    fn from(value: image::ImageError) -> Self {
        RenderError::Plot(value.to_string())
    }
}

/// Drawing primitives the plot is made of, in pixel coordinates.
pub trait Canvas {
    fn clear(&mut self, color: Rgba);
    /// Solid segment `width` pixels wide.
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba, width: u32);
    fn fill_rectangle(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba);
    /// `rotation` is in degrees, clockwise.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, rotation: f32, size: u32, color: Rgba);
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlotStyle {
    pub wave: Rgba,
    pub marker: Rgba,
    pub background: Rgba,
    pub axis: Rgba,
    /// Connected segments when true, one dot per sample otherwise.
    pub line_mode: bool,
    pub dot_size: i32,
    pub marker_size: i32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            wave: Rgba::WHITE,
            marker: Rgba::GREEN,
            background: Rgba::BLACK,
            axis: Rgba::GRAY,
            line_mode: true,
            dot_size: 2,
            marker_size: 10,
        }
    }
}

/// One full redraw: background, axes with ticks, the trace and the return marker.
pub fn plot_waveform<C: Canvas + ?Sized>(
    canvas: &mut C,
    snapshot: &Snapshot,
    viewport: Viewport,
    style: &PlotStyle,
) {
    let wave = &snapshot.waveform;
    let bounds = &wave.bounds;
    let at = |index: i64, value: i64| project(index, value, bounds, viewport);
    let segment = |canvas: &mut C, from: (i32, i32), to: (i32, i32), color: Rgba, width: u32| {
        canvas.draw_line(from.0, from.1, to.0, to.1, color, width)
    };

    canvas.clear(style.background);

    segment(canvas, at(0, 0), at(bounds.length, 0), style.axis, AXIS_WIDTH);
    segment(canvas, at(0, 0), at(0, bounds.height), style.axis, AXIS_WIDTH);

    let inc_x = (bounds.length / TICK_INTERVALS).max(1);
    for i in 0..=(bounds.length / inc_x) {
        let num = i * inc_x;
        segment(canvas, at(num, 0), at(num, -2), style.axis, AXIS_WIDTH);
        let (x, y) = at(num + 4, -22);
        canvas.draw_text(&num.to_string(), x, y, 90.0, TICK_LABEL_SIZE, style.axis);
    }
    let inc_y = (bounds.height / TICK_INTERVALS).max(1);
    for i in 0..=(bounds.height / inc_y) {
        let num = i * inc_y;
        segment(canvas, at(0, num), at(-2, num), style.axis, AXIS_WIDTH);
        let (x, y) = at(-10, num - 10);
        canvas.draw_text(&num.to_string(), x, y, 90.0, TICK_LABEL_SIZE, style.axis);
    }

    let mut points = wave
        .samples
        .iter()
        .enumerate()
        .map(|(i, &s)| at(i as i64, i64::from(s)));
    if style.line_mode {
        if let Some(mut prev) = points.next() {
            for next in points {
                segment(canvas, prev, next, style.wave, TRACE_WIDTH);
                prev = next;
            }
        }
    } else {
        for (x, y) in points {
            canvas.fill_rectangle(x, y, style.dot_size, style.dot_size, style.wave);
        }
    }

    if let Some(&value) = wave.samples.get(wave.return_bin) {
        let (x, y) = at(wave.return_bin as i64, i64::from(value));
        let hs = style.marker_size / 2;
        segment(canvas, (x - hs, y + hs), (x + hs, y - hs), style.marker, 2);
        segment(canvas, (x + hs, y + hs), (x - hs, y - hs), style.marker, 2);
    }
}

/// Off-screen RGB canvas backed by a plotters bitmap.
pub struct PngCanvas {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    failure: Option<RenderError>,
}

impl PngCanvas {
    pub fn new(viewport: Viewport) -> Result<Self, RenderError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(RenderError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        Ok(Self {
            width: viewport.width,
            height: viewport.height,
            buffer: vec![0u8; (viewport.width * viewport.height * 3) as usize],
            failure: None,
        })
    }

    fn area(&mut self) -> DrawingArea<BitMapBackend<'_>, Shift> {
        BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height)).into_drawing_area()
    }

    fn record(&mut self, result: Result<(), RenderError>) {
        if let Err(err) = result {
            log::warn!("bitmap draw failed: {err}");
            self.failure.get_or_insert(err);
        }
    }

    pub fn encode_png(self) -> Result<Vec<u8>, RenderError> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        let image = ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, self.buffer)
            .ok_or_else(|| RenderError::Plot("failed to allocate image buffer".into()))?;
        let mut output = Vec::new();
        DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
        Ok(output)
    }
}

fn plotters_color(c: Rgba) -> RGBAColor {
    RGBAColor(c.0, c.1, c.2, f64::from(c.3) / 255.0)
}

impl Canvas for PngCanvas {
    fn clear(&mut self, color: Rgba) {
        let result = self.area().fill(&plotters_color(color)).map_err(RenderError::from);
        self.record(result);
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba, width: u32) {
        let stroke = plotters_color(color).stroke_width(width);
        let result = self
            .area()
            .draw(&PathElement::new(vec![(x0, y0), (x1, y1)], stroke))
            .map_err(RenderError::from);
        self.record(result);
    }

    fn fill_rectangle(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba) {
        let fill = plotters_color(color).filled();
        let result = self
            .area()
            .draw(&Rectangle::new([(x, y), (x + w, y + h)], fill))
            .map_err(RenderError::from);
        self.record(result);
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, rotation: f32, size: u32, color: Rgba) {
        let transform = match rotation.rem_euclid(360.0).round() as i32 {
            90 => FontTransform::Rotate90,
            180 => FontTransform::Rotate180,
            270 => FontTransform::Rotate270,
            _ => FontTransform::None,
        };
        let font = ("sans-serif", f64::from(size))
            .into_font()
            .transform(transform)
            .color(&plotters_color(color))
            .pos(Pos::new(HPos::Left, VPos::Top));
        // missing system fonts only cost us the tick labels
        if let Err(err) = self.area().draw(&Text::new(text.to_string(), (x, y), font)) {
            log::debug!("tick label '{text}' not drawn: {err:?}");
        }
    }
}

/// Render one snapshot to PNG bytes.
pub fn render_png(
    snapshot: &Snapshot,
    viewport: Viewport,
    style: &PlotStyle,
) -> Result<Vec<u8>, RenderError> {
    let mut canvas = PngCanvas::new(viewport)?;
    plot_waveform(&mut canvas, snapshot, viewport, style);
    canvas.encode_png()
}
