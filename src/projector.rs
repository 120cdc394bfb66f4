// src/projector.rs
use crate::types::{Bounds, Viewport};

/// Map (sample index, sample value) into the viewport.
///
/// The plot lies on its side: the sample index drives the vertical pixel coordinate and the
/// amplitude drives the horizontal one. Returns `(px, py)`.
pub fn project(index: i64, value: i64, bounds: &Bounds, viewport: Viewport) -> (i32, i32) {
    let py = (index - bounds.min_x) as f64 / bounds.range_x as f64 * f64::from(viewport.height);
    let px = (value - bounds.min_y) as f64 / bounds.range_y as f64 * f64::from(viewport.width);
    (px.round() as i32, py.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_sits_inside_the_leading_margin() {
        let bounds = Bounds::for_waveform(200, 8);
        let viewport = Viewport {
            width: 291,
            height: 235,
        };
        assert_eq!(project(0, 0, &bounds, viewport), (25, 25));
        assert_eq!(project(200, 256, &bounds, viewport), (281, 225));
        assert_eq!(project(-25, -25, &bounds, viewport), (0, 0));
        assert_eq!(project(210, 266, &bounds, viewport), (291, 235));
    }

    #[test]
    fn axes_are_swapped() {
        let bounds = Bounds::for_waveform(100, 4);
        let viewport = Viewport {
            width: 400,
            height: 600,
        };
        let (px0, py0) = project(10, 3, &bounds, viewport);
        let (px1, py1) = project(50, 3, &bounds, viewport);
        assert_eq!(px0, px1);
        assert!(py1 > py0);
        let (px2, py2) = project(10, 9, &bounds, viewport);
        assert_eq!(py0, py2);
        assert!(px2 > px0);
    }

    #[test]
    fn rounds_to_nearest_pixel() {
        let bounds = Bounds::for_waveform(5, 1);
        // range_x = 40, range_y = 37
        let viewport = Viewport {
            width: 10,
            height: 10,
        };
        // (0 + 25) / 40 * 10 = 6.25, (1 + 25) / 37 * 10 = 7.03
        assert_eq!(project(0, 1, &bounds, viewport), (7, 6));
    }
}
