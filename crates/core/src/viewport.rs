//! Pan/zoom transform between viewport pixels and canvas pixels

use iiif_model::{CanvasSize, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    /// Smallest committed region, in canvas pixels.
    pub min_region_size: f64,
    /// Corner handle hit radius, in viewport pixels.
    pub handle_radius: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { min_zoom: 0.25, max_zoom: 6.0, zoom_step: 0.1, min_region_size: 5.0, handle_radius: 6.0 }
    }
}

impl EditorConfig {
    pub fn with_handle_radius(mut self, radius: f64) -> Self {
        self.handle_radius = radius;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub offset: Point,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { zoom: 1.0, offset: Point::default() }
    }
}

impl Viewport {
    /// Canvas coordinate under a viewport point. May lie outside the canvas.
    pub fn to_canvas(&self, pointer: Point) -> Point {
        Point::new((pointer.x - self.offset.x) / self.zoom, (pointer.y - self.offset.y) / self.zoom)
    }

    /// [`Viewport::to_canvas`] clamped into the canvas.
    pub fn to_image(&self, pointer: Point, size: CanvasSize) -> Point {
        let point = self.to_canvas(pointer);
        Point::new(clamp(point.x, 0.0, size.width), clamp(point.y, 0.0, size.height))
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset.x += dx;
        self.offset.y += dy;
    }

    /// One wheel notch. Scrolling up (negative delta) zooms in. The offset is kept.
    pub fn zoom_by_wheel(&mut self, delta_y: f64, config: &EditorConfig) {
        if delta_y == 0.0 {
            return;
        }
        let step = if delta_y < 0.0 { config.zoom_step } else { -config.zoom_step };
        self.zoom = clamp(self.zoom + step, config.min_zoom, config.max_zoom);
    }
}

/// `max(min, min(max, n))`. Yields `min` when the range is empty, where
/// `f64::clamp` would panic.
pub fn clamp(n: f64, min: f64, max: f64) -> f64 {
    min.max(max.min(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_viewport_is_identity() {
        let viewport = Viewport::default();
        let size = CanvasSize::new(100.0, 50.0);
        assert_eq!(viewport.to_image(Point::new(10.0, 20.0), size), Point::new(10.0, 20.0));
    }

    #[test]
    fn to_image_inverts_offset_and_zoom_then_clamps() {
        let viewport = Viewport { zoom: 2.0, offset: Point::new(20.0, 10.0) };
        let size = CanvasSize::new(100.0, 100.0);

        assert_eq!(viewport.to_image(Point::new(60.0, 50.0), size), Point::new(20.0, 20.0));
        assert_eq!(viewport.to_image(Point::new(0.0, 0.0), size), Point::new(0.0, 0.0));
        assert_eq!(viewport.to_image(Point::new(1000.0, 1000.0), size), Point::new(100.0, 100.0));
        assert_eq!(viewport.to_canvas(Point::new(1000.0, -10.0)), Point::new(490.0, -10.0));
    }

    #[test]
    fn wheel_zoom_steps_and_stops_at_limits() {
        let config = EditorConfig::default();
        let mut viewport = Viewport { zoom: 1.0, offset: Point::new(5.0, 5.0) };

        viewport.zoom_by_wheel(-120.0, &config);
        assert!((viewport.zoom - 1.1).abs() < 1e-9);
        assert_eq!(viewport.offset, Point::new(5.0, 5.0));

        for _ in 0..100 {
            viewport.zoom_by_wheel(-1.0, &config);
        }
        assert_eq!(viewport.zoom, 6.0);

        for _ in 0..100 {
            viewport.zoom_by_wheel(3.0, &config);
        }
        assert_eq!(viewport.zoom, 0.25);
    }

    #[test]
    fn clamp_tolerates_inverted_range() {
        assert_eq!(clamp(7.0, 0.0, 10.0), 7.0);
        assert_eq!(clamp(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(3.0, 5.0, 2.0), 5.0);
    }
}
