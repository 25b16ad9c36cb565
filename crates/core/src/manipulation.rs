//! Move and resize operations on annotation rectangles
//!
//! A selected rectangle exposes four corner handles. Dragging the body moves
//! it; dragging a corner resizes it while the opposite corner stays put.
//! Every result stays inside the canvas and keeps the minimum region size.

use crate::viewport::clamp;
use iiif_model::{CanvasSize, Point, Rect};

pub const MIN_REGION_SIZE: f64 = 5.0;

/// Corner handle of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Corner {
    pub const ALL: [Corner; 4] =
        [Corner::NorthWest, Corner::NorthEast, Corner::SouthWest, Corner::SouthEast];

    pub fn position(self, rect: &Rect) -> Point {
        match self {
            Corner::NorthWest => Point::new(rect.x, rect.y),
            Corner::NorthEast => Point::new(rect.right(), rect.y),
            Corner::SouthWest => Point::new(rect.x, rect.bottom()),
            Corner::SouthEast => Point::new(rect.right(), rect.bottom()),
        }
    }
}

/// Handle with its position in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub corner: Corner,
    pub position: Point,
}

impl Handle {
    /// `radius` is in canvas units; callers divide viewport radii by zoom.
    pub fn hit_test(&self, point: Point, radius: f64) -> bool {
        (point.x - self.position.x).hypot(point.y - self.position.y) <= radius
    }
}

pub fn corner_handles(rect: &Rect) -> [Handle; 4] {
    Corner::ALL.map(|corner| Handle { corner, position: corner.position(rect) })
}

/// First corner handle of `rect` within `radius` of `point`.
pub fn hit_corner(rect: &Rect, point: Point, radius: f64) -> Option<Corner> {
    corner_handles(rect)
        .into_iter()
        .find(|handle| handle.hit_test(point, radius))
        .map(|handle| handle.corner)
}

/// Translate `base` by `(dx, dy)` canvas pixels without leaving the canvas.
pub fn move_rect(base: &Rect, dx: f64, dy: f64, size: CanvasSize) -> Rect {
    Rect {
        x: clamp(base.x + dx, 0.0, size.width - base.w),
        y: clamp(base.y + dy, 0.0, size.height - base.h),
        ..*base
    }
}

/// Drag `corner` of `base` by `(dx, dy)` canvas pixels.
pub fn resize_rect(corner: Corner, base: &Rect, dx: f64, dy: f64, size: CanvasSize) -> Rect {
    let (x, w) = match corner {
        Corner::NorthWest | Corner::SouthWest => drag_leading_edge(base.x, base.right(), dx),
        Corner::NorthEast | Corner::SouthEast => {
            (base.x, clamp(base.w + dx, MIN_REGION_SIZE, size.width - base.x))
        }
    };
    let (y, h) = match corner {
        Corner::NorthWest | Corner::NorthEast => drag_leading_edge(base.y, base.bottom(), dy),
        Corner::SouthWest | Corner::SouthEast => {
            (base.y, clamp(base.h + dy, MIN_REGION_SIZE, size.height - base.y))
        }
    };
    Rect { x, y, w, h }
}

/// Move the low edge of an axis while the high edge `far` stays fixed.
fn drag_leading_edge(start: f64, far: f64, delta: f64) -> (f64, f64) {
    let start = clamp(start + delta, 0.0, far - MIN_REGION_SIZE);
    (start, far - start)
}
