use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;
use crate::ir::{Point, Rect};

/// Uniform pan and zoom mapping canvas coordinates to view coordinates:
/// `view = canvas * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTransform {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ViewTransform {
    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            point.x * self.zoom + self.pan_x,
            point.y * self.zoom + self.pan_y,
        )
    }
}

/// Fits `bounds` plus padding into the view, preserving aspect ratio, and
/// centres it. Degenerate bounds or views give the identity transform.
pub fn fit_bounds(bounds: Rect, view: &ViewportConfig) -> ViewTransform {
    if bounds.width <= 0.0 || bounds.height <= 0.0 || view.width <= 0.0 || view.height <= 0.0 {
        return ViewTransform::default();
    }
    let padded_width = bounds.width + 2.0 * view.padding;
    let padded_height = bounds.height + 2.0 * view.padding;
    let zoom = (view.width / padded_width)
        .min(view.height / padded_height)
        .clamp(view.min_zoom, view.max_zoom);
    let center = bounds.center();
    ViewTransform {
        zoom,
        pan_x: view.width / 2.0 - center.x * zoom,
        pan_y: view.height / 2.0 - center.y * zoom,
    }
}
