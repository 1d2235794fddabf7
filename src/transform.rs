//! Pan/zoom view transform between image space and screen space.
//!
//! The transform is a uniform scale followed by a translation:
//! `screen = image * scale + translate`. It never touches landmark positions;
//! rendering and drag handling read it by reference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Point;

/// Rejected zoom range.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("zoom bounds must satisfy 0 < min <= max, got [{min}, {max}]")]
pub struct InvalidZoomBounds {
    pub min: f64,
    pub max: f64,
}

/// Inclusive bounds for the zoom factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawZoomBounds")]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
}

impl ZoomBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `scale` into the range. Unlike `f64::clamp` this never panics,
    /// even on bounds that fail [`ZoomBounds::is_valid`].
    pub fn clamp(&self, scale: f64) -> f64 {
        scale.max(self.min).min(self.max)
    }

    /// Bounds are usable when both ends are finite, positive and ordered.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self::new(0.5, 5.0)
    }
}

#[derive(Deserialize)]
struct RawZoomBounds {
    min: f64,
    max: f64,
}

impl TryFrom<RawZoomBounds> for ZoomBounds {
    type Error = InvalidZoomBounds;

    fn try_from(raw: RawZoomBounds) -> Result<Self, Self::Error> {
        let bounds = Self::new(raw.min, raw.max);
        if bounds.is_valid() {
            Ok(bounds)
        } else {
            Err(InvalidZoomBounds {
                min: raw.min,
                max: raw.max,
            })
        }
    }
}

/// Current zoom and pan of the image within the viewport.
///
/// Serialized for handoff and logging only. There is no `Deserialize`: a
/// transform is always built through [`ViewTransform::new`] so the scale
/// stays positive and inside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransform {
    scale: f64,
    translate_x: f64,
    translate_y: f64,
    bounds: ZoomBounds,
}

impl ViewTransform {
    /// Identity transform with the given zoom bounds.
    ///
    /// Bounds that fail [`ZoomBounds::is_valid`] are replaced by the default
    /// range.
    pub fn new(bounds: ZoomBounds) -> Self {
        let bounds = if bounds.is_valid() {
            bounds
        } else {
            tracing::warn!(
                min = bounds.min,
                max = bounds.max,
                "invalid zoom bounds, falling back to the default range"
            );
            ZoomBounds::default()
        };
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            bounds,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_raw(scale: f64, translate_x: f64, translate_y: f64) -> Self {
        Self {
            scale,
            translate_x,
            translate_y,
            bounds: ZoomBounds::default(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translation(&self) -> Point {
        Point::new(self.translate_x, self.translate_y)
    }

    pub fn bounds(&self) -> ZoomBounds {
        self.bounds
    }

    /// Apply a multiplicative pinch delta anchored at a screen-space pivot.
    ///
    /// The image point under `pivot` stays under `pivot` after the update.
    /// Returns the scale actually applied.
    pub fn update_scale(&mut self, raw_gesture_scale: f64, pivot: Point) -> f64 {
        if !raw_gesture_scale.is_finite() || raw_gesture_scale <= 0.0 || !pivot.is_finite() {
            tracing::debug!(raw_gesture_scale, "ignoring degenerate pinch delta");
            return self.scale;
        }

        let previous = self.scale;
        let next = self.bounds.clamp(previous * raw_gesture_scale);
        let ratio = next / previous;

        self.translate_x = pivot.x - (pivot.x - self.translate_x) * ratio;
        self.translate_y = pivot.y - (pivot.y - self.translate_y) * ratio;
        self.scale = next;
        next
    }

    /// Pan by a screen-space delta. Pan is not scaled.
    pub fn update_translation(&mut self, delta: Point) {
        if !delta.is_finite() {
            tracing::debug!(?delta, "ignoring non-finite pan delta");
            return;
        }
        self.translate_x += delta.x;
        self.translate_y += delta.y;
    }

    /// Jump to an exact zoom level, keeping the viewport center fixed.
    ///
    /// Translation is recomputed from scratch as `center * (1 - scale)`, so
    /// any previous pan is discarded.
    pub fn set_zoom(&mut self, target_scale: f64, viewport: Point) {
        if !target_scale.is_finite() || target_scale <= 0.0 {
            tracing::debug!(target_scale, "ignoring invalid zoom target");
            return;
        }
        let scale = self.bounds.clamp(target_scale);
        let center = viewport / 2.0;
        self.scale = scale;
        self.translate_x = center.x * (1.0 - scale);
        self.translate_y = center.y * (1.0 - scale);
    }

    /// Restore the identity transform.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.translate_x = 0.0;
        self.translate_y = 0.0;
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.translate_x == 0.0 && self.translate_y == 0.0
    }

    /// Scale usable for inverting deltas and points.
    pub fn is_invertible(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0
    }

    pub fn to_screen(&self, image_point: Point) -> Point {
        Point::new(
            image_point.x * self.scale + self.translate_x,
            image_point.y * self.scale + self.translate_y,
        )
    }

    /// Inverse mapping, `None` when the scale cannot be inverted.
    pub fn try_to_image(&self, screen_point: Point) -> Option<Point> {
        if !self.is_invertible() {
            return None;
        }
        Some(Point::new(
            (screen_point.x - self.translate_x) / self.scale,
            (screen_point.y - self.translate_y) / self.scale,
        ))
    }

    /// Inverse mapping. Falls back to removing the translation only when the
    /// scale is degenerate, which the clamped setters never produce.
    pub fn to_image(&self, screen_point: Point) -> Point {
        self.try_to_image(screen_point)
            .unwrap_or_else(|| screen_point - self.translation())
    }

    /// Project an image-space segment (a measurement line) to screen space.
    pub fn segment_to_screen(&self, a: Point, b: Point) -> (Point, Point) {
        (self.to_screen(a), self.to_screen(b))
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(ZoomBounds::default())
    }
}
