//! Draggable landmark handles.
//!
//! Landmark positions are always stored in image space. Screen-space drag
//! deltas are converted through the current [`ViewTransform`] scale and
//! accumulated onto the stored position; nothing is recomputed from a
//! start-of-gesture snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::transform::ViewTransform;
use crate::types::Point;

/// Anatomical or reference-object feature a handle marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkRole {
    /// One end of the reference card edge.
    ReferenceStart,
    /// Other end of the reference card edge.
    ReferenceEnd,
    PupilLeft,
    PupilRight,
    /// Center of the nasal bridge, reference for monocular PD.
    NasalCenter,
    NasalLeft,
    NasalRight,
    FrameLeft,
    FrameRight,
    /// Lower frame rim below the left pupil.
    FrameBaseLeft,
    /// Lower frame rim below the right pupil.
    FrameBaseRight,
}

impl LandmarkRole {
    /// Handles placed on the calibration stage.
    pub const CALIBRATION: [LandmarkRole; 2] =
        [LandmarkRole::ReferenceStart, LandmarkRole::ReferenceEnd];

    /// Handles always placed on the measurement stage.
    pub const MEASUREMENT: [LandmarkRole; 7] = [
        LandmarkRole::PupilLeft,
        LandmarkRole::PupilRight,
        LandmarkRole::NasalCenter,
        LandmarkRole::FrameLeft,
        LandmarkRole::FrameRight,
        LandmarkRole::FrameBaseLeft,
        LandmarkRole::FrameBaseRight,
    ];

    /// Extra handles for the nasal bridge width.
    pub const NASAL_BRIDGE: [LandmarkRole; 2] = [LandmarkRole::NasalLeft, LandmarkRole::NasalRight];

    /// Stable string identifier.
    pub fn id(&self) -> &'static str {
        match self {
            LandmarkRole::ReferenceStart => "reference_start",
            LandmarkRole::ReferenceEnd => "reference_end",
            LandmarkRole::PupilLeft => "pupil_left",
            LandmarkRole::PupilRight => "pupil_right",
            LandmarkRole::NasalCenter => "nasal_center",
            LandmarkRole::NasalLeft => "nasal_left",
            LandmarkRole::NasalRight => "nasal_right",
            LandmarkRole::FrameLeft => "frame_left",
            LandmarkRole::FrameRight => "frame_right",
            LandmarkRole::FrameBaseLeft => "frame_base_left",
            LandmarkRole::FrameBaseRight => "frame_base_right",
        }
    }

    /// Starting position relative to the viewport center, in screen pixels.
    pub fn default_offset(&self) -> Point {
        match self {
            LandmarkRole::ReferenceStart => Point::new(-100.0, 0.0),
            LandmarkRole::ReferenceEnd => Point::new(100.0, 0.0),
            LandmarkRole::PupilLeft => Point::new(-50.0, -30.0),
            LandmarkRole::PupilRight => Point::new(50.0, -30.0),
            LandmarkRole::NasalCenter => Point::new(0.0, 20.0),
            LandmarkRole::NasalLeft => Point::new(-20.0, 20.0),
            LandmarkRole::NasalRight => Point::new(20.0, 20.0),
            LandmarkRole::FrameLeft => Point::new(-100.0, 0.0),
            LandmarkRole::FrameRight => Point::new(100.0, 0.0),
            LandmarkRole::FrameBaseLeft => Point::new(-50.0, 10.0),
            LandmarkRole::FrameBaseRight => Point::new(50.0, 10.0),
        }
    }

    pub fn default_color(&self) -> PointColor {
        match self {
            LandmarkRole::ReferenceStart | LandmarkRole::ReferenceEnd => PointColor::Yellow,
            LandmarkRole::PupilLeft | LandmarkRole::PupilRight => PointColor::Cyan,
            LandmarkRole::NasalCenter => PointColor::Magenta,
            LandmarkRole::NasalLeft | LandmarkRole::NasalRight => PointColor::Lime,
            LandmarkRole::FrameLeft | LandmarkRole::FrameRight => PointColor::Red,
            LandmarkRole::FrameBaseLeft | LandmarkRole::FrameBaseRight => PointColor::Orange,
        }
    }
}

impl std::fmt::Display for LandmarkRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Presentation tag for the renderer. Carries no meaning for the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointColor {
    Yellow,
    Cyan,
    Lime,
    Magenta,
    Red,
    Orange,
}

/// Result of feeding one drag event to a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// The delta was committed to the position.
    Moved,
    /// The handle is not draggable; input ignored.
    Locked,
    /// The transform or delta was degenerate; event dropped.
    Dropped,
}

/// One draggable calibration or measurement handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub role: LandmarkRole,
    position: Point,
    pub color: PointColor,
    pub draggable: bool,
}

impl LandmarkPoint {
    pub fn new(role: LandmarkRole, position: Point) -> Self {
        Self {
            role,
            position,
            color: role.default_color(),
            draggable: true,
        }
    }

    pub fn id(&self) -> &'static str {
        self.role.id()
    }

    /// Image-space position.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Accumulate a screen-space drag delta onto the image-space position.
    ///
    /// Only the scale affects a delta; translation cancels out for vectors.
    pub fn apply_drag_delta(&mut self, screen_delta: Point, transform: &ViewTransform) -> DragOutcome {
        if !self.draggable {
            return DragOutcome::Locked;
        }
        if !transform.is_invertible() || !screen_delta.is_finite() {
            tracing::debug!(
                landmark = self.id(),
                scale = transform.scale(),
                "dropping drag event with degenerate transform or delta"
            );
            return DragOutcome::Dropped;
        }
        self.position += screen_delta / transform.scale();
        DragOutcome::Moved
    }

    pub fn screen_position(&self, transform: &ViewTransform) -> Point {
        transform.to_screen(self.position)
    }

    /// Opacity the renderer should draw this handle with.
    pub fn display_opacity(&self, transform: &ViewTransform) -> f32 {
        if !transform.is_invertible() || !self.screen_position(transform).is_finite() {
            0.2
        } else if self.draggable {
            1.0
        } else {
            0.5
        }
    }
}

/// The handles of one stage, in placement order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    /// Place `roles` around the viewport center.
    ///
    /// `offsets` overrides [`LandmarkRole::default_offset`] per role. Offsets
    /// are screen-space and are mapped through `transform` so the handles
    /// appear at the requested spot whatever the current zoom.
    pub fn place(
        roles: &[LandmarkRole],
        offsets: &BTreeMap<LandmarkRole, Point>,
        viewport_center: Point,
        transform: &ViewTransform,
    ) -> Self {
        let points = roles
            .iter()
            .map(|&role| {
                let offset = offsets
                    .get(&role)
                    .copied()
                    .unwrap_or_else(|| role.default_offset());
                LandmarkPoint::new(role, transform.to_image(viewport_center + offset))
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains(&self, role: LandmarkRole) -> bool {
        self.get(role).is_some()
    }

    pub fn get(&self, role: LandmarkRole) -> Option<&LandmarkPoint> {
        self.points.iter().find(|p| p.role == role)
    }

    pub fn position(&self, role: LandmarkRole) -> Option<Point> {
        self.get(role).map(LandmarkPoint::position)
    }

    /// Lock or unlock every handle at once.
    pub fn set_draggable(&mut self, draggable: bool) {
        for point in &mut self.points {
            point.draggable = draggable;
        }
    }

    /// Drag one handle. `None` if the set has no handle for `role`.
    pub fn apply_drag(
        &mut self,
        role: LandmarkRole,
        screen_delta: Point,
        transform: &ViewTransform,
    ) -> Option<DragOutcome> {
        self.points
            .iter_mut()
            .find(|p| p.role == role)
            .map(|p| p.apply_drag_delta(screen_delta, transform))
    }

    /// Drag a handle until it sits under `screen_target`.
    ///
    /// Expressed as a single delta from the handle's current screen position,
    /// so it follows the same path as a finger drag.
    pub fn drag_to(
        &mut self,
        role: LandmarkRole,
        screen_target: Point,
        transform: &ViewTransform,
    ) -> Option<DragOutcome> {
        let current = self.get(role)?.screen_position(transform);
        self.apply_drag(role, screen_target - current, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn drag_at_identity_moves_by_delta() {
        let t = ViewTransform::default();
        let mut p = LandmarkPoint::new(LandmarkRole::PupilLeft, Point::new(10.0, 20.0));
        assert_eq!(p.apply_drag_delta(Point::new(5.0, -3.0), &t), DragOutcome::Moved);
        assert_eq!(p.position(), Point::new(15.0, 17.0));
    }

    #[test]
    fn drag_delta_is_divided_by_scale() {
        let mut t = ViewTransform::default();
        t.update_scale(4.0, Point::new(100.0, 100.0));
        t.update_translation(Point::new(37.0, -12.0));

        let mut p = LandmarkPoint::new(LandmarkRole::PupilRight, Point::new(10.0, 10.0));
        let before = p.screen_position(&t);
        p.apply_drag_delta(Point::new(8.0, 4.0), &t);

        assert!(close(p.position(), Point::new(12.0, 11.0)));
        // The handle follows the finger on screen.
        assert!(close(p.screen_position(&t), before + Point::new(8.0, 4.0)));
    }

    #[test]
    fn locked_point_ignores_drag() {
        let t = ViewTransform::default();
        let mut p = LandmarkPoint::new(LandmarkRole::FrameLeft, Point::new(1.0, 2.0));
        p.draggable = false;
        assert_eq!(p.apply_drag_delta(Point::new(50.0, 50.0), &t), DragOutcome::Locked);
        assert_eq!(p.position(), Point::new(1.0, 2.0));
    }

    #[test]
    fn degenerate_scale_drops_event() {
        let mut p = LandmarkPoint::new(LandmarkRole::PupilLeft, Point::new(3.0, 4.0));
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let t = ViewTransform::from_raw(scale, 0.0, 0.0);
            assert_eq!(p.apply_drag_delta(Point::new(1.0, 1.0), &t), DragOutcome::Dropped);
        }
        assert_eq!(p.position(), Point::new(3.0, 4.0));
    }

    #[test]
    fn non_finite_delta_drops_event() {
        let t = ViewTransform::default();
        let mut p = LandmarkPoint::new(LandmarkRole::PupilLeft, Point::new(3.0, 4.0));
        assert_eq!(
            p.apply_drag_delta(Point::new(f64::NAN, 1.0), &t),
            DragOutcome::Dropped
        );
        assert_eq!(p.position(), Point::new(3.0, 4.0));
    }

    #[test]
    fn deltas_accumulate_in_order() {
        let mut t = ViewTransform::default();
        let mut p = LandmarkPoint::new(LandmarkRole::NasalCenter, Point::zero());
        p.apply_drag_delta(Point::new(10.0, 0.0), &t);
        t.update_scale(2.0, Point::zero());
        p.apply_drag_delta(Point::new(10.0, 0.0), &t);
        assert!(close(p.position(), Point::new(15.0, 0.0)));
    }

    #[test]
    fn opacity_reflects_affordance() {
        let t = ViewTransform::default();
        let mut p = LandmarkPoint::new(LandmarkRole::PupilLeft, Point::zero());
        assert_eq!(p.display_opacity(&t), 1.0);
        p.draggable = false;
        assert_eq!(p.display_opacity(&t), 0.5);
        let broken = ViewTransform::from_raw(f64::NAN, 0.0, 0.0);
        assert_eq!(p.display_opacity(&broken), 0.2);
    }

    #[test]
    fn opacity_dims_whenever_drags_would_drop() {
        let mut p = LandmarkPoint::new(LandmarkRole::PupilRight, Point::new(10.0, 10.0));
        for scale in [0.0, -1.0, f64::INFINITY] {
            let t = ViewTransform::from_raw(scale, 0.0, 0.0);
            assert_eq!(p.display_opacity(&t), 0.2, "scale {scale}");
            assert_eq!(p.apply_drag_delta(Point::new(1.0, 1.0), &t), DragOutcome::Dropped);
        }
    }

    #[test]
    fn placement_uses_offsets_around_center() {
        let t = ViewTransform::default();
        let mut overrides = BTreeMap::new();
        overrides.insert(LandmarkRole::ReferenceEnd, Point::new(150.0, 5.0));
        let set = LandmarkSet::place(
            &LandmarkRole::CALIBRATION,
            &overrides,
            Point::new(200.0, 400.0),
            &t,
        );

        assert_eq!(set.len(), 2);
        assert_eq!(set.position(LandmarkRole::ReferenceStart), Some(Point::new(100.0, 400.0)));
        assert_eq!(set.position(LandmarkRole::ReferenceEnd), Some(Point::new(350.0, 405.0)));
        assert!(set.get(LandmarkRole::PupilLeft).is_none());
    }

    #[test]
    fn placement_maps_through_zoom() {
        let mut t = ViewTransform::default();
        t.set_zoom(2.0, Point::new(400.0, 800.0));
        let center = Point::new(200.0, 400.0);
        let set = LandmarkSet::place(&[LandmarkRole::PupilLeft], &BTreeMap::new(), center, &t);
        let handle = set.get(LandmarkRole::PupilLeft).unwrap();
        assert!(close(
            handle.screen_position(&t),
            center + LandmarkRole::PupilLeft.default_offset()
        ));
    }

    #[test]
    fn set_lock_and_drag_by_role() {
        let t = ViewTransform::default();
        let mut set = LandmarkSet::place(
            &LandmarkRole::MEASUREMENT,
            &BTreeMap::new(),
            Point::new(0.0, 0.0),
            &t,
        );

        set.set_draggable(false);
        assert_eq!(
            set.apply_drag(LandmarkRole::PupilLeft, Point::new(1.0, 1.0), &t),
            Some(DragOutcome::Locked)
        );
        set.set_draggable(true);
        assert_eq!(
            set.apply_drag(LandmarkRole::PupilLeft, Point::new(1.0, 1.0), &t),
            Some(DragOutcome::Moved)
        );
        assert_eq!(
            set.apply_drag(LandmarkRole::ReferenceStart, Point::new(1.0, 1.0), &t),
            None
        );
    }

    #[test]
    fn drag_to_lands_on_target() {
        let mut t = ViewTransform::default();
        t.update_scale(3.0, Point::new(20.0, 20.0));
        let mut set = LandmarkSet::new(vec![LandmarkPoint::new(
            LandmarkRole::FrameRight,
            Point::new(5.0, 5.0),
        )]);
        let target = Point::new(240.0, 130.0);
        set.drag_to(LandmarkRole::FrameRight, target, &t);
        let moved = set.get(LandmarkRole::FrameRight).unwrap();
        assert!(close(moved.screen_position(&t), target));
    }

    #[test]
    fn role_ids_are_stable() {
        assert_eq!(LandmarkRole::PupilLeft.id(), "pupil_left");
        assert_eq!(LandmarkRole::FrameBaseRight.to_string(), "frame_base_right");
        let json = serde_json::to_string(&LandmarkRole::NasalCenter).unwrap();
        assert_eq!(json, "\"nasal_center\"");
    }
}
