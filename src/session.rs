//! Stage sequencing: Capture → Calibrate → Measure → Result.
//!
//! Each interactive stage owns one [`ViewTransform`] (the single writer) and
//! one [`LandmarkSet`], and threads the transform by reference into every
//! drag and projection. Gestures are applied synchronously in arrival order.
//!
//! Pinch and pan are composed with an explicit mode toggle: in
//! [`InteractionMode::View`] the view gestures are live (and a pinch may carry
//! a simultaneous two-finger pan in one [`GestureEvent::PinchPan`] frame); in
//! [`InteractionMode::Points`] only handle drags are live.

use serde::{Deserialize, Serialize};

use crate::calibration::{compute_scale, CalibrationError, CalibrationResult};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::landmark::{DragOutcome, LandmarkRole, LandmarkSet};
use crate::metrics::{live_readouts, LiveReadout, Measurement, MeasurementRecord};
use crate::transform::ViewTransform;
use crate::types::{CapturedImage, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Capture,
    Calibrate,
    Measure,
    Result,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Capture => "capture",
            Stage::Calibrate => "calibrate",
            Stage::Measure => "measure",
            Stage::Result => "result",
        };
        f.write_str(name)
    }
}

/// Which gesture family is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// Pinch-zoom and two-finger pan move the image; handles are locked.
    View,
    /// One-finger drags move handles; the image stays put.
    #[default]
    Points,
}

/// One discrete input event from the gesture layer.
///
/// Deltas are incremental (change since the previous event), never totals
/// since the start of the gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureEvent {
    Pan { delta: Point },
    Pinch { scale: f64, pivot: Point },
    PinchPan { scale: f64, pivot: Point, translation: Point },
    Drag { landmark: LandmarkRole, delta: Point },
    DragTo { landmark: LandmarkRole, target: Point },
    /// Gesture interrupted; already-committed deltas stay.
    Cancel,
    SetMode { mode: InteractionMode },
    SetZoom { scale: f64 },
    /// One-tap zoom to `EngineConfig::zoom_presets[index]`.
    ZoomPreset { index: usize },
    ResetView,
}

/// What happened to a [`GestureEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Not live in the current mode, or the handle is locked.
    Ignored,
    /// Degenerate input, discarded.
    Dropped,
    /// The stage has no handle with that role.
    UnknownLandmark,
}

/// Pan/zoom state plus handles for one interactive stage.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveView {
    transform: ViewTransform,
    landmarks: LandmarkSet,
    mode: InteractionMode,
    viewport: Point,
    zoom_presets: Vec<f64>,
}

impl InteractiveView {
    fn enter(roles: &[LandmarkRole], config: &EngineConfig, viewport: Point) -> Self {
        let transform = ViewTransform::new(config.zoom_bounds);
        let landmarks = LandmarkSet::place(roles, &config.landmark_offsets, viewport / 2.0, &transform);
        let mut view = Self {
            transform,
            landmarks,
            mode: InteractionMode::default(),
            viewport,
            zoom_presets: config.zoom_presets.clone(),
        };
        view.set_mode(view.mode);
        view
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Viewport size in screen pixels.
    pub fn viewport(&self) -> Point {
        self.viewport
    }

    /// Zoom levels reachable through [`GestureEvent::ZoomPreset`].
    pub fn zoom_presets(&self) -> &[f64] {
        &self.zoom_presets
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
        self.landmarks.set_draggable(mode == InteractionMode::Points);
    }

    pub fn handle(&mut self, event: GestureEvent) -> EventOutcome {
        use GestureEvent::*;

        match (event, self.mode) {
            (SetMode { mode }, _) => {
                self.set_mode(mode);
                EventOutcome::Applied
            }
            (Cancel, _) => EventOutcome::Applied,
            (ResetView, _) => {
                self.transform.reset();
                EventOutcome::Applied
            }
            (SetZoom { scale }, _) => {
                if !scale.is_finite() || scale <= 0.0 {
                    return EventOutcome::Dropped;
                }
                self.transform.set_zoom(scale, self.viewport);
                EventOutcome::Applied
            }
            (ZoomPreset { index }, _) => match self.zoom_presets.get(index) {
                Some(&scale) => {
                    self.transform.set_zoom(scale, self.viewport);
                    EventOutcome::Applied
                }
                None => {
                    tracing::debug!(index, "no zoom preset at this index");
                    EventOutcome::Dropped
                }
            },
            (Pan { delta }, InteractionMode::View) => {
                if !delta.is_finite() {
                    return EventOutcome::Dropped;
                }
                self.transform.update_translation(delta);
                EventOutcome::Applied
            }
            (Pinch { scale, pivot }, InteractionMode::View) => self.pinch(scale, pivot),
            (
                PinchPan {
                    scale,
                    pivot,
                    translation,
                },
                InteractionMode::View,
            ) => {
                if !translation.is_finite() {
                    return EventOutcome::Dropped;
                }
                let outcome = self.pinch(scale, pivot);
                if outcome == EventOutcome::Applied {
                    self.transform.update_translation(translation);
                }
                outcome
            }
            (Drag { landmark, delta }, _) => {
                let outcome = self.landmarks.apply_drag(landmark, delta, &self.transform);
                Self::drag_outcome(landmark, outcome)
            }
            (DragTo { landmark, target }, _) => {
                if !target.is_finite() {
                    return EventOutcome::Dropped;
                }
                let outcome = self.landmarks.drag_to(landmark, target, &self.transform);
                Self::drag_outcome(landmark, outcome)
            }
            (Pan { .. } | Pinch { .. } | PinchPan { .. }, InteractionMode::Points) => {
                EventOutcome::Ignored
            }
        }
    }

    fn pinch(&mut self, scale: f64, pivot: Point) -> EventOutcome {
        if !scale.is_finite() || scale <= 0.0 || !pivot.is_finite() {
            return EventOutcome::Dropped;
        }
        self.transform.update_scale(scale, pivot);
        EventOutcome::Applied
    }

    fn drag_outcome(landmark: LandmarkRole, outcome: Option<DragOutcome>) -> EventOutcome {
        match outcome {
            Some(DragOutcome::Moved) => EventOutcome::Applied,
            Some(DragOutcome::Locked) => EventOutcome::Ignored,
            Some(DragOutcome::Dropped) => EventOutcome::Dropped,
            None => {
                tracing::debug!(%landmark, "drag for a handle this stage does not have");
                EventOutcome::UnknownLandmark
            }
        }
    }

    /// Screen-space segment between two handles, for line overlays.
    pub fn segment(&self, a: LandmarkRole, b: LandmarkRole) -> Option<(Point, Point)> {
        let pa = self.landmarks.position(a)?;
        let pb = self.landmarks.position(b)?;
        Some(self.transform.segment_to_screen(pa, pb))
    }
}

/// Calibration stage output, input of the measurement stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationHandoff {
    pub image: CapturedImage,
    pub calibration: CalibrationResult,
}

/// Measurement stage output, handed to the result collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementHandoff {
    pub image: CapturedImage,
    pub record: MeasurementRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStage {
    image: CapturedImage,
    view: InteractiveView,
    reference_length_mm: f64,
}

impl CalibrationStage {
    pub fn new(image: CapturedImage, config: &EngineConfig, viewport: Point) -> Self {
        Self {
            image,
            view: InteractiveView::enter(&LandmarkRole::CALIBRATION, config, viewport),
            reference_length_mm: config.reference_length_mm,
        }
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    pub fn view(&self) -> &InteractiveView {
        &self.view
    }

    pub fn handle(&mut self, event: GestureEvent) -> EventOutcome {
        self.view.handle(event)
    }

    /// Current reference span in image pixels.
    pub fn span_px(&self) -> f64 {
        match self.reference_points() {
            Some((a, b)) => a.distance(&b),
            None => 0.0,
        }
    }

    /// Screen-space line between the two reference handles.
    pub fn overlay_segment(&self) -> Option<(Point, Point)> {
        self.view
            .segment(LandmarkRole::ReferenceStart, LandmarkRole::ReferenceEnd)
    }

    fn reference_points(&self) -> Option<(Point, Point)> {
        let landmarks = self.view.landmarks();
        Some((
            landmarks.position(LandmarkRole::ReferenceStart)?,
            landmarks.position(LandmarkRole::ReferenceEnd)?,
        ))
    }

    pub fn confirm(&self) -> std::result::Result<CalibrationHandoff, CalibrationError> {
        let (a, b) = self.reference_points().unwrap_or((Point::zero(), Point::zero()));
        let calibration = compute_scale(a, b, self.reference_length_mm)?;
        Ok(CalibrationHandoff {
            image: self.image.clone(),
            calibration,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementStage {
    image: CapturedImage,
    calibration: CalibrationResult,
    view: InteractiveView,
    precision: u32,
}

impl MeasurementStage {
    pub fn new(handoff: CalibrationHandoff, config: &EngineConfig, viewport: Point) -> Self {
        Self {
            image: handoff.image,
            calibration: handoff.calibration,
            view: InteractiveView::enter(&config.measurement_roles(), config, viewport),
            precision: config.precision,
        }
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    pub fn calibration(&self) -> CalibrationResult {
        self.calibration
    }

    pub fn view(&self) -> &InteractiveView {
        &self.view
    }

    pub fn handle(&mut self, event: GestureEvent) -> EventOutcome {
        self.view.handle(event)
    }

    /// Live values for every measurement the placed handles support.
    pub fn readouts(&self) -> Vec<LiveReadout> {
        live_readouts(
            self.view.landmarks(),
            self.calibration.pixels_per_mm(),
            self.precision,
        )
    }

    /// Screen-space line for each measurement, for the renderer.
    pub fn overlay_segments(&self) -> Vec<(Measurement, Point, Point)> {
        Measurement::applicable(self.view.landmarks())
            .into_iter()
            .filter_map(|m| {
                let (a, b) = m.roles();
                self.view.segment(a, b).map(|(pa, pb)| (m, pa, pb))
            })
            .collect()
    }

    pub fn finalize(&self) -> Result<MeasurementHandoff> {
        let record =
            MeasurementRecord::from_landmarks(self.view.landmarks(), &self.calibration, self.precision)?;
        Ok(MeasurementHandoff {
            image: self.image.clone(),
            record,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    Capture,
    Calibrate(CalibrationStage),
    Measure {
        stage: MeasurementStage,
        previous: CalibrationStage,
    },
    Result(MeasurementHandoff),
}

/// Drives one measuring session through its stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    config: EngineConfig,
    viewport: Point,
    state: SessionState,
}

impl Session {
    /// Start at the capture stage. `viewport` is the screen size in pixels.
    pub fn new(config: EngineConfig, viewport: Point) -> Result<Self> {
        config.validate()?;
        if !viewport.is_finite() || viewport.x <= 0.0 || viewport.y <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "viewport must have a positive size, got {}x{}",
                viewport.x, viewport.y
            )));
        }
        Ok(Self {
            config,
            viewport,
            state: SessionState::Capture,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        match self.state {
            SessionState::Capture => Stage::Capture,
            SessionState::Calibrate(_) => Stage::Calibrate,
            SessionState::Measure { .. } => Stage::Measure,
            SessionState::Result(_) => Stage::Result,
        }
    }

    pub fn calibration_stage(&self) -> Option<&CalibrationStage> {
        match &self.state {
            SessionState::Calibrate(stage) => Some(stage),
            _ => None,
        }
    }

    pub fn measurement_stage(&self) -> Option<&MeasurementStage> {
        match &self.state {
            SessionState::Measure { stage, .. } => Some(stage),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&MeasurementHandoff> {
        match &self.state {
            SessionState::Result(handoff) => Some(handoff),
            _ => None,
        }
    }

    /// Accept an image from the capture collaborator. Also allowed from the
    /// result stage to measure a new photo.
    pub fn begin_calibration(&mut self, image: CapturedImage) -> Result<()> {
        match self.stage() {
            Stage::Capture | Stage::Result => {}
            actual => {
                return Err(Error::WrongStage {
                    expected: Stage::Capture,
                    actual,
                })
            }
        }
        tracing::info!(
            image = %image.handle,
            width = image.width_px,
            height = image.height_px,
            "entering calibration"
        );
        self.state = SessionState::Calibrate(CalibrationStage::new(image, &self.config, self.viewport));
        Ok(())
    }

    /// Route a gesture to the active stage.
    pub fn handle(&mut self, event: GestureEvent) -> Result<EventOutcome> {
        let current = self.stage();
        let outcome = match &mut self.state {
            SessionState::Calibrate(stage) => stage.handle(event),
            SessionState::Measure { stage, .. } => stage.handle(event),
            _ => return Err(Error::NotInteractive(current)),
        };
        if outcome != EventOutcome::Applied {
            tracing::debug!(?event, ?outcome, "gesture not applied");
        }
        Ok(outcome)
    }

    /// Compute the scale factor and move on to measuring.
    ///
    /// On a calibration failure the session stays on the calibration stage
    /// with its handles untouched, so the user can reposition and retry.
    pub fn confirm_calibration(&mut self) -> Result<CalibrationResult> {
        let stage = match &self.state {
            SessionState::Calibrate(stage) => stage,
            _ => {
                return Err(Error::WrongStage {
                    expected: Stage::Calibrate,
                    actual: self.stage(),
                })
            }
        };

        let handoff = stage.confirm()?;
        let calibration = handoff.calibration;
        let previous = stage.clone();
        tracing::info!(
            pixels_per_mm = calibration.pixels_per_mm(),
            "calibration confirmed"
        );
        self.state = SessionState::Measure {
            stage: MeasurementStage::new(handoff, &self.config, self.viewport),
            previous,
        };
        Ok(calibration)
    }

    /// Leave measuring and return to the calibration handles as they were
    /// left. The view transform starts over at identity.
    pub fn back_to_calibration(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, SessionState::Capture);
        match state {
            SessionState::Measure { mut previous, .. } => {
                previous.view.transform.reset();
                self.state = SessionState::Calibrate(previous);
                tracing::debug!("returned to calibration");
                Ok(())
            }
            other => {
                self.state = other;
                Err(Error::WrongStage {
                    expected: Stage::Measure,
                    actual: self.stage(),
                })
            }
        }
    }

    /// Freeze the measurement record and hand it to the result stage.
    pub fn finalize(&mut self) -> Result<MeasurementHandoff> {
        let handoff = match &self.state {
            SessionState::Measure { stage, .. } => stage.finalize()?,
            _ => {
                return Err(Error::WrongStage {
                    expected: Stage::Measure,
                    actual: self.stage(),
                })
            }
        };
        tracing::info!(
            pupillary_distance = handoff.record.pupillary_distance,
            frame_width = handoff.record.frame_width,
            "measurements finalized"
        );
        self.state = SessionState::Result(handoff.clone());
        Ok(handoff)
    }

    /// Drop everything and wait for a new image.
    pub fn restart(&mut self) {
        self.state = SessionState::Capture;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageHandle;

    const VIEWPORT: Point = Point::new(400.0, 800.0);

    fn image() -> CapturedImage {
        CapturedImage::new(ImageHandle::new("file:///photo.jpg"), 1080, 1920)
    }

    fn session() -> Session {
        Session::new(EngineConfig::default(), VIEWPORT).unwrap()
    }

    #[test]
    fn calibration_stage_starts_at_identity_with_two_handles() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        let stage = s.calibration_stage().unwrap();
        assert!(stage.view().transform().is_identity());
        assert_eq!(stage.view().landmarks().len(), 2);
        assert_eq!(stage.view().mode(), InteractionMode::Points);
        assert!((stage.span_px() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn view_gestures_ignored_in_points_mode() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        let outcome = s
            .handle(GestureEvent::Pinch {
                scale: 2.0,
                pivot: Point::new(10.0, 10.0),
            })
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(s.calibration_stage().unwrap().view().transform().is_identity());
    }

    #[test]
    fn drags_ignored_in_view_mode() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.handle(GestureEvent::SetMode {
            mode: InteractionMode::View,
        })
        .unwrap();
        let before = s.calibration_stage().unwrap().view().landmarks().clone();
        let outcome = s
            .handle(GestureEvent::Drag {
                landmark: LandmarkRole::ReferenceEnd,
                delta: Point::new(40.0, 0.0),
            })
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
        assert_eq!(s.calibration_stage().unwrap().view().landmarks(), &before);
    }

    #[test]
    fn pinch_pan_frame_merges_both() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.handle(GestureEvent::SetMode {
            mode: InteractionMode::View,
        })
        .unwrap();
        s.handle(GestureEvent::PinchPan {
            scale: 2.0,
            pivot: Point::new(50.0, 50.0),
            translation: Point::new(10.0, -5.0),
        })
        .unwrap();
        let t = s.calibration_stage().unwrap().view().transform();
        assert_eq!(t.scale(), 2.0);
        assert_eq!(t.translation(), Point::new(-40.0, -55.0));
    }

    #[test]
    fn view_changes_never_move_landmarks() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        let before = s.calibration_stage().unwrap().view().landmarks().clone();
        for event in [
            GestureEvent::SetMode {
                mode: InteractionMode::View,
            },
            GestureEvent::Pinch {
                scale: 3.0,
                pivot: Point::new(120.0, 300.0),
            },
            GestureEvent::Pan {
                delta: Point::new(-25.0, 60.0),
            },
            GestureEvent::SetZoom { scale: 4.0 },
            GestureEvent::ResetView,
        ] {
            s.handle(event).unwrap();
        }
        assert_eq!(s.calibration_stage().unwrap().view().landmarks(), &before);
    }

    #[test]
    fn failed_calibration_stays_on_stage() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        // Collapse the reference span.
        s.handle(GestureEvent::Drag {
            landmark: LandmarkRole::ReferenceEnd,
            delta: Point::new(-200.0, 0.0),
        })
        .unwrap();

        let err = s.confirm_calibration().unwrap_err();
        assert!(matches!(err, Error::Calibration(CalibrationError::Invalid { .. })));
        assert_eq!(s.stage(), Stage::Calibrate);

        // Retry after moving the handle apart again.
        s.handle(GestureEvent::Drag {
            landmark: LandmarkRole::ReferenceEnd,
            delta: Point::new(171.2, 0.0),
        })
        .unwrap();
        let calibration = s.confirm_calibration().unwrap();
        assert!((calibration.pixels_per_mm() - 2.0).abs() < 1e-9);
        assert_eq!(s.stage(), Stage::Measure);
    }

    #[test]
    fn measurement_stage_is_fresh() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.handle(GestureEvent::SetMode {
            mode: InteractionMode::View,
        })
        .unwrap();
        s.handle(GestureEvent::SetZoom { scale: 2.0 }).unwrap();
        s.confirm_calibration().unwrap();

        let stage = s.measurement_stage().unwrap();
        assert!(stage.view().transform().is_identity());
        assert_eq!(stage.view().landmarks().len(), 9);
        assert_eq!(stage.readouts().len(), 7);
        assert_eq!(stage.overlay_segments().len(), 7);
    }

    #[test]
    fn finalize_produces_result() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.confirm_calibration().unwrap();

        let live = s.measurement_stage().unwrap().readouts();
        let handoff = s.finalize().unwrap();
        assert_eq!(s.stage(), Stage::Result);
        assert_eq!(handoff.image, image());
        for readout in live {
            assert_eq!(readout.value, handoff.record.get(readout.measurement));
        }
        // Default handles: pupils 100 px apart, card 200 px for 85.6 mm.
        assert_eq!(handoff.record.pupillary_distance, 42.8);
    }

    #[test]
    fn restart_returns_to_capture() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.confirm_calibration().unwrap();
        s.finalize().unwrap();
        assert!(s.result().is_some());

        s.restart();
        assert_eq!(s.stage(), Stage::Capture);
        assert!(s.result().is_none());
        assert!(s.calibration_stage().is_none());
        assert!(matches!(
            s.handle(GestureEvent::ResetView),
            Err(Error::NotInteractive(Stage::Capture))
        ));

        // Restarting mid-calibration also discards the stage.
        s.begin_calibration(image()).unwrap();
        s.restart();
        assert_eq!(s.stage(), Stage::Capture);
    }

    #[test]
    fn zoom_presets_come_from_config() {
        let config = EngineConfig {
            zoom_presets: vec![1.0, 2.5, 8.0],
            ..Default::default()
        };
        let mut s = Session::new(config, VIEWPORT).unwrap();
        s.begin_calibration(image()).unwrap();

        let outcome = s.handle(GestureEvent::ZoomPreset { index: 1 }).unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        let t = *s.calibration_stage().unwrap().view().transform();
        assert_eq!(t.scale(), 2.5);
        // Recentred on the viewport center (200, 400).
        assert_eq!(t.translation(), Point::new(-300.0, -600.0));

        // Presets are clamped like any other zoom target.
        s.handle(GestureEvent::ZoomPreset { index: 2 }).unwrap();
        assert_eq!(s.calibration_stage().unwrap().view().transform().scale(), 5.0);

        let outcome = s.handle(GestureEvent::ZoomPreset { index: 3 }).unwrap();
        assert_eq!(outcome, EventOutcome::Dropped);
        assert_eq!(s.calibration_stage().unwrap().view().transform().scale(), 5.0);
    }

    #[test]
    fn default_presets_follow_measurement_stage() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.confirm_calibration().unwrap();
        let stage = s.measurement_stage().unwrap();
        assert_eq!(stage.view().zoom_presets(), &[1.0, 2.0, 4.0]);

        let before = stage.readouts();
        s.handle(GestureEvent::ZoomPreset { index: 2 }).unwrap();
        let stage = s.measurement_stage().unwrap();
        assert_eq!(stage.view().transform().scale(), 4.0);
        assert_eq!(stage.readouts(), before);
    }

    #[test]
    fn back_to_calibration_keeps_handles() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.handle(GestureEvent::Drag {
            landmark: LandmarkRole::ReferenceStart,
            delta: Point::new(-30.0, 0.0),
        })
        .unwrap();
        let placed = s.calibration_stage().unwrap().view().landmarks().clone();
        s.confirm_calibration().unwrap();

        s.back_to_calibration().unwrap();
        let stage = s.calibration_stage().unwrap();
        assert_eq!(stage.view().landmarks(), &placed);
        assert!(stage.view().transform().is_identity());
    }

    #[test]
    fn out_of_order_transitions_fail() {
        let mut s = session();
        assert!(matches!(
            s.confirm_calibration(),
            Err(Error::WrongStage {
                expected: Stage::Calibrate,
                actual: Stage::Capture
            })
        ));
        assert!(matches!(s.finalize(), Err(Error::WrongStage { .. })));
        assert!(matches!(s.back_to_calibration(), Err(Error::WrongStage { .. })));
        assert_eq!(s.stage(), Stage::Capture);
        assert!(matches!(
            s.handle(GestureEvent::Cancel),
            Err(Error::NotInteractive(Stage::Capture))
        ));

        s.begin_calibration(image()).unwrap();
        assert!(s.begin_calibration(image()).is_err());
    }

    #[test]
    fn unknown_landmark_is_reported() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        let outcome = s
            .handle(GestureEvent::Drag {
                landmark: LandmarkRole::PupilLeft,
                delta: Point::new(1.0, 1.0),
            })
            .unwrap();
        assert_eq!(outcome, EventOutcome::UnknownLandmark);
    }

    #[test]
    fn cancel_keeps_committed_deltas() {
        let mut s = session();
        s.begin_calibration(image()).unwrap();
        s.handle(GestureEvent::Drag {
            landmark: LandmarkRole::ReferenceEnd,
            delta: Point::new(15.0, 0.0),
        })
        .unwrap();
        s.handle(GestureEvent::Cancel).unwrap();
        assert!((s.calibration_stage().unwrap().span_px() - 215.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_viewport_rejected() {
        assert!(Session::new(EngineConfig::default(), Point::new(0.0, 100.0)).is_err());
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let event: GestureEvent = serde_json::from_str(
            r#"{"type": "drag", "landmark": "pupil_left", "delta": {"x": 3.0, "y": -1.5}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            GestureEvent::Drag {
                landmark: LandmarkRole::PupilLeft,
                delta: Point::new(3.0, -1.5)
            }
        );

        let event: GestureEvent =
            serde_json::from_str(r#"{"type": "zoom_preset", "index": 1}"#).unwrap();
        assert_eq!(event, GestureEvent::ZoomPreset { index: 1 });
    }
}
