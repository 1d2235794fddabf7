//! Optical measurements from landmark pairs.
//!
//! This module provides the three distance primitives (full, horizontal-only,
//! vertical-only), the fixed table of named measurements built on them, and
//! the record handed to the result collaborator. Live readouts and the final
//! record share [`Measurement::compute`] and [`round_to`], so what the user
//! saw is what gets saved.

use serde::{Deserialize, Serialize};

use crate::calibration::{is_valid_scale, CalibrationResult};
use crate::error::{Error, Result};
use crate::landmark::{LandmarkRole, LandmarkSet};
use crate::types::Point;

/// Value the primitives return when the scale factor is unusable.
pub const MEASUREMENT_SENTINEL: f64 = 0.0;

/// Default number of fractional digits for displayed and stored values.
pub const DEFAULT_PRECISION: u32 = 2;

/// Straight-line distance in millimeters.
pub fn euclidean_mm(p1: Point, p2: Point, pixels_per_mm: f64) -> f64 {
    if !is_valid_scale(pixels_per_mm) {
        return MEASUREMENT_SENTINEL;
    }
    p1.distance(&p2) / pixels_per_mm
}

/// Horizontal offset in millimeters, ignoring vertical displacement.
pub fn horizontal_mm(p1: Point, p2: Point, pixels_per_mm: f64) -> f64 {
    if !is_valid_scale(pixels_per_mm) {
        return MEASUREMENT_SENTINEL;
    }
    (p1.x - p2.x).abs() / pixels_per_mm
}

/// Vertical offset in millimeters, ignoring horizontal displacement.
pub fn vertical_mm(p1: Point, p2: Point, pixels_per_mm: f64) -> f64 {
    if !is_valid_scale(pixels_per_mm) {
        return MEASUREMENT_SENTINEL;
    }
    (p1.y - p2.y).abs() / pixels_per_mm
}

/// Round half away from zero to `precision` fractional digits.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// Which distance primitive a measurement uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Euclidean,
    Horizontal,
    Vertical,
}

impl Primitive {
    pub fn apply(&self, p1: Point, p2: Point, pixels_per_mm: f64) -> f64 {
        match self {
            Primitive::Euclidean => euclidean_mm(p1, p2, pixels_per_mm),
            Primitive::Horizontal => horizontal_mm(p1, p2, pixels_per_mm),
            Primitive::Vertical => vertical_mm(p1, p2, pixels_per_mm),
        }
    }
}

/// The named measurements and the landmark pair each one is taken between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Measurement {
    PupillaryDistance,
    FrameWidth,
    PdLeft,
    PdRight,
    OpticalCenterLeft,
    OpticalCenterRight,
    NasalBridge,
}

impl Measurement {
    /// Measurements every finalized record carries.
    pub const REQUIRED: [Measurement; 6] = [
        Measurement::PupillaryDistance,
        Measurement::FrameWidth,
        Measurement::PdLeft,
        Measurement::PdRight,
        Measurement::OpticalCenterLeft,
        Measurement::OpticalCenterRight,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Measurement::PupillaryDistance => "pupillaryDistance",
            Measurement::FrameWidth => "frameWidth",
            Measurement::PdLeft => "pdLeft",
            Measurement::PdRight => "pdRight",
            Measurement::OpticalCenterLeft => "opticalCenterLeft",
            Measurement::OpticalCenterRight => "opticalCenterRight",
            Measurement::NasalBridge => "nasalBridge",
        }
    }

    /// Short label for on-screen readouts.
    pub fn label(&self) -> &'static str {
        match self {
            Measurement::PupillaryDistance => "PD",
            Measurement::FrameWidth => "Frame width",
            Measurement::PdLeft => "PD left",
            Measurement::PdRight => "PD right",
            Measurement::OpticalCenterLeft => "OC height left",
            Measurement::OpticalCenterRight => "OC height right",
            Measurement::NasalBridge => "Nasal bridge",
        }
    }

    pub fn primitive(&self) -> Primitive {
        match self {
            Measurement::PupillaryDistance | Measurement::FrameWidth | Measurement::NasalBridge => {
                Primitive::Euclidean
            }
            Measurement::PdLeft | Measurement::PdRight => Primitive::Horizontal,
            Measurement::OpticalCenterLeft | Measurement::OpticalCenterRight => Primitive::Vertical,
        }
    }

    pub fn roles(&self) -> (LandmarkRole, LandmarkRole) {
        match self {
            Measurement::PupillaryDistance => (LandmarkRole::PupilLeft, LandmarkRole::PupilRight),
            Measurement::FrameWidth => (LandmarkRole::FrameLeft, LandmarkRole::FrameRight),
            Measurement::PdLeft => (LandmarkRole::PupilLeft, LandmarkRole::NasalCenter),
            Measurement::PdRight => (LandmarkRole::PupilRight, LandmarkRole::NasalCenter),
            Measurement::OpticalCenterLeft => (LandmarkRole::PupilLeft, LandmarkRole::FrameBaseLeft),
            Measurement::OpticalCenterRight => {
                (LandmarkRole::PupilRight, LandmarkRole::FrameBaseRight)
            }
            Measurement::NasalBridge => (LandmarkRole::NasalLeft, LandmarkRole::NasalRight),
        }
    }

    /// Unrounded value, `None` if either landmark is missing from `landmarks`.
    pub fn compute(&self, landmarks: &LandmarkSet, pixels_per_mm: f64) -> Option<f64> {
        let (a, b) = self.roles();
        let p1 = landmarks.position(a)?;
        let p2 = landmarks.position(b)?;
        Some(self.primitive().apply(p1, p2, pixels_per_mm))
    }

    /// The measurements applicable to a landmark set, in display order.
    pub fn applicable(landmarks: &LandmarkSet) -> Vec<Measurement> {
        let mut out = Measurement::REQUIRED.to_vec();
        if landmarks.contains(LandmarkRole::NasalLeft) && landmarks.contains(LandmarkRole::NasalRight)
        {
            out.push(Measurement::NasalBridge);
        }
        out.retain(|m| {
            let (a, b) = m.roles();
            landmarks.contains(a) && landmarks.contains(b)
        });
        out
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Finalized measurements in millimeters, rounded to the configured precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub pupillary_distance: f64,
    pub frame_width: f64,
    pub pd_left: f64,
    pub pd_right: f64,
    pub optical_center_left: f64,
    pub optical_center_right: f64,
    /// Only measured when the nasal-bridge handles were placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nasal_bridge: Option<f64>,
}

impl MeasurementRecord {
    /// Build the record from the measurement-stage handles.
    ///
    /// Fails if a handle required by one of the six core measurements is
    /// missing. An invalid scale is unrepresentable here.
    pub fn from_landmarks(
        landmarks: &LandmarkSet,
        calibration: &CalibrationResult,
        precision: u32,
    ) -> Result<Self> {
        let k = calibration.pixels_per_mm();
        let value = |m: Measurement| -> Result<f64> {
            let (a, b) = m.roles();
            for role in [a, b] {
                if !landmarks.contains(role) {
                    return Err(Error::MissingLandmark(role));
                }
            }
            m.compute(landmarks, k)
                .map(|v| round_to(v, precision))
                .ok_or(Error::MissingLandmark(a))
        };

        Ok(Self {
            pupillary_distance: value(Measurement::PupillaryDistance)?,
            frame_width: value(Measurement::FrameWidth)?,
            pd_left: value(Measurement::PdLeft)?,
            pd_right: value(Measurement::PdRight)?,
            optical_center_left: value(Measurement::OpticalCenterLeft)?,
            optical_center_right: value(Measurement::OpticalCenterRight)?,
            nasal_bridge: Measurement::NasalBridge
                .compute(landmarks, k)
                .map(|v| round_to(v, precision)),
        })
    }

    pub fn get(&self, measurement: Measurement) -> Option<f64> {
        match measurement {
            Measurement::PupillaryDistance => Some(self.pupillary_distance),
            Measurement::FrameWidth => Some(self.frame_width),
            Measurement::PdLeft => Some(self.pd_left),
            Measurement::PdRight => Some(self.pd_right),
            Measurement::OpticalCenterLeft => Some(self.optical_center_left),
            Measurement::OpticalCenterRight => Some(self.optical_center_right),
            Measurement::NasalBridge => self.nasal_bridge,
        }
    }

    /// Present measurements in display order.
    pub fn entries(&self) -> Vec<(Measurement, f64)> {
        Measurement::REQUIRED
            .iter()
            .chain(std::iter::once(&Measurement::NasalBridge))
            .filter_map(|&m| self.get(m).map(|v| (m, v)))
            .collect()
    }
}

/// One live on-screen value.
///
/// `value` is `None` while the scale factor is unusable, so the readout shows
/// a placeholder instead of a plausible-looking zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveReadout {
    pub measurement: Measurement,
    pub value: Option<f64>,
    pub precision: u32,
}

impl std::fmt::Display for LiveReadout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            Some(v) => write!(
                f,
                "{}: {:.*} mm",
                self.measurement.label(),
                self.precision as usize,
                v
            ),
            None => write!(f, "{}: -- mm", self.measurement.label()),
        }
    }
}

/// Recompute every applicable readout from the current handle positions.
pub fn live_readouts(landmarks: &LandmarkSet, pixels_per_mm: f64, precision: u32) -> Vec<LiveReadout> {
    let valid = is_valid_scale(pixels_per_mm);
    Measurement::applicable(landmarks)
        .into_iter()
        .map(|measurement| LiveReadout {
            measurement,
            value: if valid {
                measurement
                    .compute(landmarks, pixels_per_mm)
                    .map(|v| round_to(v, precision))
            } else {
                None
            },
            precision,
        })
        .collect()
}
