//! Pixel-to-millimeter calibration from a reference object of known width.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Point;

/// Width of an ISO/IEC 7810 ID-1 card (credit card, ID card) in millimeters.
pub const REFERENCE_CARD_WIDTH_MM: f64 = 85.6;

/// Reference spans shorter than this (in image pixels) count as coincident
/// handles.
pub const MIN_REFERENCE_SPAN_PX: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error(
        "Calibration failed: reference span of {distance_px} px gives {pixels_per_mm} px/mm; \
         reposition the points on the card edges"
    )]
    Invalid { distance_px: f64, pixels_per_mm: f64 },

    #[error("Calibration failed: reference length must be a positive number of millimeters, got {0}")]
    InvalidReferenceLength(f64),
}

/// Scale factor from image pixels to millimeters.
///
/// Always finite and strictly positive; the only constructor is
/// [`compute_scale`] (and deserialization, which re-validates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCalibration")]
#[serde(rename_all = "camelCase")]
pub struct CalibrationResult {
    pixels_per_mm: f64,
}

impl CalibrationResult {
    pub fn pixels_per_mm(&self) -> f64 {
        self.pixels_per_mm
    }

    /// Millimeters covered by `pixels` image pixels.
    pub fn to_mm(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_mm
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCalibration {
    pixels_per_mm: f64,
}

impl TryFrom<RawCalibration> for CalibrationResult {
    type Error = CalibrationError;

    fn try_from(raw: RawCalibration) -> Result<Self, Self::Error> {
        if is_valid_scale(raw.pixels_per_mm) {
            Ok(Self {
                pixels_per_mm: raw.pixels_per_mm,
            })
        } else {
            Err(CalibrationError::Invalid {
                distance_px: f64::NAN,
                pixels_per_mm: raw.pixels_per_mm,
            })
        }
    }
}

/// `true` for finite, strictly positive scale factors.
pub fn is_valid_scale(pixels_per_mm: f64) -> bool {
    pixels_per_mm.is_finite() && pixels_per_mm > 0.0
}

/// Derive pixels-per-millimeter from two reference handles spanning a known
/// physical length.
///
/// Pure: depends only on the two image-space positions and the length.
pub fn compute_scale(
    a: Point,
    b: Point,
    known_length_mm: f64,
) -> Result<CalibrationResult, CalibrationError> {
    if !known_length_mm.is_finite() || known_length_mm <= 0.0 {
        return Err(CalibrationError::InvalidReferenceLength(known_length_mm));
    }

    let distance_px = a.distance(&b);
    let pixels_per_mm = distance_px / known_length_mm;

    if !distance_px.is_finite() || distance_px < MIN_REFERENCE_SPAN_PX || !is_valid_scale(pixels_per_mm)
    {
        tracing::warn!(distance_px, pixels_per_mm, "calibration rejected");
        return Err(CalibrationError::Invalid {
            distance_px,
            pixels_per_mm,
        });
    }

    tracing::debug!(distance_px, pixels_per_mm, "calibration computed");
    Ok(CalibrationResult { pixels_per_mm })
}
