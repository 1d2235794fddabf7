use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::REFERENCE_CARD_WIDTH_MM;
use crate::error::{Error, Result};
use crate::landmark::LandmarkRole;
use crate::metrics::DEFAULT_PRECISION;
use crate::transform::ZoomBounds;
use crate::types::Point;

/// Tunable constants for a measuring session.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Allowed zoom range for pinch and preset zoom.
    pub zoom_bounds: ZoomBounds,
    /// Zoom levels offered as one-tap presets.
    pub zoom_presets: Vec<f64>,
    /// Physical width of the reference object in millimeters.
    pub reference_length_mm: f64,
    /// Fractional digits for displayed and stored measurements.
    pub precision: u32,
    /// Place the nasal-left/right handles and report the bridge width.
    pub track_nasal_bridge: bool,
    /// Per-role starting offsets from the viewport center, in screen pixels.
    /// Roles not listed use [`LandmarkRole::default_offset`].
    pub landmark_offsets: BTreeMap<LandmarkRole, Point>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zoom_bounds: ZoomBounds::default(),
            zoom_presets: vec![1.0, 2.0, 4.0],
            reference_length_mm: REFERENCE_CARD_WIDTH_MM,
            precision: DEFAULT_PRECISION,
            track_nasal_bridge: true,
            landmark_offsets: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.zoom_bounds.is_valid() {
            return Err(Error::InvalidConfig(format!(
                "zoom bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.zoom_bounds.min, self.zoom_bounds.max
            )));
        }
        if let Some(bad) = self
            .zoom_presets
            .iter()
            .find(|z| !z.is_finite() || **z <= 0.0)
        {
            return Err(Error::InvalidConfig(format!("zoom preset {bad} is not positive")));
        }
        if !self.reference_length_mm.is_finite() || self.reference_length_mm <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "reference length must be positive, got {} mm",
                self.reference_length_mm
            )));
        }
        // f64 carries ~15 significant digits
        if self.precision > 12 {
            return Err(Error::InvalidConfig(format!(
                "precision {} exceeds 12 fractional digits",
                self.precision
            )));
        }
        if let Some((role, _)) = self.landmark_offsets.iter().find(|(_, p)| !p.is_finite()) {
            return Err(Error::InvalidConfig(format!("offset for {role} is not finite")));
        }
        Ok(())
    }

    /// Roles placed on the measurement stage under this config.
    pub fn measurement_roles(&self) -> Vec<LandmarkRole> {
        let mut roles = LandmarkRole::MEASUREMENT.to_vec();
        if self.track_nasal_bridge {
            roles.extend(LandmarkRole::NASAL_BRIDGE);
        }
        roles
    }
}
