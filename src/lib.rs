//! # face-gauge
//!
//! Card-calibrated optical measurements from user-placed facial landmarks.
//!
//! This crate provides:
//! - **Calibration**: pixels-per-millimeter from two handles on the edge of an
//!   ID-1 card (85.6 mm wide)
//! - **View transform**: pinch-zoom and pan that map image space to screen
//!   space without ever moving a landmark
//! - **Landmarks**: draggable handles whose screen-space drag deltas are
//!   accumulated in image space
//! - **Measurements**: pupillary distance, monocular PD, optical-center
//!   heights, frame width and nasal bridge width in millimeters
//!
//! ## Workflow
//!
//! 1. The capture collaborator supplies an image handle and its pixel size
//! 2. Calibrate: the user drags two handles to the card edges and confirms
//! 3. Measure: the user drags the pupil, nasal and frame handles while live
//!    readouts update
//! 4. Finalize: the rounded [`MeasurementRecord`] goes to the result screen
//!
//! ## Quick Start
//!
//! ```rust
//! use face_gauge::{
//!     CapturedImage, EngineConfig, GestureEvent, ImageHandle, LandmarkRole, Point, Session,
//! };
//!
//! let viewport = Point::new(400.0, 800.0);
//! let mut session = Session::new(EngineConfig::default(), viewport).unwrap();
//! session
//!     .begin_calibration(CapturedImage::new(ImageHandle::new("photo.jpg"), 1080, 1920))
//!     .unwrap();
//!
//! // Put the reference handles on the card edges (screen coordinates).
//! session
//!     .handle(GestureEvent::DragTo {
//!         landmark: LandmarkRole::ReferenceStart,
//!         target: Point::new(100.0, 200.0),
//!     })
//!     .unwrap();
//! session
//!     .handle(GestureEvent::DragTo {
//!         landmark: LandmarkRole::ReferenceEnd,
//!         target: Point::new(300.0, 200.0),
//!     })
//!     .unwrap();
//! let calibration = session.confirm_calibration().unwrap();
//! assert!((calibration.pixels_per_mm() - 200.0 / 85.6).abs() < 1e-9);
//!
//! for readout in session.measurement_stage().unwrap().readouts() {
//!     println!("{readout}");
//! }
//!
//! let result = session.finalize().unwrap();
//! println!("PD: {:.2} mm", result.record.pupillary_distance);
//! ```
//!
//! ## Pure functions
//!
//! The geometry is usable without a session:
//!
//! ```rust
//! use face_gauge::{compute_scale, euclidean_mm, Point, REFERENCE_CARD_WIDTH_MM};
//!
//! let k = compute_scale(Point::new(100.0, 200.0), Point::new(300.0, 200.0), REFERENCE_CARD_WIDTH_MM)
//!     .unwrap()
//!     .pixels_per_mm();
//! let pd = euclidean_mm(Point::new(150.0, 150.0), Point::new(250.0, 150.0), k);
//! assert!((pd - 42.8).abs() < 1e-9);
//! ```

mod calibration;
mod config;
mod error;
mod landmark;
mod metrics;
mod session;
mod transform;
mod types;

pub use calibration::{
    compute_scale, is_valid_scale, CalibrationError, CalibrationResult, MIN_REFERENCE_SPAN_PX,
    REFERENCE_CARD_WIDTH_MM,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use landmark::{DragOutcome, LandmarkPoint, LandmarkRole, LandmarkSet, PointColor};
pub use metrics::{
    euclidean_mm, horizontal_mm, live_readouts, round_to, vertical_mm, LiveReadout, Measurement,
    MeasurementRecord, Primitive, DEFAULT_PRECISION, MEASUREMENT_SENTINEL,
};
pub use session::{
    CalibrationHandoff, CalibrationStage, EventOutcome, GestureEvent, InteractionMode,
    InteractiveView, MeasurementHandoff, MeasurementStage, Session, Stage,
};
pub use transform::{InvalidZoomBounds, ViewTransform, ZoomBounds};
pub use types::{CapturedImage, ImageHandle, Point};
