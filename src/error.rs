use thiserror::Error;

use crate::calibration::CalibrationError;
use crate::landmark::LandmarkRole;
use crate::session::Stage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("Landmark '{0}' is not placed on this stage")]
    MissingLandmark(LandmarkRole),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation requires the {expected} stage, but the session is in the {actual} stage")]
    WrongStage { expected: Stage, actual: Stage },

    #[error("The {0} stage does not accept gestures")]
    NotInteractive(Stage),
}

pub type Result<T> = std::result::Result<T, Error>;
