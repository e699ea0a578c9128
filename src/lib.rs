pub mod body;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod measure;
pub mod pose;
pub mod store;

pub use body::{BodyMeasurements, BodyPart, Coefficients, PerPart};
pub use calibration::{CalibrationProfile, DEFAULT_COEFFICIENTS};
pub use engine::{Estimate, MeasurementEngine, ViewImages};
pub use error::{EngineError, InvalidInput, Result};
pub use pose::{Keypoint, KeypointIndex, PoseDetector, PoseLandmarkSet, View, ViewSet};
pub use store::{CalibrationService, ProfileStore};
