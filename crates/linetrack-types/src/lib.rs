use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Planar velocity command for a differential-drive base.
///
/// Only the two degrees of freedom the follower actuates are carried; the
/// remaining `geometry_msgs/Twist` fields are always zero on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward speed in m/s.
    pub linear_x: f64,
    /// Yaw rate in rad/s, positive turns left.
    pub angular_z: f64,
}

impl VelocityCommand {
    pub fn new(linear_x: f64, angular_z: f64) -> Self {
        Self {
            linear_x,
            angular_z,
        }
    }

    /// A command that brings the base to rest.
    pub fn stop() -> Self {
        Self::default()
    }
}

/// Wire form of a `sensor_msgs/Image`.
///
/// `data` holds `height` rows of `step` bytes each, laid out according to
/// `encoding` (e.g. `"rgb8"`, `"bgr8"`, `"mono8"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    #[serde(default)]
    pub is_bigendian: u8,
    /// Full row length in bytes.
    pub step: u32,
    pub data: Vec<u8>,
}

/// Summary of one controller invocation, emitted for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Number of matching pixels inside the search band (`m00`).
    pub mass: f64,
    /// Centroid `(cx, cy)` in pixel coordinates, absent when nothing matched.
    pub centroid: Option<(f64, f64)>,
    /// Command issued for this frame, if any.
    pub command: Option<VelocityCommand>,
}

/// Unified event wrapper for the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "linetrack-middleware::rosbridge/camera"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a freshly stamped envelope.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A camera frame as received from the robot.
    Image(RawImage),
    /// A velocity command destined for the drive base.
    Velocity(VelocityCommand),
    /// Per-frame controller outcome.
    Detection(DetectionReport),
    /// Presentation-only image (annotated frame or mask).
    DiagnosticImage { label: String, image: RawImage },
    Fault { component: String, message: String },
}

/// Error type shared by every linetrack crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unsupported image encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
