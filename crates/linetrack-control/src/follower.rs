//! [`LineFollower`] – the visual centroid controller.
//!
//! Each call to [`LineFollower::process`]:
//!
//! 1. converts the frame to HSV,
//! 2. thresholds it against the target color range,
//! 3. clears every row outside the [`SearchBand`],
//! 4. takes the moments of what is left,
//! 5. steers toward the centroid if anything matched.
//!
//! When nothing matched no command is produced at all; the drive base keeps
//! whatever it was last told.

use linetrack_types::{DetectionReport, LineError, VelocityCommand};
use linetrack_vision::draw::{self, MARKER_COLOR, MARKER_RADIUS};
use linetrack_vision::{BgrFrame, Centroid, HsvRange, Mask, Moments, SearchBand};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::steering::{DEFAULT_LINEAR_SPEED, DEFAULT_STEERING_DIVISOR, ProportionalSteering};

/// Tunables for [`LineFollower`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerConfig {
    /// Width of the near-white acceptance range (max S, 255 - min V).
    #[serde(default = "default_sensitivity")]
    pub sensitivity: u8,

    /// Height of the search band in rows.
    #[serde(default = "default_band_height")]
    pub band_height: u32,

    /// Last row (exclusive) cleared below the band. `None` clears to the
    /// bottom of the frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion_end: Option<u32>,

    /// Forward speed while the line is visible, m/s.
    #[serde(default = "default_linear_speed")]
    pub linear_speed: f64,

    /// Pixels of error per rad/s of yaw rate.
    #[serde(default = "default_steering_divisor")]
    pub steering_divisor: f64,
}

fn default_sensitivity() -> u8 {
    8
}
fn default_band_height() -> u32 {
    20
}
fn default_linear_speed() -> f64 {
    DEFAULT_LINEAR_SPEED
}
fn default_steering_divisor() -> f64 {
    DEFAULT_STEERING_DIVISOR
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            band_height: default_band_height(),
            exclusion_end: None,
            linear_speed: default_linear_speed(),
            steering_divisor: default_steering_divisor(),
        }
    }
}

impl FollowerConfig {
    /// # Errors
    ///
    /// Returns [`LineError::Config`] for a zero band height, a zero or
    /// non-finite steering divisor, or a non-finite linear speed.
    pub fn validate(&self) -> Result<(), LineError> {
        if self.band_height == 0 {
            return Err(LineError::Config("band_height must be positive".to_string()));
        }
        if !self.steering_divisor.is_finite() || self.steering_divisor == 0.0 {
            return Err(LineError::Config(format!(
                "steering_divisor must be finite and nonzero, got {}",
                self.steering_divisor
            )));
        }
        if !self.linear_speed.is_finite() {
            return Err(LineError::Config(format!(
                "linear_speed must be finite, got {}",
                self.linear_speed
            )));
        }
        Ok(())
    }
}

/// Everything [`LineFollower::process`] derived from one frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub band: SearchBand,
    /// The thresholded mask after band restriction.
    pub mask: Mask,
    pub moments: Moments,
    pub centroid: Option<Centroid>,
    pub command: Option<VelocityCommand>,
}

impl Detection {
    pub fn report(&self) -> DetectionReport {
        DetectionReport {
            mass: self.moments.m00,
            centroid: self.centroid.map(|c| (c.x, c.y)),
            command: self.command,
        }
    }
}

/// The visual centroid controller.
#[derive(Debug, Clone)]
pub struct LineFollower {
    range: HsvRange,
    band_height: u32,
    exclusion_end: Option<u32>,
    steering: ProportionalSteering,
}

impl LineFollower {
    /// # Errors
    ///
    /// Propagates [`FollowerConfig::validate`] failures.
    pub fn new(config: &FollowerConfig) -> Result<Self, LineError> {
        config.validate()?;
        let steering = ProportionalSteering::new(config.linear_speed, config.steering_divisor);
        debug!(
            sensitivity = config.sensitivity,
            band_height = config.band_height,
            exclusion_end = ?config.exclusion_end,
            linear_speed = steering.linear_speed(),
            divisor = steering.divisor(),
            "line follower configured"
        );
        Ok(Self {
            range: HsvRange::near_white(config.sensitivity),
            band_height: config.band_height,
            exclusion_end: config.exclusion_end,
            steering,
        })
    }

    /// Track an arbitrary HSV range instead of near-white.
    pub fn with_range(mut self, range: HsvRange) -> Self {
        self.range = range;
        self
    }

    pub fn range(&self) -> &HsvRange {
        &self.range
    }

    /// Run the full pipeline on one frame.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::InvalidFrame`] when an image buffer cannot be
    /// allocated for the frame geometry.
    pub fn process(&self, frame: &BgrFrame) -> Result<Detection, LineError> {
        let hsv = frame.to_hsv()?;
        let mut mask = Mask::in_range(&hsv, &self.range)?;
        let band = SearchBand::for_height(frame.height(), self.band_height, self.exclusion_end);
        mask.restrict_to_band(&band);

        let moments = Moments::of(&mask);
        let centroid = moments.centroid();
        let command = centroid.map(|c| self.steering.command(c.x, frame.width()));

        match (&centroid, &command) {
            (Some(c), Some(cmd)) => debug!(
                mass = moments.m00,
                cx = c.x,
                cy = c.y,
                linear_x = cmd.linear_x,
                angular_z = cmd.angular_z,
                "line found in search band"
            ),
            _ => debug!(band_top = band.top, band_bottom = band.bottom, "no line in search band"),
        }

        Ok(Detection {
            band,
            mask,
            moments,
            centroid,
            command,
        })
    }

    /// Convenience wrapper returning only the command.
    pub fn command_for(&self, frame: &BgrFrame) -> Result<Option<VelocityCommand>, LineError> {
        Ok(self.process(frame)?.command)
    }

    /// Copy of `frame` with the centroid marked, for diagnostics.
    pub fn annotate(frame: &BgrFrame, detection: &Detection) -> BgrFrame {
        let mut out = frame.clone();
        if let Some(c) = detection.centroid {
            // Truncated to whole pixels, as the marker is presentation only.
            draw::draw_filled_circle(
                out.as_image_mut(),
                (c.x as i64, c.y as i64),
                MARKER_RADIUS,
                MARKER_COLOR,
            );
        }
        out
    }
}
