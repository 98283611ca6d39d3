//! Proportional steering toward the image center.
//!
//! The error is the horizontal distance between the tracked centroid and the
//! middle column of the frame. The yaw rate is that error scaled by
//! `-1 / divisor`, so a line to the right of center turns the robot right
//! (negative `angular_z`). Forward speed is constant.
//!
//! # Example
//!
//! ```rust
//! use linetrack_control::steering::ProportionalSteering;
//!
//! let steering = ProportionalSteering::default();
//! let cmd = steering.command(350.0, 640);
//! assert_eq!(cmd.linear_x, 0.8);
//! assert_eq!(cmd.angular_z, -1.0); // -(350 - 320) / 30
//! ```

use linetrack_types::VelocityCommand;

/// Forward speed used while a line is visible.
pub const DEFAULT_LINEAR_SPEED: f64 = 0.8;

/// Pixels of horizontal error per rad/s of yaw rate.
pub const DEFAULT_STEERING_DIVISOR: f64 = 30.0;

/// P-only steering law. Holds no state between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionalSteering {
    linear_speed: f64,
    divisor: f64,
}

impl ProportionalSteering {
    /// `divisor` must be nonzero; callers validate it via
    /// [`FollowerConfig::validate`][crate::follower::FollowerConfig::validate].
    pub fn new(linear_speed: f64, divisor: f64) -> Self {
        Self {
            linear_speed,
            divisor,
        }
    }

    pub fn linear_speed(&self) -> f64 {
        self.linear_speed
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    /// Horizontal error of `cx` relative to the middle of a `width`-pixel row.
    pub fn error(cx: f64, width: u32) -> f64 {
        cx - f64::from(width) / 2.0
    }

    /// Compute the command for a centroid at column `cx`.
    pub fn command(&self, cx: f64, width: u32) -> VelocityCommand {
        let err = Self::error(cx, width);
        VelocityCommand {
            linear_x: self.linear_speed,
            angular_z: -err / self.divisor,
        }
    }
}

impl Default for ProportionalSteering {
    fn default() -> Self {
        Self::new(DEFAULT_LINEAR_SPEED, DEFAULT_STEERING_DIVISOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_line_drives_straight() {
        let cmd = ProportionalSteering::default().command(320.0, 640);
        assert_eq!(cmd.linear_x, 0.8);
        assert_eq!(cmd.angular_z, 0.0);
    }

    #[test]
    fn line_left_of_center_turns_left() {
        let cmd = ProportionalSteering::default().command(260.0, 640);
        // err = -60 -> angular_z = 2
        assert!((cmd.angular_z - 2.0).abs() < 1e-12);
    }

    #[test]
    fn line_right_of_center_turns_right() {
        let cmd = ProportionalSteering::default().command(400.0, 640);
        assert!(cmd.angular_z < 0.0);
        assert!((cmd.angular_z + 80.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn odd_width_center_is_fractional() {
        assert_eq!(ProportionalSteering::error(2.0, 5), -0.5);
    }

    #[test]
    fn custom_gains_apply() {
        let steering = ProportionalSteering::new(0.3, 10.0);
        assert_eq!(steering.linear_speed(), 0.3);
        assert_eq!(steering.divisor(), 10.0);
        let cmd = steering.command(110.0, 200);
        assert_eq!(cmd.linear_x, 0.3);
        assert!((cmd.angular_z + 1.0).abs() < 1e-12);
    }

    #[test]
    fn output_does_not_depend_on_history() {
        let steering = ProportionalSteering::default();
        let first = steering.command(100.0, 640);
        let _ = steering.command(600.0, 640);
        assert_eq!(steering.command(100.0, 640), first);
    }
}
