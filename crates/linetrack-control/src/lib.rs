//! `linetrack-control` – from centroid to wheel command.
//!
//! # Modules
//!
//! - [`steering`] – [`ProportionalSteering`][steering::ProportionalSteering]:
//!   the stateless P-only steering law.
//! - [`follower`] – [`LineFollower`][follower::LineFollower]: the visual
//!   centroid controller. One frame in, at most one
//!   [`VelocityCommand`][linetrack_types::VelocityCommand] out.

pub mod follower;
pub mod steering;

pub use follower::{Detection, FollowerConfig, LineFollower};
pub use steering::ProportionalSteering;
