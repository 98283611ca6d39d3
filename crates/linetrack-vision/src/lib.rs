//! `linetrack-vision` – the image side of the follower.
//!
//! Turns camera frames into the handful of numbers the controller needs.
//! Pixel storage is [`kornia_image::Image`]; thresholding and line drawing
//! come from `kornia_imgproc`.
//!
//! # Modules
//!
//! - [`frame`] – [`BgrFrame`][frame::BgrFrame]: a packed BGR8 image decoded
//!   from any supported `sensor_msgs/Image` encoding.
//! - [`color`] – [`hsv_from_bgr`][color::hsv_from_bgr]: 8-bit HSV conversion
//!   with hue in `[0, 180)`.
//! - [`mask`] – [`Mask`][mask::Mask], [`HsvRange`][mask::HsvRange] and
//!   [`SearchBand`][mask::SearchBand]: in-range thresholding and the
//!   horizontal band the follower searches.
//! - [`moments`] – [`Moments`][moments::Moments]: zeroth and first-order image
//!   moments and the derived centroid.
//! - [`draw`] – centroid marker for diagnostic output.

pub mod color;
pub mod draw;
pub mod frame;
pub mod mask;
pub mod moments;

pub use color::hsv_from_bgr;
pub use frame::BgrFrame;
pub use mask::{HsvRange, Mask, SearchBand};
pub use moments::{Centroid, Moments};
