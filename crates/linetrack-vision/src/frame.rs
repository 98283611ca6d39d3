//! [`BgrFrame`] – the fixed channel-order buffer every vision stage consumes.
//!
//! Camera drivers publish whatever encoding they like. [`BgrFrame::from_raw`]
//! re-encodes the common 8-bit layouts into a packed B,G,R
//! [`Image<u8, 3>`] so the rest of the pipeline never branches on encoding.

use std::fmt;

use kornia_image::{Image, ImageSize};
use linetrack_types::{LineError, RawImage};

use crate::color::hsv_from_bgr;

/// Byte layout of a supported `sensor_msgs/Image` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelLayout {
    Bgr8,
    Rgb8,
    Bgra8,
    Rgba8,
    Mono8,
}

impl PixelLayout {
    fn parse(encoding: &str) -> Result<Self, LineError> {
        match encoding {
            "bgr8" => Ok(Self::Bgr8),
            "rgb8" => Ok(Self::Rgb8),
            "bgra8" => Ok(Self::Bgra8),
            "rgba8" => Ok(Self::Rgba8),
            "mono8" | "8UC1" => Ok(Self::Mono8),
            other => Err(LineError::UnsupportedEncoding(other.to_string())),
        }
    }

    fn channels(self) -> usize {
        match self {
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Mono8 => 1,
        }
    }

    fn to_bgr(self, px: &[u8]) -> [u8; 3] {
        match self {
            Self::Bgr8 | Self::Bgra8 => [px[0], px[1], px[2]],
            Self::Rgb8 | Self::Rgba8 => [px[2], px[1], px[0]],
            Self::Mono8 => [px[0], px[0], px[0]],
        }
    }
}

/// Map a kornia error onto the frame error of this crate.
pub(crate) fn image_error(err: impl fmt::Display) -> LineError {
    LineError::InvalidFrame(err.to_string())
}

/// A packed BGR8 image backed by a kornia [`Image<u8, 3>`].
#[derive(Clone)]
pub struct BgrFrame {
    image: Image<u8, 3>,
}

impl BgrFrame {
    /// Wrap an already packed BGR8 buffer.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::InvalidFrame`] when either dimension is zero or
    /// `data` is not exactly `width * height * 3` bytes long.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, LineError> {
        if width == 0 || height == 0 {
            return Err(LineError::InvalidFrame(format!(
                "frame must have positive dimensions, got {width}x{height}"
            )));
        }
        let size = ImageSize {
            width: width as usize,
            height: height as usize,
        };
        let image = Image::new(size, data).map_err(image_error)?;
        Ok(Self { image })
    }

    /// A frame of the given size filled with a single BGR color.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self, LineError> {
        let pixels = width as usize * height as usize;
        let data = bgr.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(width, height, data)
    }

    /// Decode a `sensor_msgs/Image` into packed BGR8.
    ///
    /// Row padding (`step` larger than `width * channels`) is skipped.
    ///
    /// # Errors
    ///
    /// * [`LineError::UnsupportedEncoding`] for anything other than `bgr8`,
    ///   `rgb8`, `bgra8`, `rgba8` or `mono8`.
    /// * [`LineError::InvalidFrame`] for zero dimensions, a `step` shorter
    ///   than one row, or a buffer too short for `height` rows.
    pub fn from_raw(raw: &RawImage) -> Result<Self, LineError> {
        let layout = PixelLayout::parse(&raw.encoding)?;
        if raw.width == 0 || raw.height == 0 {
            return Err(LineError::InvalidFrame(format!(
                "frame must have positive dimensions, got {}x{}",
                raw.width, raw.height
            )));
        }

        let width = raw.width as usize;
        let height = raw.height as usize;
        let step = raw.step as usize;
        let row_bytes = width * layout.channels();
        if step < row_bytes {
            return Err(LineError::InvalidFrame(format!(
                "step {step} is shorter than a {width}-pixel {} row ({row_bytes} bytes)",
                raw.encoding
            )));
        }
        let needed = step * (height - 1) + row_bytes;
        if raw.data.len() < needed {
            return Err(LineError::InvalidFrame(format!(
                "image buffer holds {} bytes, {needed} required",
                raw.data.len()
            )));
        }

        let mut data = Vec::with_capacity(width * height * 3);
        for row in raw.data.chunks(step).take(height) {
            for px in row[..row_bytes].chunks_exact(layout.channels()) {
                data.extend_from_slice(&layout.to_bgr(px));
            }
        }

        Self::new(raw.width, raw.height, data)
    }

    /// Encode as a `bgr8` `sensor_msgs/Image`.
    pub fn to_raw(&self) -> RawImage {
        RawImage {
            height: self.height(),
            width: self.width(),
            encoding: "bgr8".to_string(),
            is_bigendian: 0,
            step: self.width() * 3,
            data: self.image.as_slice().to_vec(),
        }
    }

    /// Convert to 8-bit HSV with hue in `[0, 180)`.
    pub fn to_hsv(&self) -> Result<Image<u8, 3>, LineError> {
        let mut hsv = Image::<u8, 3>::from_size_val(self.image.size(), 0).map_err(image_error)?;
        hsv_from_bgr(&self.image, &mut hsv)?;
        Ok(hsv)
    }

    pub fn width(&self) -> u32 {
        self.image.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.image.height() as u32
    }

    pub fn size(&self) -> ImageSize {
        self.image.size()
    }

    pub fn as_image(&self) -> &Image<u8, 3> {
        &self.image
    }

    pub fn as_image_mut(&mut self) -> &mut Image<u8, 3> {
        &mut self.image
    }

    /// Packed B,G,R bytes, row-major.
    pub fn as_slice(&self) -> &[u8] {
        self.image.as_slice()
    }

    /// Return the BGR triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let i = self.offset(x, y)?;
        let data = self.image.as_slice();
        Some([data[i], data[i + 1], data[i + 2]])
    }

    /// Overwrite the pixel at `(x, y)`. Out-of-frame writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        if let Some(i) = self.offset(x, y) {
            self.image.as_slice_mut()[i..i + 3].copy_from_slice(&bgr);
        }
    }

    /// Paint the half-open rectangle `[x0, x1) x [y0, y1)`, clipped to the
    /// frame.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, bgr: [u8; 3]) {
        for y in y0..y1.min(self.height()) {
            for x in x0..x1.min(self.width()) {
                self.set_pixel(x, y, bgr);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some((y as usize * self.image.width() + x as usize) * 3)
    }
}

impl PartialEq for BgrFrame {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.as_slice() == other.as_slice()
    }
}

impl fmt::Debug for BgrFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BgrFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}
