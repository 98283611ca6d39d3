//! In-range thresholding and the horizontal search band.
//!
//! The follower only looks at a thin strip of the image, three quarters of
//! the way down, where the line is close to the robot. [`SearchBand`]
//! describes that strip and [`Mask::restrict_to_band`] clears everything
//! outside it.

use std::fmt;

use kornia_image::Image;
use kornia_imgproc::threshold;
use linetrack_types::{LineError, RawImage};

use crate::frame::image_error;

/// Value written for matching mask pixels.
pub const MASK_ON: u8 = 255;

/// Inclusive per-channel HSV bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Bright, nearly unsaturated pixels of any hue.
    ///
    /// `sensitivity` widens the range: S up to `sensitivity`, V down to
    /// `255 - sensitivity`.
    pub fn near_white(sensitivity: u8) -> Self {
        Self {
            lower: [0, 0, 255 - sensitivity],
            upper: [255, sensitivity, 255],
        }
    }
}

/// Rows of a frame that take part in centroid computation.
///
/// Rows `[0, top)` are always excluded. Rows `[bottom, exclusion_end)` are
/// excluded as well; when `exclusion_end` is at or above `bottom` nothing
/// below the band is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBand {
    pub top: u32,
    pub bottom: u32,
    pub exclusion_end: u32,
}

impl SearchBand {
    /// Band of `band_height` rows starting at `3 * height / 4`.
    ///
    /// `exclusion_end` bounds the cleared region below the band and defaults
    /// to `height`. Passing a fixed row (e.g. `Some(100)`) keeps every row
    /// from that point on searchable.
    pub fn for_height(height: u32, band_height: u32, exclusion_end: Option<u32>) -> Self {
        let top = 3 * height / 4;
        let bottom = top.saturating_add(band_height).min(height);
        let exclusion_end = exclusion_end.unwrap_or(height).min(height);
        Self {
            top,
            bottom,
            exclusion_end,
        }
    }

    /// Whether row `y` is searched.
    pub fn contains_row(&self, y: u32) -> bool {
        y >= self.top && !(y >= self.bottom && y < self.exclusion_end)
    }
}

/// A single-channel binary image: [`MASK_ON`] for matches, `0` otherwise.
#[derive(Clone)]
pub struct Mask {
    image: Image<u8, 1>,
}

impl Mask {
    /// Threshold an 8-bit HSV image against `range`.
    pub fn in_range(hsv: &Image<u8, 3>, range: &HsvRange) -> Result<Self, LineError> {
        let mut image = Image::<u8, 1>::from_size_val(hsv.size(), 0).map_err(image_error)?;
        threshold::in_range(hsv, &mut image, &range.lower, &range.upper).map_err(image_error)?;
        Ok(Self { image })
    }

    /// Clear every row outside `band`. Columns are left untouched.
    pub fn restrict_to_band(&mut self, band: &SearchBand) {
        let width = self.image.width();
        for (y, row) in self.image.as_slice_mut().chunks_exact_mut(width).enumerate() {
            if !band.contains_row(y as u32) {
                row.fill(0);
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.image.height() as u32
    }

    pub fn as_image(&self) -> &Image<u8, 1> {
        &self.image
    }

    pub fn as_slice(&self) -> &[u8] {
        self.image.as_slice()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(self.as_slice()[y as usize * self.image.width() + x as usize])
    }

    pub fn count_nonzero(&self) -> usize {
        self.as_slice().iter().filter(|&&v| v != 0).count()
    }

    /// Encode as a `mono8` `sensor_msgs/Image`.
    pub fn to_raw(&self) -> RawImage {
        RawImage {
            height: self.height(),
            width: self.width(),
            encoding: "mono8".to_string(),
            is_bigendian: 0,
            step: self.width(),
            data: self.as_slice().to_vec(),
        }
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("nonzero", &self.count_nonzero())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BgrFrame;
    use kornia_image::ImageSize;

    fn white_mask(frame: &BgrFrame) -> Mask {
        Mask::in_range(&frame.to_hsv().unwrap(), &HsvRange::near_white(8)).unwrap()
    }

    fn matches(range: &HsvRange, hsv: [u8; 3]) -> bool {
        let size = ImageSize {
            width: 1,
            height: 1,
        };
        let image = Image::<u8, 3>::new(size, hsv.to_vec()).unwrap();
        Mask::in_range(&image, range).unwrap().get(0, 0) == Some(MASK_ON)
    }

    #[test]
    fn near_white_bounds() {
        let range = HsvRange::near_white(8);
        assert_eq!(range.lower, [0, 0, 247]);
        assert_eq!(range.upper, [255, 8, 255]);
    }

    #[test]
    fn near_white_accepts_white_and_rejects_grey_and_color() {
        let range = HsvRange::near_white(8);
        assert!(matches(&range, [0, 0, 255]));
        assert!(matches(&range, [0, 8, 247]));
        assert!(matches(&range, [179, 0, 255]));
        assert!(!matches(&range, [0, 0, 246]));
        assert!(!matches(&range, [0, 9, 255]));
        assert!(!matches(&range, [60, 255, 255]));
    }

    #[test]
    fn band_for_480_rows() {
        let band = SearchBand::for_height(480, 20, None);
        assert_eq!(band.top, 360);
        assert_eq!(band.bottom, 380);
        assert!(!band.contains_row(359));
        assert!(band.contains_row(360));
        assert!(band.contains_row(379));
        assert!(!band.contains_row(380));
        assert!(!band.contains_row(479));
    }

    #[test]
    fn band_top_uses_integer_division() {
        // 3 * 10 / 4 = 7
        let band = SearchBand::for_height(10, 20, None);
        assert_eq!(band.top, 7);
        assert_eq!(band.bottom, 10);
    }

    #[test]
    fn fixed_exclusion_end_below_band_leaves_lower_rows_searchable() {
        // With a fixed end of 100 and a 480-row frame the cleared slice
        // [380, 100) is empty, so the whole bottom quarter is searched.
        let band = SearchBand::for_height(480, 20, Some(100));
        assert!(band.contains_row(379));
        assert!(band.contains_row(380));
        assert!(band.contains_row(479));
        assert!(!band.contains_row(359));
    }

    #[test]
    fn fixed_exclusion_end_inside_frame_clears_only_up_to_it() {
        // band [150, 170), cleared [170, 180)
        let band = SearchBand::for_height(200, 20, Some(180));
        assert!(!band.contains_row(175));
        assert!(band.contains_row(185));
    }

    #[test]
    fn in_range_marks_white_pixels() {
        let mut frame = BgrFrame::filled(4, 4, [0, 0, 0]).unwrap();
        frame.set_pixel(1, 2, [255, 255, 255]);
        frame.set_pixel(2, 2, [0, 0, 255]);
        let mask = white_mask(&frame);
        assert_eq!(mask.get(1, 2), Some(MASK_ON));
        assert_eq!(mask.get(2, 2), Some(0));
        assert_eq!(mask.count_nonzero(), 1);
    }

    #[test]
    fn restrict_to_band_clears_outside_rows_only() {
        let frame = BgrFrame::filled(5, 8, [255, 255, 255]).unwrap();
        let mut mask = white_mask(&frame);
        assert_eq!(mask.count_nonzero(), 40);

        // 3 * 8 / 4 = 6, band rows [6, 7)
        mask.restrict_to_band(&SearchBand::for_height(8, 1, None));
        assert_eq!(mask.count_nonzero(), 5);
        for x in 0..5 {
            assert_eq!(mask.get(x, 6), Some(MASK_ON));
            assert_eq!(mask.get(x, 7), Some(0));
            assert_eq!(mask.get(x, 5), Some(0));
        }
    }

    #[test]
    fn to_raw_is_mono8() {
        let frame = BgrFrame::filled(3, 2, [255, 255, 255]).unwrap();
        let mask = white_mask(&frame);
        let raw = mask.to_raw();
        assert_eq!(raw.encoding, "mono8");
        assert_eq!(raw.step, 3);
        assert_eq!(raw.data.len(), 6);
    }
}
