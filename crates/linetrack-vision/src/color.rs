//! 8-bit HSV conversion in the OpenCV convention.
//!
//! Channels are H in `[0, 180)` (degrees halved), S in `[0, 255]` and
//! V in `[0, 255]`, all `u8`. Kornia's `hsv_from_rgb` uses `f32` and hue in
//! degrees instead.

use kornia_image::Image;
use linetrack_types::LineError;

/// Convert a packed BGR image into 8-bit HSV.
///
/// # Errors
///
/// Returns [`LineError::InvalidFrame`] when `src` and `dst` differ in size.
///
/// # Example
///
/// ```
/// use kornia_image::Image;
/// use linetrack_vision::{BgrFrame, hsv_from_bgr};
///
/// let white = BgrFrame::filled(2, 2, [255, 255, 255]).unwrap();
/// let mut hsv = Image::<u8, 3>::from_size_val(white.size(), 0).unwrap();
/// hsv_from_bgr(white.as_image(), &mut hsv).unwrap();
/// assert_eq!(&hsv.as_slice()[..3], &[0, 0, 255]);
/// ```
pub fn hsv_from_bgr(src: &Image<u8, 3>, dst: &mut Image<u8, 3>) -> Result<(), LineError> {
    if src.size() != dst.size() {
        return Err(LineError::InvalidFrame(format!(
            "HSV destination is {}x{}, source is {}x{}",
            dst.width(),
            dst.height(),
            src.width(),
            src.height()
        )));
    }

    src.as_slice()
        .chunks_exact(3)
        .zip(dst.as_slice_mut().chunks_exact_mut(3))
        .for_each(|(bgr, hsv)| hsv.copy_from_slice(&bgr_to_hsv(bgr[0], bgr[1], bgr[2])));

    Ok(())
}

fn bgr_to_hsv(b: u8, g: u8, r: u8) -> [u8; 3] {
    let (b, g, r) = (i32::from(b), i32::from(g), i32::from(r));
    let v = b.max(g).max(r);
    let min = b.min(g).min(r);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        (255.0 * diff as f32 / v as f32).round() as i32
    };

    let h = if diff == 0 {
        0
    } else {
        // Sextant numerator; the hue in half-degrees is 30 * num / diff.
        let num = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let h = (30.0 * num as f32 / diff as f32).round() as i32;
        if h < 0 { h + 180 } else { h }
    };

    [h as u8, s as u8, v as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use kornia_image::ImageSize;

    fn hsv_of(bgr: [u8; 3]) -> [u8; 3] {
        bgr_to_hsv(bgr[0], bgr[1], bgr[2])
    }

    #[test]
    fn greys_have_no_hue_or_saturation() {
        assert_eq!(hsv_of([0, 0, 0]), [0, 0, 0]);
        assert_eq!(hsv_of([128, 128, 128]), [0, 0, 128]);
        assert_eq!(hsv_of([255, 255, 255]), [0, 0, 255]);
    }

    #[test]
    fn primaries() {
        assert_eq!(hsv_of([0, 0, 255]), [0, 255, 255]); // red
        assert_eq!(hsv_of([0, 255, 0]), [60, 255, 255]); // green
        assert_eq!(hsv_of([255, 0, 0]), [120, 255, 255]); // blue
    }

    #[test]
    fn secondaries() {
        assert_eq!(hsv_of([0, 255, 255]), [30, 255, 255]); // yellow
        assert_eq!(hsv_of([255, 255, 0]), [90, 255, 255]); // cyan
        assert_eq!(hsv_of([255, 0, 255]), [150, 255, 255]); // magenta
    }

    #[test]
    fn negative_hue_wraps() {
        // Red with a touch of blue sits just below 360 degrees.
        let [h, _, _] = hsv_of([60, 0, 255]);
        assert!(h > 170 && h < 180, "hue {h} should wrap near 180");
    }

    #[test]
    fn off_white_is_slightly_saturated() {
        // V = 250, min = 245 -> S = 255 * 5 / 250 = 5.1 -> 5
        let [_, s, v] = hsv_of([245, 250, 250]);
        assert_eq!((s, v), (5, 250));
    }

    #[test]
    fn image_is_converted_pixel_by_pixel() {
        let size = ImageSize {
            width: 2,
            height: 1,
        };
        let src = Image::<u8, 3>::new(size, vec![255, 0, 0, 0, 255, 255]).unwrap();
        let mut dst = Image::<u8, 3>::from_size_val(size, 0).unwrap();
        hsv_from_bgr(&src, &mut dst).unwrap();
        assert_eq!(dst.as_slice(), &[120, 255, 255, 30, 255, 255]);
    }

    #[test]
    fn mismatched_destination_is_rejected() {
        let src = Image::<u8, 3>::from_size_val(
            ImageSize {
                width: 3,
                height: 2,
            },
            0,
        )
        .unwrap();
        let mut dst = Image::<u8, 3>::from_size_val(
            ImageSize {
                width: 2,
                height: 3,
            },
            0,
        )
        .unwrap();
        assert!(matches!(
            hsv_from_bgr(&src, &mut dst),
            Err(LineError::InvalidFrame(_))
        ));
    }
}
