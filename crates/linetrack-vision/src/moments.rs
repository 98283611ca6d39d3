//! Zeroth and first-order image moments of a binary [`Mask`].
//!
//! Coordinates are pixel indices (column `x`, row `y`), so a single pixel at
//! column 7 has its centroid at exactly `x = 7.0`. Every nonzero mask pixel
//! counts as weight 1.

use crate::mask::Mask;

/// Raw moments `m00`, `m10`, `m01`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    /// Number of nonzero pixels.
    pub m00: f64,
    /// Sum of column indices of nonzero pixels.
    pub m10: f64,
    /// Sum of row indices of nonzero pixels.
    pub m01: f64,
}

/// Mask centroid in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Moments {
    pub fn of(mask: &Mask) -> Self {
        let width = mask.width() as usize;
        let mut moments = Self::default();
        for (y, row) in mask.as_slice().chunks_exact(width).enumerate() {
            let mut count = 0u64;
            let mut x_sum = 0u64;
            for (x, _) in row.iter().enumerate().filter(|(_, v)| **v != 0) {
                count += 1;
                x_sum += x as u64;
            }
            moments.m00 += count as f64;
            moments.m10 += x_sum as f64;
            moments.m01 += (count * y as u64) as f64;
        }
        moments
    }

    /// `(m10 / m00, m01 / m00)`, or `None` for an empty mask.
    pub fn centroid(&self) -> Option<Centroid> {
        if self.m00 > 0.0 {
            Some(Centroid {
                x: self.m10 / self.m00,
                y: self.m01 / self.m00,
            })
        } else {
            None
        }
    }
}
