use kornia_image::Image;
use kornia_imgproc::draw::draw_line;

/// Centroid marker color (BGR red).
pub const MARKER_COLOR: [u8; 3] = [0, 0, 255];

/// Centroid marker radius in pixels.
pub const MARKER_RADIUS: u32 = 20;

/// Paint a filled disc of `radius` around `center` as one horizontal
/// [`draw_line`] span per row, clipped to the image.
pub fn draw_filled_circle<const C: usize>(
    img: &mut Image<u8, C>,
    center: (i64, i64),
    radius: u32,
    color: [u8; C],
) {
    let r = i64::from(radius);
    let (cx, cy) = center;
    let max_x = img.width() as i64 - 1;
    let max_y = img.height() as i64 - 1;

    for y in (cy - r).max(0)..=(cy + r).min(max_y) {
        let dy = y - cy;
        let half = ((r * r - dy * dy) as f64).sqrt().floor() as i64;
        let x0 = (cx - half).max(0);
        let x1 = (cx + half).min(max_x);
        if x0 <= x1 {
            draw_line(img, (x0, y), (x1, y), color, 1);
        }
    }
}
