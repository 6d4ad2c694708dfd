//! Synthetic images shared by unit tests.

use image::{GrayImage, Luma};

/// Render a filled disc.
///
/// Pixels at distance `d <= radius` from `center` (`[x, y]`) get `disc_pix`,
/// everything else `bg_pix`.
pub(crate) fn draw_disc_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    radius: f32,
    disc_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let dx = x as f32 - center[0];
        let dy = y as f32 - center[1];
        let inside = dx * dx + dy * dy <= radius * radius;
        Luma([if inside { disc_pix } else { bg_pix }])
    })
}

/// Render dark spots of equal radius on a flat background.
///
/// Each spot is `([x, y], intensity)`.
pub(crate) fn draw_spots_image(
    w: u32,
    h: u32,
    spots: &[([f32; 2], u8)],
    radius: f32,
    bg_pix: u8,
) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg_pix]));
    paint_spots(&mut img, spots, radius);
    img
}

/// A whole well: a dark annular wall around `center` (`[x, y]`), flat
/// background elsewhere, and dark spots inside.
pub(crate) struct SyntheticWell {
    pub size: (u32, u32),
    pub center: [f32; 2],
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub wall_pix: u8,
    pub bg_pix: u8,
    pub spots: Vec<([f32; 2], u8)>,
    pub spot_radius: f32,
}

impl SyntheticWell {
    pub(crate) fn render(&self) -> GrayImage {
        let (w, h) = self.size;
        let mut img = GrayImage::from_fn(w, h, |x, y| {
            let dx = x as f32 - self.center[0];
            let dy = y as f32 - self.center[1];
            let d = (dx * dx + dy * dy).sqrt();
            let wall = d >= self.inner_radius && d <= self.outer_radius;
            Luma([if wall { self.wall_pix } else { self.bg_pix }])
        });
        paint_spots(&mut img, &self.spots, self.spot_radius);
        img
    }
}

fn paint_spots(img: &mut GrayImage, spots: &[([f32; 2], u8)], radius: f32) {
    let (w, h) = img.dimensions();
    for &(c, v) in spots {
        let x0 = (c[0] - radius).floor().max(0.0) as u32;
        let y0 = (c[1] - radius).floor().max(0.0) as u32;
        let x1 = ((c[0] + radius).ceil() as u32).min(w.saturating_sub(1));
        let y1 = ((c[1] + radius).ceil() as u32).min(h.saturating_sub(1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 - c[0];
                let dy = y as f32 - c[1];
                if dx * dx + dy * dy <= radius * radius {
                    img.put_pixel(x, y, Luma([v]));
                }
            }
        }
    }
}
