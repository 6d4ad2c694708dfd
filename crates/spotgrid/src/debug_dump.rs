//! Per-well debug images.
//!
//! Written next to each other as `<well>_<artifact>.png`:
//!
//! - `crop`: the cropped well interior
//! - `well_mask`: binarized full image used for well localization
//! - `spot_mask`: spot segmentation of the crop
//! - `background`: fitted background surface
//! - `composite`: RGB stack of (background, crop, background); spots show up
//!   magenta where they are darker than the fitted surface
//! - `overlay`: crop with a circle around every grid-assigned spot
//! - `placed_mask`: fixed-size discs the OD was measured over, when placement ran
//! - `spot_composite` / `spot_mask_composite`: one tile per measured spot, cut
//!   from the crop or from the measurement mask and laid out on the print grid
//!
//! Individual spot tiles go to `<well>_spots/r<row>_c<col>.png`.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;

use crate::grid::GridArray;
use crate::pipeline::WellArtifacts;
use crate::spots::Region;
use crate::GrayF32;

const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 64, 32]);
const OUTLINE_PAD_PX: f64 = 3.0;
const TILE_PAD_PX: u32 = 4;

/// Write every artifact of one well into `dir`, creating it if needed.
pub fn write_well_artifacts(
    dir: &Path,
    well: &str,
    artifacts: &WellArtifacts,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let path = |name: &str| -> PathBuf { dir.join(format!("{well}_{name}.png")) };

    let background = to_u8(&artifacts.background);
    artifacts.crop.save(path("crop"))?;
    artifacts.well_mask.save(path("well_mask"))?;
    artifacts.spot_mask.save(path("spot_mask"))?;
    background.save(path("background"))?;
    composite(&background, &artifacts.crop).save(path("composite"))?;
    assignment_overlay(&artifacts.crop, &artifacts.spots).save(path("overlay"))?;
    if let Some(placed) = &artifacts.placed_mask {
        placed.save(path("placed_mask"))?;
    }

    if let Some(side) = tile_side(&artifacts.measured) {
        let spot_dir = dir.join(format!("{well}_spots"));
        std::fs::create_dir_all(&spot_dir)?;
        for (pos, region) in artifacts.measured.occupied() {
            spot_tile(&artifacts.crop, region.centroid, side)
                .save(spot_dir.join(format!("r{}_c{}.png", pos.row, pos.col)))?;
        }
        let mask = artifacts.placed_mask.as_ref().unwrap_or(&artifacts.spot_mask);
        spot_mosaic(&artifacts.crop, &artifacts.measured, side).save(path("spot_composite"))?;
        spot_mosaic(mask, &artifacts.measured, side).save(path("spot_mask_composite"))?;
    }
    tracing::debug!("debug artifacts for {} written to {}", well, dir.display());
    Ok(())
}

/// Round and clamp a float image into 8 bits.
fn to_u8(img: &GrayF32) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([img.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

fn composite(background: &GrayImage, crop: &GrayImage) -> RgbImage {
    RgbImage::from_fn(crop.width(), crop.height(), |x, y| {
        let b = background.get_pixel(x, y)[0];
        Rgb([b, crop.get_pixel(x, y)[0], b])
    })
}

fn assignment_overlay(crop: &GrayImage, spots: &GridArray<Region>) -> RgbImage {
    let mut canvas = RgbImage::from_fn(crop.width(), crop.height(), |x, y| {
        let v = crop.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    for (_, region) in spots.occupied() {
        let radius = (region.area as f64 / std::f64::consts::PI).sqrt() + OUTLINE_PAD_PX;
        let center = (
            region.centroid[1].round() as i32,
            region.centroid[0].round() as i32,
        );
        draw_hollow_circle_mut(&mut canvas, center, radius.round() as i32, OVERLAY_COLOR);
    }
    canvas
}

/// Tile side fitting the largest measured spot plus padding.
fn tile_side(spots: &GridArray<Region>) -> Option<u32> {
    spots
        .occupied()
        .map(|(_, r)| (r.bbox.max_row - r.bbox.min_row).max(r.bbox.max_col - r.bbox.min_col))
        .max()
        .map(|extent| extent + 2 * TILE_PAD_PX)
}

/// `side x side` window of `src` centered on `center` (`[row, col]`);
/// pixels outside `src` are black.
fn spot_tile(src: &GrayImage, center: [f64; 2], side: u32) -> GrayImage {
    let half = (side / 2) as i64;
    let row0 = center[0].round() as i64 - half;
    let col0 = center[1].round() as i64 - half;
    GrayImage::from_fn(side, side, |x, y| {
        let (row, col) = (row0 + y as i64, col0 + x as i64);
        let inside = row >= 0
            && col >= 0
            && row < src.height() as i64
            && col < src.width() as i64;
        if inside {
            *src.get_pixel(col as u32, row as u32)
        } else {
            Luma([0])
        }
    })
}

/// Spot tiles arranged on the print grid; absent cells stay black.
fn spot_mosaic(src: &GrayImage, spots: &GridArray<Region>, side: u32) -> GrayImage {
    let mut out = GrayImage::new(side * spots.cols() as u32, side * spots.rows() as u32);
    for (pos, region) in spots.occupied() {
        let tile = spot_tile(src, region.centroid, side);
        let x = (pos.col as u32 * side) as i64;
        let y = (pos.row as u32 * side) as i64;
        image::imageops::replace(&mut out, &tile, x, y);
    }
    out
}
