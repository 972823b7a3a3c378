//! Synthetic microscopy-like images encoded as PNG bytes

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn encode_png(img: RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG encoding of an in-memory image");
    bytes
}

/// Single-intensity square image
pub fn uniform_gray_png(size: u32, level: u8) -> Vec<u8> {
    encode_png(RgbImage::from_pixel(size, size, Rgb([level, level, level])))
}

/// 128×128 black canvas with white squares on alternating 16 px cells
///
/// Each square is inset 3 px from its cell so no two squares touch, even
/// diagonally: 32 separate blobs.
pub fn inset_checkerboard_png() -> Vec<u8> {
    const SIZE: u32 = 128;
    const CELL: u32 = 16;
    const INSET: u32 = 3;

    let img = RgbImage::from_fn(SIZE, SIZE, |x, y| {
        let (cx, cy) = (x / CELL, y / CELL);
        let (ox, oy) = (x % CELL, y % CELL);
        let lit = (cx + cy) % 2 == 0
            && (INSET..CELL - INSET).contains(&ox)
            && (INSET..CELL - INSET).contains(&oy);
        if lit {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });
    encode_png(img)
}

/// Bright disc centred on a dark background
pub fn disc_png(size: u32, radius: f64) -> Vec<u8> {
    let c = (size as f64 - 1.0) / 2.0;
    let img = RgbImage::from_fn(size, size, |x, y| {
        let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
        if d <= radius {
            Rgb([210, 200, 190])
        } else {
            Rgb([30, 30, 30])
        }
    });
    encode_png(img)
}

/// Dark disc on a bright field, as in brightfield microscopy
///
/// The Otsu foreground is the background field, which touches every edge.
pub fn brightfield_disc_png(size: u32, radius: f64) -> Vec<u8> {
    let c = (size as f64 - 1.0) / 2.0;
    let img = RgbImage::from_fn(size, size, |x, y| {
        let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
        if d <= radius {
            Rgb([40, 40, 40])
        } else {
            Rgb([200, 200, 200])
        }
    });
    encode_png(img)
}
