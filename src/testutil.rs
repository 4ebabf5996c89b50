//! Fixtures shared by unit tests.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Encode a solid-colour PNG of the given size.
pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 90, 160]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}
