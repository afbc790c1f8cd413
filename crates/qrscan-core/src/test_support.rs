//! Fixtures shared by unit tests.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};

const MODULE_PX: u32 = 6;
const QUIET_ZONE: u32 = 4;

/// Render `text` as a black-on-white QR code with a quiet zone.
pub fn qr_image(text: &str) -> GrayImage {
    let code = QrCode::new(text.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let edge = (modules + 2 * QUIET_ZONE) * MODULE_PX;

    GrayImage::from_fn(edge, edge, |x, y| {
        let mx = (x / MODULE_PX).checked_sub(QUIET_ZONE);
        let my = (y / MODULE_PX).checked_sub(QUIET_ZONE);
        match (mx, my) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                match colors[(my * modules + mx) as usize] {
                    Color::Dark => Luma([0]),
                    Color::Light => Luma([255]),
                }
            }
            _ => Luma([255]),
        }
    })
}

/// Paste `code` onto a white canvas at (`x`, `y`).
pub fn on_canvas(code: &GrayImage, width: u32, height: u32, x: u32, y: u32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(width, height, Luma([255]));
    image::imageops::replace(&mut canvas, code, i64::from(x), i64::from(y));
    canvas
}

pub fn png_bytes(img: GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
