//! QR rendering for goal-access links.

use std::io::Cursor;

use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};

const MODULE_PIXELS: u32 = 8;
// Scanners want at least 4 modules of quiet zone around the code.
const QUIET_ZONE_MODULES: u32 = 4;

/// Encodes `data` as a PNG QR image with high error correction, matching
/// the scannability of the codes the frontend already handles.
pub fn render_png(data: &str) -> anyhow::Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let side = (modules + 2 * QUIET_ZONE_MODULES) * MODULE_PIXELS;
    let img = GrayImage::from_fn(side, side, |x, y| {
        let mx = x / MODULE_PIXELS;
        let my = y / MODULE_PIXELS;
        let in_code = mx >= QUIET_ZONE_MODULES
            && my >= QUIET_ZONE_MODULES
            && mx < QUIET_ZONE_MODULES + modules
            && my < QUIET_ZONE_MODULES + modules;
        if !in_code {
            return Luma([255u8]);
        }
        let idx = ((my - QUIET_ZONE_MODULES) * modules + (mx - QUIET_ZONE_MODULES)) as usize;
        match colors[idx] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_png() {
        let png = render_png("https://example.com/access?token=sata_v1_00ff").unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(png.len() > 100);
    }

    #[test]
    fn payload_size_scales_the_image() {
        let short = render_png("x").unwrap();
        let long = render_png(&"x".repeat(400)).unwrap();
        // More data forces a higher QR version, i.e. a bigger bitmap.
        assert!(long.len() > short.len());
    }
}
