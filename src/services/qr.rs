//! QR image rendering
//!
//! Encodes a token as a high error-correction QR symbol and, when the logo
//! asset is present, pastes it at the centre. Level H leaves enough
//! redundancy for the covered modules.

use anyhow::{Context, Result};
use image::{imageops, DynamicImage, ImageFormat, Luma, RgbaImage};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use std::path::PathBuf;

use crate::config::QrConfig;

pub struct QrRenderer {
    logo_path: PathBuf,
    logo_size: u32,
    module_size: u32,
}

impl QrRenderer {
    pub fn new(config: &QrConfig) -> Self {
        Self {
            logo_path: config.logo_path.clone(),
            logo_size: config.logo_size,
            module_size: config.module_size,
        }
    }

    /// Render `payload` as PNG bytes
    pub fn render_png(&self, payload: &str) -> Result<Vec<u8>> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)
            .context("Failed to encode QR payload")?;
        let symbol = code
            .render::<Luma<u8>>()
            .module_dimensions(self.module_size, self.module_size)
            .quiet_zone(true)
            .build();

        let mut canvas = DynamicImage::ImageLuma8(symbol).to_rgba8();
        if let Some(logo) = self.load_logo() {
            let x = canvas.width().saturating_sub(logo.width()) / 2;
            let y = canvas.height().saturating_sub(logo.height()) / 2;
            imageops::overlay(&mut canvas, &logo, i64::from(x), i64::from(y));
        }

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode QR image as PNG")?;
        Ok(png)
    }

    /// Logo resized to a square, or `None` when it cannot be used
    fn load_logo(&self) -> Option<RgbaImage> {
        if !self.logo_path.exists() {
            tracing::warn!("Logo '{}' not found, rendering plain QR code", self.logo_path.display());
            return None;
        }

        match image::open(&self.logo_path) {
            Ok(logo) => Some(imageops::resize(
                &logo.to_rgba8(),
                self.logo_size,
                self.logo_size,
                imageops::FilterType::Lanczos3,
            )),
            Err(e) => {
                tracing::warn!("Logo '{}' unreadable, rendering plain QR code: {}", self.logo_path.display(), e);
                None
            }
        }
    }
}
