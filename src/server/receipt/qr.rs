use crate::server::model::config::{QR_BORDER_RANGE, QR_MODULE_SIZE_RANGE};
use crate::server::model::receipt::ReceiptLinks;
use derive_more::{Display, Error};
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
use qrcode::{Color, QrCode};
use serde::Deserialize;
use std::io::Cursor;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Which receipt view a QR code points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum QrMode {
    #[default]
    Html,
    Txt,
}

impl QrMode {
    pub fn target<'a>(self, links: &'a ReceiptLinks) -> &'a str {
        match self {
            QrMode::Html => &links.html,
            QrMode::Txt => &links.txt,
        }
    }
}

#[derive(Debug, Display, Error)]
pub(crate) enum QrError {
    #[display("failed to encode QR payload: {reason}")]
    Encode { reason: String },
    #[display("failed to write QR image: {reason}")]
    Image { reason: String },
}

/// Renders URLs as PNG QR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QrLinkGenerator {
    /// pixels per module side
    module_size: u32,
    /// quiet zone, in modules
    border: u32,
}

impl QrLinkGenerator {
    /// Values outside the configurable ranges are clamped into them.
    pub fn new(module_size: u32, border: u32) -> Self {
        let (module_range, border_range) = (QR_MODULE_SIZE_RANGE, QR_BORDER_RANGE);
        Self {
            module_size: module_size.clamp(*module_range.start(), *module_range.end()),
            border: border.clamp(*border_range.start(), *border_range.end()),
        }
    }

    pub fn generate(&self, target_url: &str) -> Result<Vec<u8>, QrError> {
        let code = QrCode::new(target_url.as_bytes()).map_err(|e| QrError::Encode {
            reason: e.to_string(),
        })?;
        let modules = code.width() as u32;
        let side = (modules + 2 * self.border) * self.module_size;
        let image = GrayImage::from_fn(side, side, |x, y| {
            let (mx, my) = (x / self.module_size, y / self.module_size);
            let inside = (self.border..self.border + modules).contains(&mx)
                && (self.border..self.border + modules).contains(&my);
            if inside
                && code[((mx - self.border) as usize, (my - self.border) as usize)] == Color::Dark
            {
                DARK
            } else {
                LIGHT
            }
        });

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image)
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .map_err(|e| QrError::Image {
                reason: e.to_string(),
            })?;
        Ok(buffer.into_inner())
    }
}

impl Default for QrLinkGenerator {
    fn default() -> Self {
        Self::new(10, 4)
    }
}
