use image::codecs::png::PngEncoder;
use image::{ColorType, RgbaImage};
use std::path::Path;

use crate::canvas::{ExportError, MaskBuffer};

/// Extensions accepted by the open dialog and the CLI input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Decode / encode failures at the file boundary.
#[derive(Debug)]
pub enum IoError {
    Read(String),
    Decode(String),
    Encode(String),
    Write(String),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::Read(e) => write!(f, "could not read file: {}", e),
            IoError::Decode(e) => write!(f, "could not decode image: {}", e),
            IoError::Encode(e) => write!(f, "could not encode image: {}", e),
            IoError::Write(e) => write!(f, "could not write file: {}", e),
        }
    }
}

impl std::error::Error for IoError {}

/// Decode an image file into RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage, IoError> {
    let img = image::open(path).map_err(|e| IoError::Decode(e.to_string()))?;
    Ok(img.into_rgba8())
}

/// Encode an RGBA image as PNG bytes. PNG is the one output format here:
/// the mask must survive transport losslessly or the black/white boundary
/// would pick up compression artifacts.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, IoError> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new(&mut bytes);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ColorType::Rgba8,
        )
        .map_err(|e| IoError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Export the mask buffer as opaque two-tone PNG bytes, ready for upload.
pub fn export_mask_png(mask: &MaskBuffer) -> Result<Vec<u8>, ExportError> {
    let rgba = mask.export()?;
    encode_png(&rgba).map_err(|e| ExportError::Encode(e.to_string()))
}

/// Write PNG bytes to disk (CLI output path).
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    std::fs::write(path, bytes).map_err(|e| IoError::Write(e.to_string()))
}
