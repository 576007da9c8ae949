use crate::render::RawFrame;
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("frame buffer holds {actual} bytes, {width}x{height} RGBA needs {expected}")]
    BufferSize { width: u32, height: u32, expected: usize, actual: usize },
    #[error("png encoding failed: {0}")]
    Png(#[from] image::ImageError),
    #[error("encode worker failed: {0}")]
    Worker(String),
}

/// Compresses a captured frame to PNG. CPU heavy, call it off the scheduler task.
pub fn encode_png(frame: &RawFrame) -> Result<Vec<u8>, EncodeError> {
    let expected = frame.size().rgba_len();
    if frame.rgba.len() != expected {
        return Err(EncodeError::BufferSize {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.rgba.len(),
        });
    }
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &frame.rgba,
        frame.width,
        frame.height,
        ExtendedColorType::Rgba8,
    )?;
    Ok(png)
}

/// Writes next to `path` then renames, so readers never see half a PNG.
pub fn write_snapshot(path: &Path, png: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("png.tmp");
    std::fs::write(&tmp, png)?;
    std::fs::rename(&tmp, path)
}
