//! Frame type and pixel-format conversion to RGB.

use image::{ImageFormat, Rgb, RgbImage};

/// A captured camera frame, already converted to RGB.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Driver buffer sequence number; gaps mean the driver dropped frames.
    pub sequence: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), FrameError> {
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> Rgb<u8> {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let clamp = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    Rgb([
        clamp(y + 1.402 * v),
        clamp(y - 0.344_136 * u - 0.714_136 * v),
        clamp(y + 1.772 * u),
    ])
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_len(yuyv, (width * height * 2) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let pair = ((y * width + x) / 2 * 4) as usize;
        let luma = yuyv[pair + if x % 2 == 0 { 0 } else { 2 }];
        ycbcr_to_rgb(luma, yuyv[pair + 1], yuyv[pair + 3])
    }))
}

/// Replicate 8-bit grayscale into three channels.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_len(grey, (width * height) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let g = grey[(y * width + x) as usize];
        Rgb([g, g, g])
    }))
}

/// 16-bit little-endian grayscale, keeping the high byte.
pub fn y16_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_len(buf, (width * height * 2) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let g = buf[((y * width + x) * 2 + 1) as usize];
        Rgb([g, g, g])
    }))
}

/// Decode one Motion-JPEG frame.
pub fn mjpeg_to_rgb(buf: &[u8]) -> Result<RgbImage, FrameError> {
    Ok(image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_rgb8())
}
