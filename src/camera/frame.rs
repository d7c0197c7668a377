//! Sampled camera frame
//!
//! Frames are always RGBA8 (4 bytes per pixel). A frame lives for one sampling
//! cycle of the frame loop and is dropped once the decoder has seen it.

use image::{imageops, GrayImage, RgbaImage};

/// Bytes per pixel of the fixed RGBA8 format
pub const BYTES_PER_PIXEL: usize = 4;

/// One sampled image buffer from the capture device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGBA pixel data, row-major, no padding
    pub pixels: Vec<u8>,
    /// Monotonic frame number assigned by the device
    pub sequence: u64,
}

impl Frame {
    /// Create a frame from raw RGBA data
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            pixels,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], sequence: u64) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(Self::expected_size(width, height))
            .collect();
        Self::new(width, height, pixels, sequence)
    }

    /// Expected buffer size for the given dimensions
    pub fn expected_size(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * BYTES_PER_PIXEL
    }

    /// A frame with no pixels is treated as "no frame yet"
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// Check that the buffer matches the dimensions
    pub fn is_valid(&self) -> bool {
        !self.is_empty() && self.pixels.len() == Self::expected_size(self.width, self.height)
    }

    /// Convert to an 8-bit luma image for decoders.
    ///
    /// Returns `None` if the buffer does not match the dimensions.
    pub fn to_luma(&self) -> Option<GrayImage> {
        if !self.is_valid() {
            return None;
        }
        let rgba = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())?;
        Some(imageops::grayscale(&rgba))
    }

    /// Luma image whose longest side is at most `max_dimension`.
    ///
    /// A `max_dimension` of 0 disables scaling.
    pub fn to_luma_scaled(&self, max_dimension: u32) -> Option<GrayImage> {
        let luma = self.to_luma()?;
        let longest = self.width.max(self.height);
        if max_dimension == 0 || longest <= max_dimension {
            return Some(luma);
        }

        let scale = max_dimension as f32 / longest as f32;
        let width = ((self.width as f32 * scale).round() as u32).max(1);
        let height = ((self.height as f32 * scale).round() as u32).max(1);
        Some(imageops::resize(
            &luma,
            width,
            height,
            imageops::FilterType::Triangle,
        ))
    }
}
