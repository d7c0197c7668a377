//! QR code decoder backed by rqrr

use crate::camera::Frame;

use super::{DecodedPayload, Decoder};

/// Reads the first decodable QR code in a frame
#[derive(Debug, Clone)]
pub struct QrDecoder {
    /// Longest side frames are scaled down to before detection (0 = never)
    max_dimension: u32,
}

impl QrDecoder {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new(800)
    }
}

impl Decoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Option<DecodedPayload> {
        let luma = frame.to_luma_scaled(self.max_dimension)?;
        let (width, height) = luma.dimensions();

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma.get_pixel(x as u32, y as u32).0[0]
            });

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) if !content.is_empty() => {
                    return Some(DecodedPayload::new(content));
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("QR grid found in frame {} but not decodable: {:?}", frame.sequence, e);
                }
            }
        }

        None
    }

    fn name(&self) -> &str {
        "qr"
    }
}
