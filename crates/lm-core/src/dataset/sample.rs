//! Sample and image payload types.

use crate::error::{MachineError, Result};
use crate::identity::IdentityCodec;

/// Raw image bytes, row-major with interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub width: usize,
    pub height: usize,
    /// 1 for grayscale, 3 for RGB.
    pub channels: usize,
    pub pixels: Vec<u8>,
}

impl ImagePayload {
    /// Create a payload, checking that the buffer matches the dimensions.
    pub fn new(width: usize, height: usize, channels: usize, pixels: Vec<u8>) -> Result<Self> {
        if channels != 1 && channels != 3 {
            return Err(MachineError::Validation {
                field: "channels".to_string(),
                message: format!("expected 1 or 3 channels, got {}", channels),
            });
        }
        let expected = width * height * channels;
        if pixels.len() != expected {
            return Err(MachineError::Validation {
                field: "pixels".to_string(),
                message: format!(
                    "{}x{}x{} image needs {} bytes, got {}",
                    width,
                    height,
                    channels,
                    expected,
                    pixels.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    pub fn grayscale(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        Self::new(width, height, 1, pixels)
    }

    /// Number of scalar values (pixels times channels).
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// One labeled image addressable by its index in the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub index: usize,
    pub label: usize,
    pub image: ImagePayload,
}

impl Sample {
    /// The externally visible handle for this sample.
    pub fn token(&self, codec: &IdentityCodec) -> String {
        codec.encode(self.index, self.label)
    }

    /// Copy of this sample carrying a corrected label.
    ///
    /// The backing store keeps its own label; only the returned copy changes.
    pub fn relabeled(&self, label: usize) -> Sample {
        Sample {
            label,
            ..self.clone()
        }
    }
}
