//! Image-to-tensor preprocessing.

use crate::dataset::ImagePayload;

/// Per-variant conversion from raw pixels to network input.
///
/// Values are scaled to `[0, 1]` and laid out row-major with interleaved
/// channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelTransform {
    /// Single luminance channel.
    Grayscale,
    /// Three channels; grayscale input is replicated.
    Rgb,
}

impl PixelTransform {
    pub fn channels(&self) -> usize {
        match self {
            PixelTransform::Grayscale => 1,
            PixelTransform::Rgb => 3,
        }
    }

    /// Input length for an image of the given size.
    pub fn input_len(&self, width: usize, height: usize) -> usize {
        width * height * self.channels()
    }

    pub fn apply(&self, image: &ImagePayload) -> Vec<f32> {
        match (self, image.channels) {
            (PixelTransform::Grayscale, 3) => image
                .pixels
                .chunks_exact(3)
                .map(|px| luminance(px[0], px[1], px[2]) / 255.0)
                .collect(),
            (PixelTransform::Rgb, 1) => image
                .pixels
                .iter()
                .flat_map(|&p| {
                    let v = p as f32 / 255.0;
                    [v, v, v]
                })
                .collect(),
            _ => image.pixels.iter().map(|&p| p as f32 / 255.0).collect(),
        }
    }
}

fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}
