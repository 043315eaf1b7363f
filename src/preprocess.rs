//! Image decoding and tensor construction.
//!
//! The classifier was trained on 64x64 RGB inputs scaled to `[0, 1]`, so every
//! upload goes through the same fixed chain: decode, convert to RGB, resize to
//! exactly 64x64 (aspect ratio is not preserved), divide by 255 and add the
//! batch axis.

use image::{imageops::FilterType, DynamicImage, RgbImage};

use crate::error::PredictError;

pub const IMAGE_SIZE: usize = 64;
pub const CHANNELS: usize = 3;

const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

type Pixels = [[[f32; CHANNELS]; IMAGE_SIZE]; IMAGE_SIZE];

/// A single normalized image, laid out height x width x channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Box<Pixels>);

/// A one-sample batch, laid out batch x height x width x channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTensor(Box<[Pixels; 1]>);

impl ImageTensor {
    pub fn into_batch(self) -> BatchTensor {
        BatchTensor(Box::new([*self.0]))
    }
}

impl BatchTensor {
    pub const SHAPE: [u64; 4] = [1, IMAGE_SIZE as u64, IMAGE_SIZE as u64, CHANNELS as u64];

    pub fn shape(&self) -> [u64; 4] {
        Self::SHAPE
    }

    pub fn sample(&self) -> &Pixels {
        &self.0[0]
    }

    /// Row-major NHWC values, as the model runtime expects them.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(IMAGE_SIZE * IMAGE_SIZE * CHANNELS);
        for row in self.sample() {
            for pixel in row {
                flat.extend_from_slice(pixel);
            }
        }
        flat
    }
}

pub fn decode(image_data: &[u8]) -> Result<DynamicImage, PredictError> {
    Ok(image::load_from_memory(image_data)?)
}

/// Converts to RGB first so grayscale, palette and alpha images all end up
/// with three channels before resampling.
pub fn to_rgb_resized(image: &DynamicImage) -> RgbImage {
    let rgb = image.to_rgb8();
    image::imageops::resize(&rgb, IMAGE_SIZE as u32, IMAGE_SIZE as u32, RESIZE_FILTER)
}

pub fn normalize(image: &RgbImage) -> ImageTensor {
    let mut pixels = Box::new([[[0.0f32; CHANNELS]; IMAGE_SIZE]; IMAGE_SIZE]);
    for (x, y, pixel) in image.enumerate_pixels() {
        let target = &mut pixels[y as usize][x as usize];
        for (channel, value) in pixel.0.iter().enumerate() {
            target[channel] = f32::from(*value) / 255.0;
        }
    }
    ImageTensor(pixels)
}

pub fn preprocess(image_data: &[u8]) -> Result<BatchTensor, PredictError> {
    let image = decode(image_data)?;
    let resized = to_rgb_resized(&image);
    Ok(normalize(&resized).into_batch())
}
