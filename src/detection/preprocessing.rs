use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use tracing::debug;

use crate::config::ChannelOrder;
use crate::detection::geometry::{LetterboxTransform, compute_letterbox};
use crate::error::{DetectError, Result};

/// Neutral gray the detector was trained with for padding.
pub const PAD_VALUE: u8 = 114;

/// Resize `img` into a `target_size` square canvas, preserving aspect ratio.
pub fn letterbox_image(img: &RgbImage, target_size: u32) -> Result<(RgbImage, LetterboxTransform)> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::Decode { width, height });
    }

    let transform = compute_letterbox(width, height, target_size);

    let resized = imageops::resize(
        img,
        transform.new_width,
        transform.new_height,
        FilterType::Triangle,
    );

    let mut canvas = RgbImage::from_pixel(target_size, target_size, Rgb([PAD_VALUE; 3]));
    imageops::overlay(
        &mut canvas,
        &resized,
        transform.pad_x.into(),
        transform.pad_y.into(),
    );

    Ok((canvas, transform))
}

/// Convert a square canvas to a `[1, 3, S, S]` tensor with values in `[0, 1]`.
pub fn canvas_to_tensor(canvas: &RgbImage, order: ChannelOrder) -> Array4<f32> {
    let (width, height) = canvas.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    let planes = match order {
        ChannelOrder::Rgb => [0, 1, 2],
        ChannelOrder::Bgr => [2, 1, 0],
    };

    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (plane, &channel) in planes.iter().enumerate() {
            tensor[[0, plane, y, x]] = pixel[channel] as f32 / 255.0;
        }
    }

    tensor
}

/// Letterbox `img` and produce the model input tensor plus the transform
/// needed to map detections back.
pub fn preprocess(
    img: &RgbImage,
    target_size: u32,
    order: ChannelOrder,
) -> Result<(Array4<f32>, LetterboxTransform)> {
    let (canvas, transform) = letterbox_image(img, target_size)?;
    let tensor = canvas_to_tensor(&canvas, order);

    debug!(
        "Preprocessed {}x{} -> {}x{} (scale={:.4}, pad=({}, {}))",
        transform.original_width,
        transform.original_height,
        transform.new_width,
        transform.new_height,
        transform.scale,
        transform.pad_x,
        transform.pad_y
    );

    Ok((tensor, transform))
}
