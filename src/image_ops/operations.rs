use crate::errors::NormalizeError;
use crate::image_ops::image_types::Extensions;
use crate::utils::types::ImageContainer;
use fast_image_resize::{FilterType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GenericImageView};
use std::num::NonZeroU32;

pub const DEFAULT_COMPRESSION_QUALITY: u8 = 85;

/// Result of running the size policy over one stored image
pub enum Processed {
    /// Source width is already within bounds, nothing should be rewritten
    WithinBounds {
        width: u32,
        height: u32,
    },
    Resized(ImageContainer),
}

/// Decode stored bytes, the format is guessed from content, not from the file name
pub fn decode(data: &[u8]) -> Result<DynamicImage, NormalizeError> {
    image::load_from_memory(data).map_err(|err| NormalizeError::decode(err.to_string()))
}

/// Target dimensions for uniform scaling down to `max_width`.
///
/// `None` when the image already fits.
pub fn target_size(width: u32, height: u32, max_width: NonZeroU32) -> Option<(u32, u32)> {
    let max_width = max_width.get();
    if width <= max_width {
        return None;
    }
    let new_height = (height as f64 * max_width as f64 / width as f64).round() as u32;
    Some((max_width, new_height.max(1)))
}

/// Lanczos3 resample into an RGBA buffer of exactly `width` x `height`
pub fn resize(
    img: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<DynamicImage, NormalizeError> {
    let src = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut dst = DynamicImage::new(width, height, src.color());

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    let mut resizer = Resizer::new();
    resizer
        .resize(&src, &mut dst, &options)
        .map_err(|err| NormalizeError::encode(format!("resize failed: {}", err)))?;

    Ok(dst)
}

pub fn cast_to_extension(
    img: &DynamicImage,
    extension: Extensions,
    quality: u8,
) -> Result<Vec<u8>, NormalizeError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let data = rgba.into_vec();

    match extension {
        Extensions::Webp => {
            let encoder = webp::Encoder::new(&data, webp::PixelLayout::Rgba, width, height);
            let encoded = encoder
                .encode_simple(false, quality as f32)
                .map_err(|err| NormalizeError::encode(format!("webp: {:?}", err)))?;
            Ok(encoded.to_vec())
        }
    }
}

/// Decode, check against `max_width`, and re-encode when the image is too wide
pub fn process(
    data: &[u8],
    max_width: NonZeroU32,
    extension: Extensions,
    quality: u8,
) -> Result<Processed, NormalizeError> {
    let img = decode(data)?;
    let (width, height) = img.dimensions();

    let Some((new_width, new_height)) = target_size(width, height, max_width) else {
        return Ok(Processed::WithinBounds { width, height });
    };

    let resized = resize(&img, new_width, new_height)?;
    let encoded = cast_to_extension(&resized, extension, quality)?;

    Ok(Processed::Resized(ImageContainer::new(
        encoded, new_width, new_height, extension,
    )))
}
