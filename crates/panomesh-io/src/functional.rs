use std::path::Path;

use image::DynamicImage;
use panomesh_image::{ColorImage, DepthMap, Image, ImageSize};

use crate::error::IoError;

fn open_image(file_path: &Path) -> Result<DynamicImage, IoError> {
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }
    Ok(image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()?)
}

fn first_channel<T: Copy>(data: &[T], channels: usize, convert: impl Fn(T) -> f32) -> Vec<f32> {
    data.chunks_exact(channels).map(|p| convert(p[0])).collect()
}

/// Reads a color panorama from the given file path.
///
/// Any format the `image` crate decodes is accepted; the result is converted to 8 bit RGB.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A RGB image with three channels (rgb8).
pub fn read_color_image(file_path: impl AsRef<Path>) -> Result<ColorImage, IoError> {
    let img = open_image(file_path.as_ref())?.to_rgb8();
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };
    Ok(ColorImage::new(size, img.into_raw())?)
}

/// Reads a depth map, larger values meaning farther away.
///
/// Raw values are kept: 8 bit and 16 bit grayscale images map to `0..=255` and `0..=65535`,
/// float images keep their values. Color images use their first channel.
///
/// # Arguments
///
/// * `file_path` - The path to a PNG or TIFF depth map.
///
/// # Returns
///
/// A single channel `f32` depth map.
pub fn read_depth_map(file_path: impl AsRef<Path>) -> Result<DepthMap, IoError> {
    let file_path = file_path.as_ref();
    let img = open_image(file_path)?;
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    let depth = match img {
        DynamicImage::ImageLuma8(buf) => {
            Image::<u8, 1>::new(size, buf.into_raw())?.cast_and_scale(1.0f32)?
        }
        DynamicImage::ImageLuma16(buf) => {
            Image::<u16, 1>::new(size, buf.into_raw())?.cast_and_scale(1.0f32)?
        }
        DynamicImage::ImageLumaA8(buf) => {
            DepthMap::new(size, first_channel(&buf.into_raw(), 2, f32::from))?
        }
        DynamicImage::ImageLumaA16(buf) => {
            DepthMap::new(size, first_channel(&buf.into_raw(), 2, f32::from))?
        }
        DynamicImage::ImageRgb8(buf) => {
            DepthMap::new(size, first_channel(&buf.into_raw(), 3, f32::from))?
        }
        DynamicImage::ImageRgb16(buf) => {
            DepthMap::new(size, first_channel(&buf.into_raw(), 3, f32::from))?
        }
        DynamicImage::ImageRgb32F(buf) => {
            DepthMap::new(size, first_channel(&buf.into_raw(), 3, |v| v))?
        }
        DynamicImage::ImageRgba32F(buf) => {
            DepthMap::new(size, first_channel(&buf.into_raw(), 4, |v| v))?
        }
        other => {
            return Err(IoError::UnsupportedDepthFormat(format!(
                "{:?} in {}",
                other.color(),
                file_path.display()
            )))
        }
    };

    log::debug!("read depth map {} of size {size}", file_path.display());
    Ok(depth)
}

/// Min-max normalize a depth map to `0..=255`; a constant map becomes all zeros.
pub fn normalize_depth_u8(depth: &DepthMap) -> Vec<u8> {
    let (min, max) = depth.min_max().unwrap_or((0.0, 0.0));
    let range = max - min;
    depth
        .as_slice()
        .iter()
        .map(|&d| {
            if !d.is_finite() || range <= 0.0 {
                0
            } else {
                (((d - min) / range) * 255.0).clamp(0.0, 255.0) as u8
            }
        })
        .collect()
}

/// Writes a normalized 8 bit grayscale preview of a depth map as PNG.
///
/// # Arguments
///
/// * `file_path` - The output path, ending in `.png`.
/// * `depth` - The depth map to preview.
pub fn write_depth_preview(file_path: impl AsRef<Path>, depth: &DepthMap) -> Result<(), IoError> {
    let data = normalize_depth_u8(depth);
    image::save_buffer_with_format(
        file_path,
        &data,
        depth.width() as u32,
        depth.height() as u32,
        image::ExtendedColorType::L8,
        image::ImageFormat::Png,
    )?;
    Ok(())
}

/// Writes the raw depth values truncated to 16 bit grayscale PNG.
///
/// Values are clamped to `0..=65535` so the file can be read back with [`read_depth_map`].
pub fn write_depth_png16(file_path: impl AsRef<Path>, depth: &DepthMap) -> Result<(), IoError> {
    let data = depth
        .as_slice()
        .iter()
        .map(|&d| if d.is_finite() { d.clamp(0.0, 65535.0) as u16 } else { 0 })
        .collect::<Vec<_>>();
    let buf = image::ImageBuffer::<image::Luma<u16>, _>::from_raw(
        depth.width() as u32,
        depth.height() as u32,
        data,
    )
    .ok_or_else(|| IoError::UnsupportedDepthFormat("buffer size mismatch".to_string()))?;
    buf.save_with_format(file_path, image::ImageFormat::Png)?;
    Ok(())
}
