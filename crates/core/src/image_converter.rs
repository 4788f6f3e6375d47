//! Image re-encoding with optional downscaling.
//!
//! Every conversion runs the same pipeline: decode, resize, normalize the
//! color type for the target encoder, encode into memory. [`ImageConverter::convert`]
//! then writes the buffer to disk while [`ImageConverter::estimate`] only
//! measures it.

use crate::config::{ConversionRequest, ConvertedFile, ImageConfig, Scale};
use crate::error::{ConversionError, Result};
use crate::formats::Format;
use crate::output;
use image::{ColorType, DynamicImage, GenericImageView, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Converter between catalog image formats.
#[derive(Debug, Clone, Default)]
pub struct ImageConverter {
    config: ImageConfig,
}

impl ImageConverter {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    /// Convert `request.source_path` and write the result to `request.output_path`.
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConvertedFile> {
        let start = Instant::now();

        let data = self.render(request)?;
        let bytes_written = output::write_atomic(&data, &request.output_path)?;

        info!(
            "Converted {:?} to {} ({} bytes) in {:?}",
            request.source_path,
            request.target_format,
            bytes_written,
            start.elapsed()
        );

        Ok(ConvertedFile {
            input_path: request.source_path.clone(),
            output_path: request.output_path.clone(),
            bytes_written,
            duration: start.elapsed(),
        })
    }

    /// Size of the output `convert` would write. Touches no files besides
    /// reading the source; `request.output_path` is ignored.
    pub fn estimate(&self, request: &ConversionRequest) -> Result<u64> {
        let data = self.render(request)?;
        debug!(
            "Estimated {} output for {:?} at scale {}: {} bytes",
            request.target_format,
            request.source_path,
            request.scale,
            data.len()
        );
        Ok(data.len() as u64)
    }

    /// Decode, resize, normalize and encode into an in-memory buffer.
    pub fn render(&self, request: &ConversionRequest) -> Result<Vec<u8>> {
        let target = request.target_format;
        if !request.source_format.is_image() || !target.is_image() {
            return Err(ConversionError::unsupported(request.source_format, target));
        }

        let img = decode(&request.source_path)?;
        let img = self.resize(img, request.scale);
        let img = self.normalize(img, target);
        encode(&img, target, &request.source_path)
    }

    fn resize(&self, img: DynamicImage, scale: Scale) -> DynamicImage {
        if scale.is_original() {
            return img;
        }

        let (width, height) = img.dimensions();
        let (new_width, new_height) = scale.apply(width, height);
        debug!(
            "Resizing {}x{} -> {}x{} with {:?}",
            width, height, new_width, new_height, self.config.filter
        );
        img.resize_exact(new_width, new_height, self.config.filter.filter_type())
    }

    /// Convert to a color type the target's encoder accepts.
    fn normalize(&self, img: DynamicImage, target: Format) -> DynamicImage {
        let color = img.color();

        if color.has_alpha() && !target.supports_alpha() {
            debug!("Flattening {:?} onto {:?}", color, self.config.background_color);
            return DynamicImage::ImageRgb8(flatten_alpha(&img, self.config.background_color));
        }

        match (target, color) {
            (Format::Jpeg, ColorType::L8 | ColorType::Rgb8) => img,
            (Format::Jpeg, _) => DynamicImage::ImageRgb8(img.to_rgb8()),

            (Format::Gif, ColorType::Rgb8 | ColorType::Rgba8) => img,
            (
                Format::Webp | Format::Bmp,
                ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8,
            ) => img,
            (Format::Gif | Format::Webp | Format::Bmp, _) => to_8bit(img),

            (Format::Tiff, ColorType::La8) => DynamicImage::ImageRgba8(img.to_rgba8()),
            (Format::Tiff, ColorType::La16) => DynamicImage::ImageRgba16(img.to_rgba16()),
            (Format::Png | Format::Tiff, ColorType::Rgb32F) => {
                DynamicImage::ImageRgb16(img.to_rgb16())
            }
            (Format::Png | Format::Tiff, ColorType::Rgba32F) => {
                DynamicImage::ImageRgba16(img.to_rgba16())
            }

            _ => img,
        }
    }
}

/// Open and decode an image, detecting the format from its content.
fn decode(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(ConversionError::InputNotFound(path.to_path_buf()));
    }

    let reader = ImageReader::open(path)
        .map_err(|e| ConversionError::filesystem(path, e))?
        .with_guessed_format()
        .map_err(|e| ConversionError::filesystem(path, e))?;

    reader.decode().map_err(|e| ConversionError::ConversionFailed {
        path: path.to_path_buf(),
        message: format!("Failed to decode image: {}", e),
    })
}

fn encode(img: &DynamicImage, target: Format, source: &Path) -> Result<Vec<u8>> {
    let format = target
        .image_format()
        .ok_or_else(|| ConversionError::unsupported("image", target))?;

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .map_err(|e| ConversionError::ConversionFailed {
            path: source.to_path_buf(),
            message: format!("Failed to encode {}: {}", target, e),
        })?;
    Ok(buf.into_inner())
}

fn to_8bit(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Composite `img` over an opaque background and drop the alpha channel.
pub fn flatten_alpha(img: &DynamicImage, background: (u8, u8, u8)) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let (br, bg, bb) = background;

    let mut flat = RgbImage::new(width, height);
    for (dst, src) in flat.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        let blend =
            |c: u8, b: u8| ((c as u32 * alpha + b as u32 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgb([blend(src[0], br), blend(src[1], bg), blend(src[2], bb)]);
    }
    flat
}
