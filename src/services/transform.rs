use crate::config::ServiceConfig;
use anyhow::{Context, Result, anyhow};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use std::io::Cursor;

/// What an upload turned out to be once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Canonical extension for the detected format, lowercase.
    pub extension: &'static str,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Derivative {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
}

/// CPU-bound image work. Callers run it on the blocking pool.
pub trait ImageTransformer: Send + Sync {
    /// Decodes `bytes` fully; fails if they are not a supported image.
    fn inspect(&self, bytes: &[u8]) -> Result<ImageInfo>;

    /// Produces the bounded derivative in the source's own format.
    fn resize(&self, bytes: &[u8]) -> Result<Derivative>;
}

pub struct RasterTransformer {
    max_width: u32,
    max_height: u32,
    jpeg_quality: u8,
}

impl RasterTransformer {
    pub fn new(max_width: u32, max_height: u32, jpeg_quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.thumb_max_width,
            config.thumb_max_height,
            config.jpeg_quality,
        )
    }

    fn decode(bytes: &[u8]) -> Result<(ImageFormat, DynamicImage)> {
        let format = image::guess_format(bytes).context("unrecognised image data")?;
        if describe(format).is_none() {
            return Err(anyhow!("unsupported image format {:?}", format));
        }
        let img = image::load_from_memory_with_format(bytes, format)
            .with_context(|| format!("failed to decode {:?} image", format))?;
        Ok((format, img))
    }

    fn output_format(&self, format: ImageFormat) -> ImageOutputFormat {
        match format {
            ImageFormat::Jpeg => ImageOutputFormat::Jpeg(self.jpeg_quality),
            other => other.into(),
        }
    }
}

fn describe(format: ImageFormat) -> Option<(&'static str, &'static str)> {
    match format {
        ImageFormat::Jpeg => Some(("jpg", "image/jpeg")),
        ImageFormat::Png => Some(("png", "image/png")),
        ImageFormat::Gif => Some(("gif", "image/gif")),
        ImageFormat::WebP => Some(("webp", "image/webp")),
        _ => None,
    }
}

impl ImageTransformer for RasterTransformer {
    fn inspect(&self, bytes: &[u8]) -> Result<ImageInfo> {
        let (format, img) = Self::decode(bytes)?;
        let (extension, content_type) =
            describe(format).ok_or_else(|| anyhow!("unsupported image format {:?}", format))?;
        let (width, height) = img.dimensions();
        Ok(ImageInfo {
            extension,
            content_type,
            width,
            height,
        })
    }

    fn resize(&self, bytes: &[u8]) -> Result<Derivative> {
        let (format, img) = Self::decode(bytes)?;
        let (_, content_type) =
            describe(format).ok_or_else(|| anyhow!("unsupported image format {:?}", format))?;

        let (width, height) = img.dimensions();
        let bounded = if width <= self.max_width && height <= self.max_height {
            img
        } else {
            img.resize(self.max_width, self.max_height, FilterType::Lanczos3)
        };

        // JPEG has no alpha channel; the WebP encoder only takes 8-bit RGBA
        let bounded = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(bounded.to_rgb8()),
            ImageFormat::WebP => DynamicImage::ImageRgba8(bounded.to_rgba8()),
            _ => bounded,
        };

        let mut data = Vec::new();
        bounded
            .write_to(&mut Cursor::new(&mut data), self.output_format(format))
            .context("failed to encode derivative")?;

        let (width, height) = bounded.dimensions();
        tracing::debug!("Resized image to {}x{} ({} bytes)", width, height, data.len());

        Ok(Derivative {
            data,
            width,
            height,
            content_type,
        })
    }
}
