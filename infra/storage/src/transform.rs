//! Optional lossy normalization applied to image uploads.
//!
//! Implementations may fail freely: the upload pipeline catches every error
//! and keeps the original bytes, so a corrupt image never blocks a valid
//! upload.

use std::borrow::Cow;
use std::fmt::Debug;

#[pixhost_derive::pixhost_error]
pub enum TransformError {
    #[error("Image could not be processed{}: {message}", format_context(.context))]
    Unprocessable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// A best-effort byte transform invoked for uploads flagged for optimization.
pub trait Transform: Send + Sync + Debug {
    fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Transform that returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(bytes.to_vec())
    }
}

#[cfg(feature = "optimizer")]
pub use optimizer::ImageOptimizer;

#[cfg(feature = "optimizer")]
mod optimizer {
    use super::{Transform, TransformError};
    use image::codecs::jpeg::JpegEncoder;
    use image::imageops::FilterType;
    use image::{DynamicImage, GenericImageView, RgbImage};

    /// Shrinks oversized images and re-encodes them as JPEG.
    ///
    /// Images larger than `max_width` x `max_height` are scaled down to fit
    /// (aspect ratio preserved, Lanczos3). Transparent pixels are flattened
    /// onto white before encoding.
    #[derive(Debug, Clone, Copy)]
    pub struct ImageOptimizer {
        pub max_width: u32,
        pub max_height: u32,
        pub quality: u8,
    }

    impl Default for ImageOptimizer {
        fn default() -> Self {
            Self { max_width: 1920, max_height: 1080, quality: 85 }
        }
    }

    impl Transform for ImageOptimizer {
        fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
            let img = image::load_from_memory(bytes).map_err(|e| TransformError::Unprocessable {
                message: e.to_string().into(),
                context: Some("Decoding failed".into()),
            })?;

            let (width, height) = img.dimensions();
            let img = if width > self.max_width || height > self.max_height {
                img.resize(self.max_width, self.max_height, FilterType::Lanczos3)
            } else {
                img
            };

            let rgb = flatten(&img);
            let mut out = Vec::with_capacity(bytes.len() / 2);
            let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder).map_err(|e| {
                TransformError::Unprocessable {
                    message: e.to_string().into(),
                    context: Some("JPEG encoding failed".into()),
                }
            })?;

            Ok(out)
        }
    }

    fn flatten(img: &DynamicImage) -> RgbImage {
        if !img.color().has_alpha() {
            return img.to_rgb8();
        }

        let rgba = img.to_rgba8();
        RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let blend = |c: u8| {
                let (c, a) = (u16::from(c), u16::from(a));
                ((c * a + 255 * (255 - a)) / 255) as u8
            };
            image::Rgb([blend(r), blend(g), blend(b)])
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use image::{ImageFormat, Rgba, RgbaImage};
        use std::io::Cursor;

        fn png(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
            let img = RgbaImage::from_pixel(width, height, pixel);
            let mut out = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(img).write_to(&mut out, ImageFormat::Png).unwrap();
            out.into_inner()
        }

        #[test]
        fn oversized_images_are_scaled_to_fit() {
            let optimizer = ImageOptimizer { max_width: 64, max_height: 32, quality: 80 };
            let out = optimizer.transform(&png(256, 64, Rgba([10, 20, 30, 255]))).unwrap();

            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
            assert_eq!(decoded.dimensions(), (64, 16));
        }

        #[test]
        fn small_images_keep_dimensions() {
            let out = ImageOptimizer::default().transform(&png(8, 8, Rgba([0, 0, 0, 255]))).unwrap();
            assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (8, 8));
        }

        #[test]
        fn transparency_is_flattened_onto_white() {
            let out = ImageOptimizer::default().transform(&png(4, 4, Rgba([0, 0, 0, 0]))).unwrap();
            let pixel = image::load_from_memory(&out).unwrap().to_rgb8().get_pixel(1, 1).0;
            assert!(pixel.iter().all(|&c| c > 240), "expected near-white, got {pixel:?}");
        }

        #[test]
        fn garbage_is_rejected() {
            let err = ImageOptimizer::default().transform(b"definitely not an image").unwrap_err();
            assert_eq!(err.code(), "unprocessable");
        }
    }
}
