//! `image`-crate backed [`ImageCodec`].

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use loadq_core::{ImageCodec, LoadError, LoadResult, Scale};

/// Decodes any format the `image` crate was built with and re-encodes as PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    pub const fn new() -> Self {
        Self
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> LoadResult<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| LoadError::decode(e.to_string()))
    }

    fn dimensions(&self, bytes: &[u8]) -> LoadResult<(u32, u32)> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| LoadError::decode(format!("cannot sniff image format: {e}")))?
            .into_dimensions()
            .map_err(|e| LoadError::decode(e.to_string()))
    }

    fn scale_to_fit(&self, image: &DynamicImage, scale: Scale) -> DynamicImage {
        image.resize(scale.width.max(1), scale.height.max(1), FilterType::Triangle)
    }

    fn encode_png(&self, image: &DynamicImage) -> LoadResult<Vec<u8>> {
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| LoadError::other(format!("PNG encoding failed: {e}")))?;
        Ok(out)
    }
}
