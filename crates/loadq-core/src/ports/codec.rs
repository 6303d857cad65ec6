//! Image codec port.

use image::DynamicImage;

use crate::error::LoadResult;
use crate::types::Scale;

/// Decode, measure, rescale and encode images.
pub trait ImageCodec: Send + Sync {
    /// Decode a complete payload. Fails with a decode error on unknown data.
    fn decode(&self, bytes: &[u8]) -> LoadResult<DynamicImage>;

    /// Read the pixel dimensions without decoding the whole payload.
    fn dimensions(&self, bytes: &[u8]) -> LoadResult<(u32, u32)>;

    /// Resize preserving the aspect ratio so the result fits inside `scale`.
    fn scale_to_fit(&self, image: &DynamicImage, scale: Scale) -> DynamicImage;

    /// Decode a payload straight to an image that fits inside `scale`.
    ///
    /// Codecs able to subsample while decoding should override this; the
    /// default decodes at full size and then rescales.
    fn decode_to_fit(&self, bytes: &[u8], scale: Scale) -> LoadResult<DynamicImage> {
        let image = self.decode(bytes)?;
        Ok(self.scale_to_fit(&image, scale))
    }

    /// Encode losslessly.
    fn encode_png(&self, image: &DynamicImage) -> LoadResult<Vec<u8>>;
}
