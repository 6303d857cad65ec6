//! Multipart payload parts.
//!
//! A [`Part`] is one named unit of a request payload. The text, data and
//! image flavours derive the raw bytes and the `Content-Disposition` from
//! richer inputs and keep them in sync whenever one of those inputs changes.
//!
//! # Wire format
//!
//! Every part renders to a self-contained entity:
//!
//! ```text
//! Content-Disposition: <disposition>\r\n
//! Content-Type: <type>\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <payload>\r\n
//! --******\r\n
//! ```
//!
//! and a multipart body is [`MULTIPART_PREAMBLE`] followed by the entities
//! of all parts in order.

use std::io::Cursor;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

/// Line terminator used throughout the multipart format.
pub const CRLF: &str = "\r\n";

/// Literal boundary token separating multipart entities.
pub const BOUNDARY: &str = "******";

/// Leading boundary line that opens every multipart body.
pub const MULTIPART_PREAMBLE: &str = "--******\r\n";

/// `Content-Type` header value announced for multipart request bodies.
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data; boundary=******";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";
const DATA_CONTENT_TYPE: &str = "application/octet-stream";

/// Encoding used for image parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartImageFormat {
    /// Lossless PNG.
    Png,
    /// JPEG at maximum quality.
    Jpeg,
}

impl PartImageFormat {
    /// File extension appended to the part name to form the filename.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    /// MIME type announced in the entity header.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Encode a decoded image into this format.
    pub fn encode(self, image: &DynamicImage) -> LoadResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Png => image
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| LoadError::decode(format!("PNG encoding failed: {e}")))?,
            Self::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 100))
                    .map_err(|e| LoadError::decode(format!("JPEG encoding failed: {e}")))?;
            }
        }
        Ok(buf)
    }
}

/// The richer input a part was built from.
#[derive(Debug, Clone)]
enum PartSource {
    Text(String),
    Data {
        filename: String,
    },
    Image {
        format: PartImageFormat,
        image: Option<Arc<DynamicImage>>,
    },
    Raw,
}

/// One named unit of a multipart payload.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    raw: Bytes,
    content_type: String,
    content_disposition: String,
    source: PartSource,
}

impl Part {
    /// A plain text part.
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut part = Self {
            name: name.into(),
            raw: Bytes::from(text.clone().into_bytes()),
            content_type: TEXT_CONTENT_TYPE.to_string(),
            content_disposition: String::new(),
            source: PartSource::Text(text),
        };
        part.refresh_disposition();
        part
    }

    /// A binary part uploaded as a named file.
    pub fn data(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let mut part = Self {
            name: name.into(),
            raw: data.into(),
            content_type: DATA_CONTENT_TYPE.to_string(),
            content_disposition: String::new(),
            source: PartSource::Data {
                filename: filename.into(),
            },
        };
        part.refresh_disposition();
        part
    }

    /// An image part encoded from a decoded image.
    ///
    /// `name` must not carry an extension; the filename is derived from the
    /// name and the format.
    pub fn image(
        name: impl Into<String>,
        format: PartImageFormat,
        image: DynamicImage,
    ) -> LoadResult<Self> {
        let raw = format.encode(&image)?;
        let mut part = Self {
            name: name.into(),
            raw: Bytes::from(raw),
            content_type: format.mime().to_string(),
            content_disposition: String::new(),
            source: PartSource::Image {
                format,
                image: Some(Arc::new(image)),
            },
        };
        part.refresh_disposition();
        Ok(part)
    }

    /// An image part from bytes that are already encoded in `format`.
    pub fn encoded_image(
        name: impl Into<String>,
        format: PartImageFormat,
        encoded: impl Into<Bytes>,
    ) -> Self {
        let mut part = Self {
            name: name.into(),
            raw: encoded.into(),
            content_type: format.mime().to_string(),
            content_disposition: String::new(),
            source: PartSource::Image {
                format,
                image: None,
            },
        };
        part.refresh_disposition();
        part
    }

    /// A part with fully caller-controlled metadata.
    pub fn raw(
        name: impl Into<String>,
        content_type: impl Into<String>,
        content_disposition: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            raw: data.into(),
            content_type: content_type.into(),
            content_disposition: content_disposition.into(),
            source: PartSource::Raw,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn raw_data(&self) -> &Bytes {
        &self.raw
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_disposition(&self) -> &str {
        &self.content_disposition
    }

    pub fn content_length(&self) -> usize {
        self.raw.len()
    }

    /// The text value, for text parts.
    pub fn text_value(&self) -> Option<&str> {
        match &self.source {
            PartSource::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether this part can be folded into a query string.
    pub const fn is_text(&self) -> bool {
        matches!(self.source, PartSource::Text(_))
    }

    /// The filename announced in the disposition, for data and image parts.
    pub fn filename(&self) -> Option<String> {
        match &self.source {
            PartSource::Data { filename } => Some(filename.clone()),
            PartSource::Image { format, .. } => {
                Some(format!("{}.{}", self.name, format.extension()))
            }
            PartSource::Text(_) | PartSource::Raw => None,
        }
    }

    /// The image format, for image parts.
    pub const fn image_format(&self) -> Option<PartImageFormat> {
        match &self.source {
            PartSource::Image { format, .. } => Some(*format),
            _ => None,
        }
    }

    /// Rename the part; the disposition follows.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.refresh_disposition();
    }

    /// Override the content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Replace the text of a text part; the raw bytes follow.
    pub fn set_text(&mut self, text: impl Into<String>) -> LoadResult<()> {
        let PartSource::Text(current) = &mut self.source else {
            return Err(LoadError::state(format!(
                "part '{}' does not hold text",
                self.name
            )));
        };
        *current = text.into();
        self.raw = Bytes::from(current.clone().into_bytes());
        Ok(())
    }

    /// Replace the filename of a data part; the disposition follows.
    pub fn set_filename(&mut self, filename: impl Into<String>) -> LoadResult<()> {
        let PartSource::Data { filename: current } = &mut self.source else {
            return Err(LoadError::state(format!(
                "part '{}' does not carry a filename",
                self.name
            )));
        };
        *current = filename.into();
        self.refresh_disposition();
        Ok(())
    }

    /// Change the encoding of an image part.
    ///
    /// When the part holds the decoded image, the raw bytes are re-encoded.
    /// Content type and disposition always follow.
    pub fn set_image_format(&mut self, new_format: PartImageFormat) -> LoadResult<()> {
        let PartSource::Image { format, image } = &mut self.source else {
            return Err(LoadError::state(format!(
                "part '{}' is not an image",
                self.name
            )));
        };
        if let Some(image) = image {
            self.raw = Bytes::from(new_format.encode(image)?);
        }
        *format = new_format;
        self.content_type = new_format.mime().to_string();
        self.refresh_disposition();
        Ok(())
    }

    /// Replace the decoded image of an image part; the raw bytes follow.
    pub fn set_image(&mut self, new_image: DynamicImage) -> LoadResult<()> {
        let PartSource::Image { format, image } = &mut self.source else {
            return Err(LoadError::state(format!(
                "part '{}' is not an image",
                self.name
            )));
        };
        self.raw = Bytes::from(format.encode(&new_image)?);
        *image = Some(Arc::new(new_image));
        Ok(())
    }

    fn refresh_disposition(&mut self) {
        let disposition = match self.filename() {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{filename}\"", self.name),
            None if matches!(self.source, PartSource::Raw) => return,
            None => format!("form-data; name=\"{}\"", self.name),
        };
        self.content_disposition = disposition;
    }

    /// Render this part as a complete multipart entity.
    pub fn encode_entity(&self) -> Bytes {
        let header = format!(
            "Content-Disposition: {}{CRLF}Content-Type: {}{CRLF}Content-Length: {}{CRLF}{CRLF}",
            self.content_disposition,
            self.content_type,
            self.raw.len(),
        );
        let trailer = format!("{CRLF}--{BOUNDARY}{CRLF}");

        let mut out = BytesMut::with_capacity(header.len() + self.raw.len() + trailer.len());
        out.put_slice(header.as_bytes());
        out.put_slice(&self.raw);
        out.put_slice(trailer.as_bytes());
        out.freeze()
    }
}
