use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageDecoder, ImageError, ImageFormat, ImageReader};

use crate::errors::{ClassifierError, ClassifierResult};

pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// The image encodings accepted at the upload gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    Jpeg,
    Png,
}

impl SupportedFormat {
    pub fn from_mime(mime: &str) -> ClassifierResult<SupportedFormat> {
        match mime {
            "image/jpeg" => Ok(SupportedFormat::Jpeg),
            "image/png" => Ok(SupportedFormat::Png),
            _ => Err(ClassifierError::UnsupportedFormat { mime: mime.to_string() }),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            SupportedFormat::Jpeg => "image/jpeg",
            SupportedFormat::Png => "image/png",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            SupportedFormat::Jpeg => ImageFormat::Jpeg,
            SupportedFormat::Png => ImageFormat::Png,
        }
    }
}

/// A user supplied file: its name, declared MIME type and raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Upload {
        Upload { name: name.into(), mime: mime.into(), bytes }
    }

    /// Reads a file, declaring its MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> ClassifierResult<Upload> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Upload::new(path.display().to_string(), mime_for_path(path), bytes))
    }

    /// Checks the declared type against the accepted formats.
    pub fn format(&self) -> ClassifierResult<SupportedFormat> {
        SupportedFormat::from_mime(&self.mime)
    }

    /// Decodes and applies the embedded orientation.
    ///
    /// The declared type only gates the upload: the actual encoding is sniffed
    /// from the bytes, falling back to the declared one.
    pub fn decode(&self) -> ClassifierResult<DynamicImage> {
        let declared = self.format()?;
        let decode_err = |source| ClassifierError::Decode { name: self.name.clone(), source };
        let mut reader = ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .map_err(|e| decode_err(ImageError::IoError(e)))?;
        if reader.format().is_none() {
            reader.set_format(declared.image_format());
        }
        let mut decoder = reader.into_decoder().map_err(decode_err)?;
        let orientation = decoder.orientation().map_err(decode_err)?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
        image.apply_orientation(orientation);
        debug!("decoded {} ({}) as {}x{}", self.name, self.mime, image.width(), image.height());
        Ok(image)
    }
}

/// MIME type for a path, guessed from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path).map(|f| f.to_mime_type()).unwrap_or(UNKNOWN_MIME)
}
