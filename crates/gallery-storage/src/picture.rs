//! Picture inspection and derivation.
//!
//! Decoding and encoding are CPU-bound; callers run [`process`] on the blocking pool.

use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::keys;
use crate::traits::ArtifactKind;
use crate::{StorageError, StorageResult};

const DEFAULT_THUMBNAIL_THRESHOLD_BYTES: u64 = 2 * 1024;
const DEFAULT_THUMBNAIL_MAX_EDGE: u32 = 256;

/// Which derived copies `store_picture` produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationRules {
    pub enabled: bool,
    /// Thumbnails are only made for sources strictly larger than this.
    pub thumbnail_threshold_bytes: u64,
    pub thumbnail_max_edge: u32,
}

impl Default for DerivationRules {
    fn default() -> Self {
        Self {
            enabled: true,
            thumbnail_threshold_bytes: DEFAULT_THUMBNAIL_THRESHOLD_BYTES,
            thumbnail_max_edge: DEFAULT_THUMBNAIL_MAX_EDGE,
        }
    }
}

impl DerivationRules {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Intrinsic properties of an encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Encoded derived copy, not yet stored.
#[derive(Debug)]
pub(crate) struct EncodedArtifact {
    pub kind: ArtifactKind,
    pub key: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        other => other
            .extensions_str()
            .first()
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| format!("{:?}", other).to_lowercase()),
    }
}

fn invalid(e: impl std::fmt::Display) -> StorageError {
    StorageError::InvalidImage(e.to_string())
}

/// Read width, height and format without decoding the pixel data.
pub fn read_metadata(data: &[u8]) -> StorageResult<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(invalid)?;
    let format = reader
        .format()
        .ok_or_else(|| invalid("unrecognized image format"))?;
    let (width, height) = reader.into_dimensions().map_err(invalid)?;
    Ok(ImageMetadata {
        width,
        height,
        format: format_name(format),
    })
}

fn encode(img: &DynamicImage, format: ImageFormat) -> StorageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format)
        .map_err(|e| StorageError::BackendError(format!("Failed to encode picture: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Inspect the original and encode its derived copies according to `rules`.
pub(crate) fn process(
    data: &[u8],
    key: &str,
    rules: &DerivationRules,
) -> StorageResult<(ImageMetadata, Vec<EncodedArtifact>)> {
    if !rules.enabled {
        return Ok((read_metadata(data)?, Vec::new()));
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(invalid)?;
    let source_format = reader
        .format()
        .ok_or_else(|| invalid("unrecognized image format"))?;
    let img = reader.decode().map_err(invalid)?;

    let metadata = ImageMetadata {
        width: img.width(),
        height: img.height(),
        format: format_name(source_format),
    };
    let stem = keys::stem(key);
    let mut artifacts = Vec::with_capacity(2);

    if source_format != ImageFormat::WebP {
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
        artifacts.push(EncodedArtifact {
            kind: ArtifactKind::Compressed,
            key: format!("{}.webp", stem),
            data: encode(&rgba, ImageFormat::WebP)?,
            width: rgba.width(),
            height: rgba.height(),
            format: "webp".to_string(),
        });
    }

    if data.len() as u64 > rules.thumbnail_threshold_bytes {
        let max_edge = rules.thumbnail_max_edge;
        let resized = if img.width() > max_edge || img.height() > max_edge {
            img.thumbnail(max_edge, max_edge)
        } else {
            img.clone()
        };
        let ext = keys::extension(key).unwrap_or("png").to_lowercase();
        let thumb_format = ImageFormat::from_extension(&ext).unwrap_or(ImageFormat::Png);
        let thumb = match thumb_format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => DynamicImage::ImageRgba8(resized.to_rgba8()),
        };
        artifacts.push(EncodedArtifact {
            kind: ArtifactKind::Thumbnail,
            key: format!("{}_thumbnail.{}", stem, ext),
            data: encode(&thumb, thumb_format)?,
            width: thumb.width(),
            height: thumb.height(),
            format: format_name(thumb_format),
        });
    }

    Ok((metadata, artifacts))
}
