use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::TextureError;

/// TGA has no magic header; version 2 files end with this footer.
const TGA_FOOTER: &[u8] = b"TRUEVISION-XFILE.\0";

/// Detects a texture's container format from its leading bytes, or its
/// trailing footer for TGA.
pub fn sniff_texture_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format) => Some(format),
        Err(_) if bytes.ends_with(TGA_FOOTER) => Some(ImageFormat::Tga),
        Err(_) => None,
    }
}

/// Formats accepted as model textures.
pub fn is_decodable(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Tga | ImageFormat::Bmp
    )
}

#[derive(Debug, Clone)]
pub struct TextureData {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

pub fn load_texture_bytes(path: impl AsRef<Path>) -> Result<TextureData, TextureError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| TextureError::Io {
        path: path.to_owned(),
        source,
    })?;
    let format =
        sniff_texture_format(&bytes).ok_or_else(|| TextureError::UnknownFormat(path.to_owned()))?;
    if !is_decodable(format) {
        return Err(TextureError::UnsupportedFormat {
            path: path.to_owned(),
            format,
        });
    }
    log::debug!("Texture {} detected as {:?}", path.display(), format);
    Ok(TextureData {
        path: path.to_owned(),
        format,
        bytes,
    })
}
