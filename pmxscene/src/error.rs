use std::path::PathBuf;

use image::ImageFormat;
use pmxread::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode model: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to read texture {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("texture {} is not in a recognised image format", .0.display())]
    UnknownFormat(PathBuf),
    #[error("texture {} is {format:?}, which is not supported", path.display())]
    UnsupportedFormat { path: PathBuf, format: ImageFormat },
}
