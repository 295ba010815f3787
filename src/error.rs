use std::path::PathBuf;

use thiserror::Error;

use crate::format::FormatTag;

/// Errors reported by the codec session, the tile encoder and the metadata reader.
///
/// Every engine failure is local to the call that triggered it. By the time one of
/// these is returned the resources owned by the failing operation have been released.
#[derive(Error, Debug)]
pub enum Error {
  #[error("Invalid format for {}: {reason}", .path.display())]
  InvalidFormat { path: PathBuf, reason: String },
  #[error("Unrecognized format {format:?} for input {} - Accept only .j2k, .jp2, .jpc or .jpt", .path.display())]
  UnsupportedFormat { path: PathBuf, format: FormatTag },
  #[error("Failed to create stream from file {}", .path.display())]
  StreamOpen { path: PathBuf },
  #[error("Failed to set up the decoder for {}: {reason}", .path.display())]
  DecoderSetup { path: PathBuf, reason: String },
  #[error("Failed to read the header of {}", .path.display())]
  HeaderRead { path: PathBuf },
  #[error("Could not decode image {}: {reason}", .path.display())]
  Decode { path: PathBuf, reason: String },
  #[error("Could not decode tile {tile} of {}", .path.display())]
  TileDecode { path: PathBuf, tile: u32 },
  #[error("Failed to set resolution factor {level}: {reason}")]
  ResolutionSet { level: u32, reason: String },
  #[error("No file loaded, open a stream before decoding tiles")]
  NotLoaded,
  #[error("Decode mode disabled by session capabilities: {0}")]
  CapabilityDisabled(&'static str),
  #[error("Failed to create {format} encoder")]
  EncoderCreate { format: String },
  #[error("Failed to create tiled output image")]
  ImageCreate,
  #[error("Failed to set up encoder")]
  EncoderSetup,
  #[error("Failed to start compress")]
  CompressStart,
  #[error("Failed to write tile {tile} of {count}")]
  TileWrite { tile: u32, count: u32 },
  #[error("Failed to end compress")]
  CompressEnd,
  #[error("Invalid tile geometry: {0}")]
  InvalidTileGeometry(String),
  #[error("Invalid component count {0}, expected 1 to {max}", max = crate::encode::MAX_COMPONENTS)]
  InvalidComponentCount(u32),
  #[error("Invalid sample buffer: expected {expected} samples, got {actual}")]
  InvalidSampleBuffer { expected: usize, actual: usize },
  #[error("No XML box found in {}", .path.display())]
  MetadataNotFound { path: PathBuf },
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
