//! Decoder and encoder configuration.
use bitflags::bitflags;

use crate::engine::{DecodeParams, EncodeParams, ProgressionOrder, Region};

/// Use every thread the engine offers.
pub const ALL_THREADS: u32 = 0;

bitflags! {
  /// Decode modes a session is allowed to use.
  pub struct Capabilities: u32 {
    /// Single tile decode.
    const TILES = 0b0001;
    /// Whole image decode.
    const WHOLE_IMAGE = 0b0010;
    /// Forward the thread count hint to the engine.
    const THREADED = 0b0100;
  }
}

impl Default for Capabilities {
  fn default() -> Self {
    Self::TILES | Self::WHOLE_IMAGE
  }
}

/// Settings applied each time a session sets up its decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
  /// Number of highest resolution levels to discard, 0 is full resolution.
  pub resolution_level: u32,
  /// Maximum quality layers to decode, 0 decodes all of them.
  pub quality_layers: u32,
  /// Decode only this area of the reference grid.
  pub region: Option<Region>,
  pub threads: u32,
  pub capabilities: Capabilities,
}

impl Default for DecoderConfig {
  fn default() -> Self {
    Self {
      resolution_level: 0,
      quality_layers: 0,
      region: None,
      threads: ALL_THREADS,
      capabilities: Capabilities::default(),
    }
  }
}

impl DecoderConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn resolution_level(mut self, level: u32) -> Self {
    self.resolution_level = level;
    self
  }

  pub fn quality_layers(mut self, layers: u32) -> Self {
    self.quality_layers = layers;
    self
  }

  pub fn region(mut self, region: Region) -> Self {
    self.region = Some(region);
    self
  }

  /// Set the thread hint and enable `THREADED`.
  pub fn threads(mut self, threads: u32) -> Self {
    self.threads = threads;
    self.capabilities.insert(Capabilities::THREADED);
    self
  }

  pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
    self.capabilities = capabilities;
    self
  }

  pub(crate) fn decode_params(&self) -> DecodeParams {
    DecodeParams {
      reduce: self.resolution_level,
      layers: self.quality_layers,
      threads: if self.capabilities.contains(Capabilities::THREADED) {
        Some(self.threads)
      } else {
        None
      },
    }
  }
}

/// Settings for tiled compression.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
  pub quality_layers: u32,
  pub fixed_quality: bool,
  /// Target distortion (PSNR in dB) of the single layer, `None` leaves the engine default.
  pub distortion_ratio: Option<f32>,
  pub irreversible: bool,
  pub resolutions: u32,
  pub progression: ProgressionOrder,
  pub tile_origin: (u32, u32),
}

impl Default for EncoderConfig {
  fn default() -> Self {
    Self {
      quality_layers: 1,
      fixed_quality: true,
      distortion_ratio: None,
      irreversible: true,
      resolutions: 6,
      progression: ProgressionOrder::LRCP,
      tile_origin: (0, 0),
    }
  }
}

impl EncoderConfig {
  pub(crate) fn encode_params(&self, tile_width: u32, tile_height: u32) -> EncodeParams {
    EncodeParams {
      layers: self.quality_layers,
      fixed_quality: self.fixed_quality,
      distortion_ratio: self.distortion_ratio,
      irreversible: self.irreversible,
      resolutions: self.resolutions,
      progression: self.progression,
      tile_origin: self.tile_origin,
      tile_size: (tile_width, tile_height),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn thread_hint_requires_threaded() {
    let config = DecoderConfig::default();
    assert_eq!(config.decode_params().threads, None);

    let config = DecoderConfig::new().threads(4);
    assert!(config.capabilities.contains(Capabilities::THREADED));
    assert_eq!(config.decode_params().threads, Some(4));
  }

  #[test]
  fn encoder_defaults() {
    let params = EncoderConfig::default().encode_params(512, 256);
    assert_eq!(params.layers, 1);
    assert!(params.fixed_quality);
    assert!(params.irreversible);
    assert_eq!(params.resolutions, 6);
    assert_eq!(params.progression, ProgressionOrder::LRCP);
    assert_eq!(params.tile_origin, (0, 0));
    assert_eq!(params.tile_size, (512, 256));
  }
}
