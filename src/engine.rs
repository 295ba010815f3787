//! The operations this crate consumes from a Jpeg 2000 codec engine.
//!
//! The engine owns the bitstream algorithms. Each operation reports failure with a
//! sentinel (`false` or `None`), the session and encoder translate those into typed
//! errors. Handles are released by dropping them.
use std::path::Path;

use crate::event::SharedSink;

/// Codestream flavor a codec is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFormat {
  /// Raw codestream.
  J2K,
  /// JP2 container.
  JP2,
  /// JPIP stream.
  JPT,
}

impl std::fmt::Display for CodecFormat {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Self::J2K => write!(f, "J2K"),
      Self::JP2 => write!(f, "JP2"),
      Self::JPT => write!(f, "JPT"),
    }
  }
}

/// Area of the reference grid, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
  pub x0: u32,
  pub y0: u32,
  pub x1: u32,
  pub y1: u32,
}

impl Region {
  pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
    Self { x0, y0, x1, y1 }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeParams {
  pub reduce: u32,
  pub layers: u32,
  pub threads: Option<u32>,
}

/// Tiling of a codestream, as declared by its main header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodestreamInfo {
  pub tx0: u32,
  pub ty0: u32,
  pub tdx: u32,
  pub tdy: u32,
  /// Number of tiles in X.
  pub tw: u32,
  /// Number of tiles in Y.
  pub th: u32,
  pub numcomps: u32,
}

impl CodestreamInfo {
  pub fn tile_count(&self) -> u32 {
    self.tw.saturating_mul(self.th)
  }
}

/// Borrowed view of one decoded image component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentView<'a> {
  pub width: u32,
  pub height: u32,
  pub precision: u32,
  pub signed: bool,
  /// Number of components in the image the view was taken from.
  pub components: u32,
  pub data: &'a [i32],
}

/// Parameters of one image component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentParams {
  pub dx: u32,
  pub dy: u32,
  pub w: u32,
  pub h: u32,
  pub x0: u32,
  pub y0: u32,
  pub prec: u32,
  pub sgnd: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionOrder {
  LRCP,
  RLCP,
  RPCL,
  PCRL,
  CPRL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
  Gray,
  SRGB,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
  pub layers: u32,
  pub fixed_quality: bool,
  pub distortion_ratio: Option<f32>,
  pub irreversible: bool,
  pub resolutions: u32,
  pub progression: ProgressionOrder,
  pub tile_origin: (u32, u32),
  pub tile_size: (u32, u32),
}

/// A Jpeg 2000 codec engine.
///
/// Handles are exclusively owned by one session or encoder at a time and are never
/// used from two threads at once.
pub trait Engine {
  type Codec;
  type Stream;
  type Image;

  /// Create a decoder whose messages go to `sink`.
  fn create_decoder(&self, format: CodecFormat, sink: &SharedSink) -> Option<Self::Codec>;
  fn setup_decoder(&self, codec: &mut Self::Codec, params: &DecodeParams) -> bool;
  fn open_input(&self, path: &Path) -> Option<Self::Stream>;
  fn read_header(&self, codec: &mut Self::Codec, stream: &mut Self::Stream)
    -> Option<Self::Image>;
  fn set_decode_area(
    &self,
    codec: &mut Self::Codec,
    image: &mut Self::Image,
    region: &Region,
  ) -> bool;
  fn codestream_info(&self, codec: &mut Self::Codec) -> Option<CodestreamInfo>;
  fn set_resolution_factor(&self, codec: &mut Self::Codec, factor: u32) -> bool;
  fn decode(
    &self,
    codec: &mut Self::Codec,
    stream: &mut Self::Stream,
    image: &mut Self::Image,
  ) -> bool;
  fn end_decompress(&self, codec: &mut Self::Codec, stream: &mut Self::Stream) -> bool;
  fn decode_tile(
    &self,
    codec: &mut Self::Codec,
    stream: &mut Self::Stream,
    image: &mut Self::Image,
    tile_index: u32,
  ) -> bool;
  fn first_component<'a>(&self, image: &'a Self::Image) -> Option<ComponentView<'a>>;

  /// Create an encoder whose messages go to `sink`.
  fn create_encoder(&self, format: CodecFormat, sink: &SharedSink) -> Option<Self::Codec>;
  /// Create an image descriptor for tile based compression covering `width` x `height`.
  fn create_tile_image(
    &self,
    comps: &[ComponentParams],
    color_space: ColorSpace,
    width: u32,
    height: u32,
  ) -> Option<Self::Image>;
  fn setup_encoder(
    &self,
    codec: &mut Self::Codec,
    params: &EncodeParams,
    image: &mut Self::Image,
  ) -> bool;
  fn open_output(&self, path: &Path) -> Option<Self::Stream>;
  fn start_compress(
    &self,
    codec: &mut Self::Codec,
    image: &mut Self::Image,
    stream: &mut Self::Stream,
  ) -> bool;
  fn write_tile(
    &self,
    codec: &mut Self::Codec,
    tile_index: u32,
    data: &[u8],
    stream: &mut Self::Stream,
  ) -> bool;
  fn end_compress(&self, codec: &mut Self::Codec, stream: &mut Self::Stream) -> bool;
}
