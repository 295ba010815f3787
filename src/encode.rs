//! Tile based compression of a flat image buffer.
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};
use smallvec::SmallVec;

use crate::config::EncoderConfig;
use crate::engine::{CodecFormat, ColorSpace, ComponentParams, Engine};
use crate::error::{Error, Result};
use crate::event::{default_sink, SharedSink};

#[cfg(feature = "openjpeg")]
use crate::openjpeg::OpenJpeg;

/// Maximum number of components per image.
pub const MAX_COMPONENTS: u32 = 4;
/// Widest sample the encoder accepts.
pub const MAX_BITS_PER_SAMPLE: u32 = 16;

/// Partition of an image into equally sized tiles.
///
/// ```text
///  ___________ tile_count_x
/// | 0 | 1 | 2 |
/// |___|___|___|
/// | 3 | 4 | 5 |
/// |___|___|___|
/// tile_count_y
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
  pub image_width: u32,
  pub image_height: u32,
  pub tile_width: u32,
  pub tile_height: u32,
  pub components: u32,
  pub bits_per_sample: u32,
}

impl TileLayout {
  /// Validate the geometry. Only whole tiles are supported.
  pub fn new(
    image_width: u32,
    image_height: u32,
    tile_width: u32,
    tile_height: u32,
    components: u32,
    bits_per_sample: u32,
  ) -> Result<Self> {
    if image_width == 0 || image_height == 0 || tile_width == 0 || tile_height == 0 {
      return Err(Error::InvalidTileGeometry(format!(
        "image {}x{} and tile {}x{} must not be empty",
        image_width, image_height, tile_width, tile_height
      )));
    }
    if image_width % tile_width != 0 || image_height % tile_height != 0 {
      return Err(Error::InvalidTileGeometry(format!(
        "image {}x{} is not a multiple of tile {}x{}",
        image_width, image_height, tile_width, tile_height
      )));
    }
    if components == 0 || components > MAX_COMPONENTS {
      return Err(Error::InvalidComponentCount(components));
    }
    if bits_per_sample == 0 || bits_per_sample > MAX_BITS_PER_SAMPLE {
      return Err(Error::InvalidTileGeometry(format!(
        "{} bits per sample, expected 1 to {}",
        bits_per_sample, MAX_BITS_PER_SAMPLE
      )));
    }
    Ok(Self {
      image_width,
      image_height,
      tile_width,
      tile_height,
      components,
      bits_per_sample,
    })
  }

  pub fn tile_count_x(&self) -> u32 {
    self.image_width / self.tile_width
  }

  pub fn tile_count_y(&self) -> u32 {
    self.image_height / self.tile_height
  }

  pub fn tile_count(&self) -> u32 {
    self.tile_count_x() * self.tile_count_y()
  }

  /// Bytes used to store one sample, 1 up to 8 bits and 2 up to 16 bits.
  pub fn bytes_per_sample(&self) -> usize {
    ((self.bits_per_sample + 7) / 8) as usize
  }

  pub fn tile_bytes(&self) -> usize {
    self.tile_width as usize
      * self.tile_height as usize
      * self.components as usize
      * self.bytes_per_sample()
  }

  /// Samples expected in the source buffer, one plane per component.
  pub fn sample_count(&self) -> usize {
    self.image_width as usize * self.image_height as usize * self.components as usize
  }

  /// Pixel position of the top-left corner of tile `index`.
  pub fn tile_origin(&self, index: u32) -> (u32, u32) {
    let col = index % self.tile_count_x();
    let row = index / self.tile_count_x();
    (col * self.tile_width, row * self.tile_height)
  }

  fn max_value(&self) -> i32 {
    ((1u32 << self.bits_per_sample) - 1) as i32
  }

  /// Copy tile `index` out of `samples`, component planes one after the other and
  /// rows in order within each plane.
  fn copy_tile(&self, index: u32, samples: &[i32], out: &mut [u8]) {
    let width = self.image_width as usize;
    let plane = width * self.image_height as usize;
    let (x0, y0) = self.tile_origin(index);
    let tile_w = self.tile_width as usize;
    let bps = self.bytes_per_sample();
    let max = self.max_value();

    let rows = (0..self.components as usize).flat_map(move |comp| {
      (0..self.tile_height as usize).map(move |y| {
        let start = comp * plane + (y0 as usize + y) * width + x0 as usize;
        start..start + tile_w
      })
    });
    let values = rows.flat_map(move |row| samples[row].iter().map(move |v| (*v).max(0).min(max)));
    for (dst, value) in out.chunks_exact_mut(bps).zip(values) {
      if bps == 1 {
        dst[0] = value as u8;
      } else {
        NativeEndian::write_u16(dst, value as u16);
      }
    }
  }

  /// Re-layout a row-major buffer into per-tile byte sequences, in tile index order.
  pub fn partition(&self, samples: &[i32]) -> Result<Vec<Vec<u8>>> {
    if samples.len() != self.sample_count() {
      return Err(Error::InvalidSampleBuffer {
        expected: self.sample_count(),
        actual: samples.len(),
      });
    }
    let tiles = (0..self.tile_count())
      .map(|index| {
        let mut tile = vec![0u8; self.tile_bytes()];
        self.copy_tile(index, samples, &mut tile);
        tile
      })
      .collect();
    Ok(tiles)
  }
}

/// Codec flavor implied by the output name, `.jp2` or else a raw codestream.
pub fn output_format<P: AsRef<Path>>(path: P) -> CodecFormat {
  if path.as_ref().to_string_lossy().ends_with(".jp2") {
    CodecFormat::JP2
  } else {
    CodecFormat::J2K
  }
}

/// Handles acquired by one encode, released stream first.
struct EncodeResources<E: Engine> {
  stream: Option<E::Stream>,
  image: Option<E::Image>,
  codec: Option<E::Codec>,
}

impl<E: Engine> Drop for EncodeResources<E> {
  fn drop(&mut self) {
    drop(self.stream.take());
    drop(self.image.take());
    drop(self.codec.take());
  }
}

/// Compresses images one tile at a time.
pub struct TileEncoder<E: Engine> {
  engine: E,
  sink: SharedSink,
  config: EncoderConfig,
}

#[cfg(feature = "openjpeg")]
impl TileEncoder<OpenJpeg> {
  pub fn new() -> Self {
    Self::with_engine(OpenJpeg, default_sink())
  }
}

#[cfg(feature = "openjpeg")]
impl Default for TileEncoder<OpenJpeg> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Engine> TileEncoder<E> {
  pub fn with_engine(engine: E, sink: SharedSink) -> Self {
    Self {
      engine,
      sink,
      config: EncoderConfig::default(),
    }
  }

  pub fn with_config(mut self, config: EncoderConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> &EncoderConfig {
    &self.config
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// Compress `samples` to `output`, writing every tile of `layout` in index order.
  ///
  /// On failure the output file is left incomplete.
  pub fn encode_as_tiles<P: AsRef<Path>>(
    &self,
    output: P,
    samples: &[i32],
    layout: &TileLayout,
  ) -> Result<()> {
    let result = self.try_encode(output.as_ref(), samples, layout);
    if let Err(err) = &result {
      self.sink.error(&err.to_string());
    }
    result
  }

  fn try_encode(&self, output: &Path, samples: &[i32], layout: &TileLayout) -> Result<()> {
    // Fields are public, check the geometry again before touching the engine.
    let layout = &TileLayout::new(
      layout.image_width,
      layout.image_height,
      layout.tile_width,
      layout.tile_height,
      layout.components,
      layout.bits_per_sample,
    )?;
    if samples.len() != layout.sample_count() {
      return Err(Error::InvalidSampleBuffer {
        expected: layout.sample_count(),
        actual: samples.len(),
      });
    }
    let format = output_format(output);

    // Image definition, one component plane per channel.
    let comps: SmallVec<[ComponentParams; MAX_COMPONENTS as usize]> = (0..layout.components)
      .map(|_| ComponentParams {
        dx: 1,
        dy: 1,
        w: layout.image_width,
        h: layout.image_height,
        x0: 0,
        y0: 0,
        prec: layout.bits_per_sample,
        sgnd: false,
      })
      .collect();
    let params = self
      .config
      .encode_params(layout.tile_width, layout.tile_height);

    let engine = &self.engine;
    let mut res = EncodeResources::<E> {
      stream: None,
      image: None,
      codec: None,
    };
    let codec = match engine.create_encoder(format, &self.sink) {
      Some(c) => res.codec.insert(c),
      None => {
        return Err(Error::EncoderCreate {
          format: format.to_string(),
        })
      }
    };
    let image = match engine.create_tile_image(
      &comps,
      ColorSpace::Gray,
      layout.image_width,
      layout.image_height,
    ) {
      Some(i) => res.image.insert(i),
      None => return Err(Error::ImageCreate),
    };
    if !engine.setup_encoder(codec, &params, image) {
      return Err(Error::EncoderSetup);
    }
    let stream = match engine.open_output(output) {
      Some(s) => res.stream.insert(s),
      None => {
        return Err(Error::StreamOpen {
          path: output.to_path_buf(),
        })
      }
    };

    let tiles = layout.partition(samples)?;
    log::debug!(
      "encoding {} tiles of {}x{} into {}",
      tiles.len(),
      layout.tile_width,
      layout.tile_height,
      output.display()
    );

    if !engine.start_compress(codec, image, stream) {
      return Err(Error::CompressStart);
    }
    let count = tiles.len() as u32;
    for (index, tile) in tiles.iter().enumerate() {
      let index = index as u32;
      if !engine.write_tile(codec, index, tile, stream) {
        return Err(Error::TileWrite { tile: index, count });
      }
    }
    if !engine.end_compress(codec, stream) {
      return Err(Error::CompressEnd);
    }
    Ok(())
  }
}

/// Compress a flat image buffer as tiles with the OpenJpeg engine.
#[cfg(feature = "openjpeg")]
#[allow(clippy::too_many_arguments)]
pub fn encode_as_tiles<P: AsRef<Path>>(
  output: P,
  samples: &[i32],
  image_width: u32,
  image_height: u32,
  tile_width: u32,
  tile_height: u32,
  components: u32,
  bits_per_sample: u32,
) -> Result<()> {
  let layout = TileLayout::new(
    image_width,
    image_height,
    tile_width,
    tile_height,
    components,
    bits_per_sample,
  )?;
  TileEncoder::new().encode_as_tiles(output, samples, &layout)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_partial_tiles() {
    assert!(matches!(
      TileLayout::new(100, 100, 30, 50, 1, 8),
      Err(Error::InvalidTileGeometry(_))
    ));
    assert!(matches!(
      TileLayout::new(0, 100, 10, 10, 1, 8),
      Err(Error::InvalidTileGeometry(_))
    ));
    assert!(matches!(
      TileLayout::new(100, 100, 10, 10, 5, 8),
      Err(Error::InvalidComponentCount(5))
    ));
    assert!(matches!(
      TileLayout::new(100, 100, 10, 10, 1, 17),
      Err(Error::InvalidTileGeometry(_))
    ));
  }

  #[test]
  fn layout_counts() {
    let layout = TileLayout::new(4096, 4096, 512, 512, 1, 8).unwrap();
    assert_eq!(layout.tile_count_x(), 8);
    assert_eq!(layout.tile_count_y(), 8);
    assert_eq!(layout.tile_count(), 64);
    assert_eq!(layout.tile_bytes(), 262_144);
    assert_eq!(layout.tile_origin(0), (0, 0));
    assert_eq!(layout.tile_origin(7), (3584, 0));
    assert_eq!(layout.tile_origin(56), (0, 3584));
    assert_eq!(layout.tile_origin(63), (3584, 3584));
  }

  #[test]
  fn partition_is_row_major() {
    // 4x4 image, 2x2 tiles, sample value = its index in the flat buffer.
    let layout = TileLayout::new(4, 4, 2, 2, 1, 8).unwrap();
    let samples: Vec<i32> = (0..16).collect();
    let tiles = layout.partition(&samples).unwrap();
    assert_eq!(
      tiles,
      vec![
        vec![0, 1, 4, 5],
        vec![2, 3, 6, 7],
        vec![8, 9, 12, 13],
        vec![10, 11, 14, 15],
      ]
    );
  }

  #[test]
  fn partition_planar_components() {
    let layout = TileLayout::new(2, 2, 1, 2, 2, 8).unwrap();
    let samples = vec![1, 2, 3, 4, 10, 20, 30, 40];
    let tiles = layout.partition(&samples).unwrap();
    assert_eq!(tiles, vec![vec![1, 3, 10, 30], vec![2, 4, 20, 40]]);
  }

  #[test]
  fn partition_clamps_and_widens() {
    let layout = TileLayout::new(2, 1, 2, 1, 1, 8).unwrap();
    assert_eq!(layout.partition(&[-5, 300]).unwrap(), vec![vec![0, 255]]);

    let layout = TileLayout::new(2, 1, 2, 1, 1, 12).unwrap();
    assert_eq!(layout.bytes_per_sample(), 2);
    let tiles = layout.partition(&[0x0123, 5000]).unwrap();
    assert_eq!(tiles[0].len(), 4);
    assert_eq!(NativeEndian::read_u16(&tiles[0][0..2]), 0x0123);
    assert_eq!(NativeEndian::read_u16(&tiles[0][2..4]), 4095);
  }

  #[test]
  fn partition_checks_buffer_length() {
    let layout = TileLayout::new(4, 4, 2, 2, 1, 8).unwrap();
    assert!(matches!(
      layout.partition(&[0; 15]),
      Err(Error::InvalidSampleBuffer {
        expected: 16,
        actual: 15
      })
    ));
  }

  #[test]
  fn output_format_from_name() {
    assert_eq!(output_format("out.jp2"), CodecFormat::JP2);
    assert_eq!(output_format("out.j2k"), CodecFormat::J2K);
    assert_eq!(output_format("out.jp2.tmp"), CodecFormat::J2K);
  }
}
