//! Decode session over one input file.
//!
//! A session walks the engine through the required call sequence:
//!
//! ```text
//! NoStream --open_stream--> StreamOpen --setup_decoder--> Ready --decode_*--> Ready
//!     any state --open_stream--> StreamOpen
//!     any failure / destroy --> Destroyed
//! ```
//!
//! Setup runs lazily on the first decode. Every engine failure releases all handles
//! owned by the session before the error is returned.
use std::path::{Path, PathBuf};

use crate::config::{Capabilities, DecoderConfig};
use crate::engine::{CodecFormat, CodestreamInfo, ComponentView, Engine};
use crate::error::{Error, Result};
use crate::event::{default_sink, SharedSink};
use crate::format::{self, FormatTag};

#[cfg(feature = "openjpeg")]
use crate::openjpeg::OpenJpeg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  NoStream,
  StreamOpen,
  Ready,
  Destroyed,
}

/// First component of a decoded image, copied out of the engine's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
  pub width: u32,
  pub height: u32,
  pub precision: u32,
  pub signed: bool,
  /// Components in the source image, only the first one is returned.
  pub components: u32,
  pub data: Vec<i32>,
}

impl DecodedImage {
  /// Copy the view, `None` when the engine returned fewer samples than its extent.
  fn from_view(view: ComponentView<'_>) -> Option<Self> {
    let len = view.width as usize * view.height as usize;
    let data = view.data.get(..len)?;
    Some(Self {
      width: view.width,
      height: view.height,
      precision: view.precision,
      signed: view.signed,
      components: view.components,
      data: data.to_vec(),
    })
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

/// The engine handles of one open input.
///
/// Released together in a fixed order: stream, codestream info, codec, image.
struct Resources<E: Engine> {
  stream: Option<E::Stream>,
  info: Option<CodestreamInfo>,
  codec: Option<E::Codec>,
  image: Option<E::Image>,
}

impl<E: Engine> Resources<E> {
  fn new() -> Self {
    Self {
      stream: None,
      info: None,
      codec: None,
      image: None,
    }
  }

  fn is_empty(&self) -> bool {
    self.stream.is_none() && self.info.is_none() && self.codec.is_none() && self.image.is_none()
  }

  fn release(&mut self) {
    drop(self.stream.take());
    drop(self.info.take());
    drop(self.codec.take());
    drop(self.image.take());
  }
}

impl<E: Engine> Drop for Resources<E> {
  fn drop(&mut self) {
    self.release();
  }
}

const MISSING_SAMPLES: &str = "decoded component is missing or shorter than its extent";

fn codec_format(format: FormatTag) -> Option<CodecFormat> {
  match format {
    FormatTag::Codestream => Some(CodecFormat::J2K),
    FormatTag::Jp2Container => Some(CodecFormat::JP2),
    FormatTag::Jpip => Some(CodecFormat::JPT),
    _ => None,
  }
}

/// A stateful decode session bound to one input file at a time.
///
/// A session is not thread safe, use one session per thread.
pub struct CodecSession<E: Engine> {
  engine: E,
  sink: SharedSink,
  config: DecoderConfig,
  path: Option<PathBuf>,
  format: Option<CodecFormat>,
  res: Resources<E>,
  state: SessionState,
  // Whole image decode consumed the input stream.
  drained: bool,
}

/// Session over the OpenJpeg engine.
#[cfg(feature = "openjpeg")]
pub type OpenJpegSession = CodecSession<OpenJpeg>;

#[cfg(feature = "openjpeg")]
impl CodecSession<OpenJpeg> {
  /// Session over the OpenJpeg engine, logging through the `log` crate.
  pub fn new() -> Self {
    Self::with_engine(OpenJpeg, default_sink())
  }
}

#[cfg(feature = "openjpeg")]
impl Default for CodecSession<OpenJpeg> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Engine> CodecSession<E> {
  pub fn with_engine(engine: E, sink: SharedSink) -> Self {
    Self {
      engine,
      sink,
      config: DecoderConfig::default(),
      path: None,
      format: None,
      res: Resources::new(),
      state: SessionState::NoStream,
      drained: false,
    }
  }

  /// Replace the configuration used by the next setup.
  pub fn with_config(mut self, config: DecoderConfig) -> Self {
    self.config = config;
    self
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn config(&self) -> &DecoderConfig {
    &self.config
  }

  /// Input file of the current stream.
  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  /// Codestream flavor picked at setup.
  pub fn codec_format(&self) -> Option<CodecFormat> {
    self.format
  }

  /// Tiling read from the main header, available once set up.
  pub fn codestream_info(&self) -> Option<&CodestreamInfo> {
    self.res.info.as_ref()
  }

  pub fn tile_count(&self) -> Option<u32> {
    self.codestream_info().map(|info| info.tile_count())
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  fn is_loaded(&self) -> bool {
    matches!(self.state, SessionState::StreamOpen | SessionState::Ready)
  }

  /// Open `path` for reading, tearing down any previous stream and decoder first.
  pub fn open_stream<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
    let path = path.as_ref();
    self.destroy();

    let stream = match self.engine.open_input(path) {
      Some(stream) => stream,
      None => {
        self.path = None;
        self.state = SessionState::NoStream;
        return Err(Error::StreamOpen {
          path: path.to_path_buf(),
        });
      }
    };
    log::debug!("opened input stream {}", path.display());
    self.res.stream = Some(stream);
    self.path = Some(path.to_path_buf());
    // Infile changed, decoder must be set up again.
    self.format = None;
    self.drained = false;
    self.state = SessionState::StreamOpen;
    Ok(())
  }

  /// Set up the decoder with `config` and read the main header.
  ///
  /// A session that is already set up re-opens its input first.
  pub fn setup_decoder(&mut self, config: DecoderConfig) -> Result<CodestreamInfo> {
    if !self.is_loaded() {
      return Err(Error::NotLoaded);
    }
    self.config = config;
    if self.state == SessionState::Ready {
      self.reopen()?;
    }
    self.setup()?;
    self.res.info.ok_or(Error::NotLoaded)
  }

  fn setup(&mut self) -> Result<()> {
    if let Err(err) = self.try_setup() {
      self.sink.error(&err.to_string());
      self.destroy();
      return Err(err);
    }
    self.state = SessionState::Ready;
    Ok(())
  }

  fn try_setup(&mut self) -> Result<()> {
    let path = self.path.clone().ok_or(Error::NotLoaded)?;
    let detection = format::sniff(&path)?;
    if let Some(mismatch) = detection.mismatch() {
      self.sink.warning(&format!("{}: {}", path.display(), mismatch));
    }
    let format = codec_format(detection.format).ok_or_else(|| Error::UnsupportedFormat {
      path: path.clone(),
      format: detection.format,
    })?;
    self.format = Some(format);

    let setup_err = |reason: &str| Error::DecoderSetup {
      path: path.clone(),
      reason: reason.to_string(),
    };
    let params = self.config.decode_params();
    let engine = &self.engine;
    let Resources {
      stream,
      info,
      codec,
      image,
    } = &mut self.res;
    let stream = stream.as_mut().ok_or(Error::NotLoaded)?;

    let codec = match engine.create_decoder(format, &self.sink) {
      Some(c) => codec.insert(c),
      None => return Err(setup_err("failed to create codec")),
    };
    if !engine.setup_decoder(codec, &params) {
      return Err(setup_err("failed to set up the decoder"));
    }

    // Read the main header of the codestream and if necessary the JP2 boxes.
    let image = match engine.read_header(codec, stream) {
      Some(i) => image.insert(i),
      None => return Err(Error::HeaderRead { path: path.clone() }),
    };

    if let Some(region) = &self.config.region {
      if !engine.set_decode_area(codec, image, region) {
        return Err(setup_err("failed to set the decode area"));
      }
    }

    let cstr_info = engine
      .codestream_info(codec)
      .ok_or_else(|| setup_err("failed to get codestream info"))?;
    self.sink.info(&format!(
      "The file contains {}x{} tiles",
      cstr_info.tw, cstr_info.th
    ));
    *info = Some(cstr_info);
    Ok(())
  }

  /// Re-open the current input keeping the configuration.
  fn reopen(&mut self) -> Result<()> {
    let path = self.path.clone().ok_or(Error::NotLoaded)?;
    self.open_stream(path)
  }

  /// Make sure the decoder is set up on an unconsumed stream.
  fn ensure_ready(&mut self) -> Result<()> {
    if !self.is_loaded() {
      return Err(Error::NotLoaded);
    }
    if self.drained {
      self.reopen()?;
    }
    if self.state == SessionState::StreamOpen {
      self.setup()?;
    }
    Ok(())
  }

  /// Reduce the number of resolution levels reconstructed by the next decode.
  ///
  /// Must be sequenced after setup and before decode, 0 is full resolution.
  pub fn set_resolution_factor(&mut self, level: u32) -> Result<()> {
    if self.drained {
      // Applied by the setup of the re-opened stream.
      self.config.resolution_level = level;
      return Ok(());
    }
    let codec = self.res.codec.as_mut().ok_or_else(|| Error::ResolutionSet {
      level,
      reason: "no decoder, set up the session first".into(),
    })?;
    if !self.engine.set_resolution_factor(codec, level) {
      let err = Error::ResolutionSet {
        level,
        reason: "rejected by the decoder".into(),
      };
      self.sink.error(&err.to_string());
      return Err(err);
    }
    self.config.resolution_level = level;
    Ok(())
  }

  fn current_path(&self) -> PathBuf {
    self.path.clone().unwrap_or_default()
  }

  fn fail(&mut self, err: Error) -> Error {
    self.sink.error(&err.to_string());
    self.destroy();
    err
  }

  fn with_component<T>(&self, f: impl FnOnce(ComponentView<'_>) -> T) -> Option<T> {
    let image = self.res.image.as_ref()?;
    self.engine.first_component(image).map(f)
  }

  fn run_decode(&mut self) -> Result<()> {
    if !self.config.capabilities.contains(Capabilities::WHOLE_IMAGE) {
      return Err(Error::CapabilityDisabled("whole image decode"));
    }
    self.ensure_ready()?;

    let decode_err = |path: PathBuf, reason: &str| Error::Decode {
      path,
      reason: reason.to_string(),
    };
    let engine = &self.engine;
    let res = &mut self.res;
    let status = match (&mut res.codec, &mut res.stream, &mut res.image) {
      (Some(codec), Some(stream), Some(image)) => {
        if !engine.decode(codec, stream, image) {
          Err("could not decode image")
        } else if !engine.end_decompress(codec, stream) {
          Err("could not end decompression")
        } else {
          Ok(())
        }
      }
      _ => Err("decoder is not set up"),
    };
    if let Err(reason) = status {
      let err = decode_err(self.current_path(), reason);
      return Err(self.fail(err));
    }
    self.drained = true;
    Ok(())
  }

  /// Decode the whole image and return its first component.
  pub fn decode_image(&mut self) -> Result<DecodedImage> {
    self.run_decode()?;
    match self.with_component(DecodedImage::from_view).flatten() {
      Some(image) => Ok(image),
      None => {
        let err = Error::Decode {
          path: self.current_path(),
          reason: MISSING_SAMPLES.into(),
        };
        Err(self.fail(err))
      }
    }
  }

  /// Decode the whole image into `buffer`, returning the width and height written.
  pub fn decode_image_into(&mut self, buffer: &mut [i32]) -> Result<(u32, u32)> {
    self.run_decode()?;
    self.copy_into(buffer)
  }

  fn run_decode_tile(&mut self, tile_index: u32) -> Result<()> {
    // Checked before touching the engine.
    if !self.is_loaded() {
      return Err(Error::NotLoaded);
    }
    if !self.config.capabilities.contains(Capabilities::TILES) {
      return Err(Error::CapabilityDisabled("tile decode"));
    }
    self.ensure_ready()?;

    let in_grid = self
      .tile_count()
      .map_or(false, |count| tile_index < count);
    let engine = &self.engine;
    let res = &mut self.res;
    let ok = in_grid
      && match (&mut res.codec, &mut res.stream, &mut res.image) {
        (Some(codec), Some(stream), Some(image)) => {
          engine.decode_tile(codec, stream, image, tile_index)
        }
        _ => false,
      };
    if !ok {
      let err = Error::TileDecode {
        path: self.current_path(),
        tile: tile_index,
      };
      return Err(self.fail(err));
    }
    Ok(())
  }

  /// Decode one tile, `tile_index` counts tiles in raster order over the codestream grid.
  pub fn decode_tile(&mut self, tile_index: u32) -> Result<DecodedImage> {
    self.run_decode_tile(tile_index)?;
    match self.with_component(DecodedImage::from_view).flatten() {
      Some(image) => Ok(image),
      None => {
        let err = Error::Decode {
          path: self.current_path(),
          reason: format!("tile {}: {}", tile_index, MISSING_SAMPLES),
        };
        Err(self.fail(err))
      }
    }
  }

  /// Decode one tile into `buffer`, returning the width and height written.
  pub fn decode_tile_into(&mut self, tile_index: u32, buffer: &mut [i32]) -> Result<(u32, u32)> {
    self.run_decode_tile(tile_index)?;
    self.copy_into(buffer)
  }

  fn copy_into(&mut self, buffer: &mut [i32]) -> Result<(u32, u32)> {
    let copied = self.with_component(|view| {
      let len = view.width as usize * view.height as usize;
      let data = view.data.get(..len)?;
      let dst = match buffer.get_mut(..len) {
        Some(dst) => dst,
        None => {
          return Some(Err(Error::InvalidSampleBuffer {
            expected: len,
            actual: buffer.len(),
          }))
        }
      };
      dst.copy_from_slice(data);
      Some(Ok((view.width, view.height)))
    });
    match copied.flatten() {
      Some(result) => result,
      None => {
        let err = Error::Decode {
          path: self.current_path(),
          reason: MISSING_SAMPLES.into(),
        };
        Err(self.fail(err))
      }
    }
  }

  /// Release the stream, codestream info, decoder and image. Safe to call repeatedly.
  pub fn destroy(&mut self) {
    if !self.res.is_empty() {
      log::debug!("destroying session resources");
    }
    self.res.release();
    self.drained = false;
    if self.state != SessionState::NoStream {
      self.state = SessionState::Destroyed;
    }
  }
}

impl<E: Engine> Drop for CodecSession<E> {
  fn drop(&mut self) {
    self.destroy();
  }
}

/// Decode the whole image of `path` with the OpenJpeg engine.
#[cfg(feature = "openjpeg")]
pub fn decode_file<P: AsRef<Path>>(path: P, config: DecoderConfig) -> Result<DecodedImage> {
  let mut session = CodecSession::new().with_config(config);
  session.open_stream(path)?;
  session.decode_image()
}
