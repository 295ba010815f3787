//! # Jpeg 2000 codec sessions
//!
//! Tile granular and whole image decoding, tiled encoding and format detection for
//! `.jp2`, `.j2k`/`.jpc`/`.j2c` and `.jpt` streams. The bitstream work is done by a
//! codec engine (by default the `openjp2` crate) driven through the `Engine` trait.
//!
//! ```no_run
//! use j2kcodec::*;
//!
//! let mut session = CodecSession::new();
//! session.open_stream("image.jp2")?;
//! session.setup_decoder(DecoderConfig::new())?;
//! session.set_resolution_factor(2)?;
//! let tile = session.decode_tile(0)?;
//! println!("tile 0: {}x{}", tile.width, tile.height);
//! # Ok::<(), j2kcodec::Error>(())
//! ```

pub mod config;
pub mod encode;
pub mod engine;
pub mod error;
pub mod event;
pub mod format;
pub mod metadata;
pub mod session;

#[cfg(feature = "openjpeg")]
pub mod openjpeg;

pub use config::{Capabilities, DecoderConfig, EncoderConfig, ALL_THREADS};
pub use encode::{output_format, TileEncoder, TileLayout};
pub use engine::{CodecFormat, CodestreamInfo, Engine, Region};
pub use error::{Error, Result};
pub use event::{EventSink, LogSink, NullSink, SharedSink};
pub use format::{detect, sniff, Detection, FormatTag};
pub use metadata::{fetch_xml_data, xml_boxes};
pub use session::{CodecSession, DecodedImage, SessionState};

#[cfg(feature = "openjpeg")]
pub use encode::encode_as_tiles;
#[cfg(feature = "openjpeg")]
pub use openjpeg::OpenJpeg;
#[cfg(feature = "openjpeg")]
pub use session::{decode_file, OpenJpegSession};
