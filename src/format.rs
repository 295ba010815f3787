//! Container format detection.
//!
//! A file is classified twice: by the extension of its name and by the magic bytes at
//! the head of the file. When both are known and disagree the magic bytes win and the
//! mismatch is reported as a warning.
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Magic bytes for JP2 RFC3745.
pub const JP2_RFC3745_MAGIC: &[u8] = &[
  0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d, 0x0a, 0x87, 0x0a,
];
pub const JP2_MAGIC: &[u8] = &[0x0d, 0x0a, 0x87, 0x0a];
/// Magic bytes for J2K Codestream.
pub const J2K_CODESTREAM_MAGIC: &[u8] = &[0xff, 0x4f, 0xff, 0x51];

/// Number of bytes read from the head of a file.
pub const MAGIC_LEN: usize = 12;

/// File formats known to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
  Codestream,
  Jp2Container,
  Jpip,
  Pgx,
  Pnm,
  Bmp,
  Tiff,
  Raw,
  Tga,
  Png,
  Unknown,
}

impl FormatTag {
  /// Jpeg 2000 flavors a decoder can be created for.
  pub fn is_jpeg2000(self) -> bool {
    matches!(self, Self::Codestream | Self::Jp2Container | Self::Jpip)
  }

  /// Extension(s) a file of this format is expected to carry.
  pub fn expected_extension(self) -> &'static str {
    match self {
      Self::Codestream => ".j2k or .jpc or .j2c",
      Self::Jp2Container => ".jp2",
      Self::Jpip => ".jpt",
      Self::Pgx => ".pgx",
      Self::Pnm => ".pnm or .pgm or .ppm",
      Self::Bmp => ".bmp",
      Self::Tiff => ".tif",
      Self::Raw => ".raw",
      Self::Tga => ".tga",
      Self::Png => ".png",
      Self::Unknown => "<unknown>",
    }
  }
}

const EXTENSIONS: &[(&str, FormatTag)] = &[
  ("pgx", FormatTag::Pgx),
  ("pnm", FormatTag::Pnm),
  ("pgm", FormatTag::Pnm),
  ("ppm", FormatTag::Pnm),
  ("bmp", FormatTag::Bmp),
  ("tif", FormatTag::Tiff),
  ("raw", FormatTag::Raw),
  ("tga", FormatTag::Tga),
  ("png", FormatTag::Png),
  ("j2k", FormatTag::Codestream),
  ("jp2", FormatTag::Jp2Container),
  ("jpt", FormatTag::Jpip),
  ("j2c", FormatTag::Codestream),
  ("jpc", FormatTag::Codestream),
];

/// Classify a file name by its extension.
///
/// Only the first three characters after the last '.' are compared, case-sensitively,
/// so `image.tiff` is a TIFF file but `image.JP2` is unknown.
pub fn format_from_extension<P: AsRef<Path>>(path: P) -> Option<FormatTag> {
  let ext = path.as_ref().extension()?.to_str()?;
  EXTENSIONS
    .iter()
    .find(|(e, _)| ext.starts_with(e))
    .map(|(_, format)| *format)
}

/// Classify the head of a file by its magic bytes.
pub fn format_from_magic(buf: &[u8]) -> Option<FormatTag> {
  if buf.starts_with(JP2_RFC3745_MAGIC) || buf.starts_with(JP2_MAGIC) {
    Some(FormatTag::Jp2Container)
  } else if buf.starts_with(J2K_CODESTREAM_MAGIC) {
    Some(FormatTag::Codestream)
  } else {
    None
  }
}

/// Extension and magic bytes disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatMismatch {
  /// Trailing characters of the file name, as found.
  pub found: String,
  /// Extension(s) matching the magic bytes.
  pub expected: &'static str,
}

impl std::fmt::Display for FormatMismatch {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(
      f,
      "Extension of file is incorrect! Found {} should be {}",
      self.found, self.expected
    )
  }
}

/// Result of sniffing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
  pub path: PathBuf,
  /// Resolved format.
  pub format: FormatTag,
  /// Format implied by the file name alone.
  pub extension_format: Option<FormatTag>,
}

impl Detection {
  /// Returns the extension mismatch, if the magic bytes overruled the file name.
  pub fn mismatch(&self) -> Option<FormatMismatch> {
    if self.extension_format == Some(self.format) {
      return None;
    }
    let name = self.path.to_string_lossy();
    let found = name
      .char_indices()
      .rev()
      .nth(3)
      .map(|(idx, _)| name[idx..].to_string())
      .unwrap_or_else(|| name.to_string());
    Some(FormatMismatch {
      found,
      expected: self.format.expected_extension(),
    })
  }
}

/// Sniff a file without logging.
///
/// Fails with `InvalidFormat` when the file can't be read, is shorter than
/// `MAGIC_LEN` bytes, or neither its name nor its head are recognized.
pub fn sniff<P: AsRef<Path>>(path: P) -> Result<Detection> {
  let path = path.as_ref();
  let invalid = |reason: String| Error::InvalidFormat {
    path: path.to_path_buf(),
    reason,
  };

  let mut buf = [0u8; MAGIC_LEN];
  let mut file = File::open(path).map_err(|e| invalid(e.to_string()))?;
  file
    .read_exact(&mut buf)
    .map_err(|_| invalid(format!("file is shorter than {} bytes", MAGIC_LEN)))?;

  let extension_format = format_from_extension(path);
  // JPIP streams carry no signature, the extension is trusted.
  if extension_format == Some(FormatTag::Jpip) {
    return Ok(Detection {
      path: path.to_path_buf(),
      format: FormatTag::Jpip,
      extension_format,
    });
  }

  let format = match (format_from_magic(&buf), extension_format) {
    (Some(magic), _) => magic,
    (None, Some(ext)) => ext,
    (None, None) => return Err(invalid("unrecognized signature and extension".into())),
  };

  Ok(Detection {
    path: path.to_path_buf(),
    format,
    extension_format,
  })
}

/// Detect the format of a file, logging a warning when the extension is wrong.
pub fn detect<P: AsRef<Path>>(path: P) -> Result<FormatTag> {
  let detection = sniff(path)?;
  if let Some(mismatch) = detection.mismatch() {
    log::warn!("{}: {}", detection.path.display(), mismatch);
  }
  Ok(detection.format)
}
