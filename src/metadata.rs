//! XML metadata boxes of JP2 containers.
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::format::{self, FormatTag};

pub const XML_BOX: [u8; 4] = *b"xml ";

/// Header of one top-level box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
  pub box_type: [u8; 4],
  /// File offset of the box.
  pub offset: u64,
  /// Length of the box including its header.
  pub length: u64,
  pub header_len: u64,
}

impl BoxHeader {
  pub fn payload_len(&self) -> u64 {
    self.length - self.header_len
  }
}

/// Walks the top-level boxes of a JP2 file.
pub struct BoxReader<R> {
  reader: R,
  offset: u64,
  end: u64,
}

impl<R: Read + Seek> BoxReader<R> {
  pub fn new(mut reader: R) -> Result<Self> {
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(Self {
      reader,
      offset: 0,
      end,
    })
  }

  /// Read the next box header, `None` at the end of the file.
  ///
  /// Leaves the reader at the start of the box payload.
  pub fn next_box(&mut self) -> Result<Option<BoxHeader>> {
    match self.offset.checked_add(8) {
      Some(header_end) if header_end <= self.end => {}
      _ => return Ok(None),
    }
    self.reader.seek(SeekFrom::Start(self.offset))?;
    let lbox = self.reader.read_u32::<BigEndian>()? as u64;
    let mut box_type = [0u8; 4];
    self.reader.read_exact(&mut box_type)?;
    let (length, header_len) = match lbox {
      // Box extends to the end of the file.
      0 => (self.end - self.offset, 8),
      1 => match self.reader.read_u64::<BigEndian>() {
        Ok(length) => (length, 16),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
          return Err(self.invalid_length(&box_type, "truncated extended length"));
        }
        Err(e) => return Err(e.into()),
      },
      n => (n, 8),
    };
    let fits = self
      .offset
      .checked_add(length)
      .map_or(false, |box_end| box_end <= self.end);
    if length < header_len || !fits {
      return Err(self.invalid_length(&box_type, &format!("invalid length {}", length)));
    }
    let header = BoxHeader {
      box_type,
      offset: self.offset,
      length,
      header_len,
    };
    self.offset += length;
    Ok(Some(header))
  }

  fn invalid_length(&self, box_type: &[u8; 4], reason: &str) -> Error {
    Error::Io(io::Error::new(
      io::ErrorKind::InvalidData,
      format!(
        "box {:?} at offset {} has {}",
        String::from_utf8_lossy(box_type),
        self.offset,
        reason
      ),
    ))
  }

  /// Read the payload of the box returned by the last `next_box`.
  pub fn read_payload(&mut self, header: &BoxHeader) -> Result<Vec<u8>> {
    self
      .reader
      .seek(SeekFrom::Start(header.offset + header.header_len))?;
    let mut payload = vec![0u8; header.payload_len() as usize];
    self.reader.read_exact(&mut payload)?;
    Ok(payload)
  }
}

fn open_jp2(path: &Path) -> Result<BoxReader<BufReader<File>>> {
  let detection = format::sniff(path)?;
  if detection.format != FormatTag::Jp2Container {
    return Err(Error::InvalidFormat {
      path: path.to_path_buf(),
      reason: format!(
        "XML boxes only exist in JP2 containers, found {:?}",
        detection.format
      ),
    });
  }
  BoxReader::new(BufReader::new(File::open(path)?))
}

fn invalid_box(path: &Path, err: Error) -> Error {
  match err {
    Error::Io(e) if e.kind() == io::ErrorKind::InvalidData => Error::InvalidFormat {
      path: path.to_path_buf(),
      reason: e.to_string(),
    },
    err => err,
  }
}

/// Payloads of every `xml ` box, in file order.
pub fn xml_boxes<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<u8>>> {
  let path = path.as_ref();
  let mut boxes = open_jp2(path)?;
  let mut payloads = Vec::new();
  while let Some(header) = boxes.next_box().map_err(|e| invalid_box(path, e))? {
    if header.box_type == XML_BOX {
      payloads.push(boxes.read_payload(&header)?);
    }
  }
  Ok(payloads)
}

/// Raw bytes of the first XML box of a JP2 file.
pub fn fetch_xml_data<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
  let path = path.as_ref();
  let mut boxes = open_jp2(path)?;
  while let Some(header) = boxes.next_box().map_err(|e| invalid_box(path, e))? {
    if header.box_type == XML_BOX {
      return boxes.read_payload(&header);
    }
  }
  Err(Error::MetadataNotFound {
    path: path.to_path_buf(),
  })
}
