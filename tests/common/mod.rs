//! Common test utilities for integration tests
#![allow(dead_code)]
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use j2kcodec::engine::*;
use j2kcodec::event::{EventSink, SharedSink};

/// Calls made against the mock engine and the handles still alive.
#[derive(Debug, Default)]
pub struct Journal {
  pub calls: Vec<String>,
  pub live: BTreeMap<&'static str, i64>,
  pub released: Vec<&'static str>,
  pub tiles: Vec<(u32, Vec<u8>)>,
  pub last_decode_params: Option<DecodeParams>,
  pub last_encode_params: Option<EncodeParams>,
  pub last_components: Vec<ComponentParams>,
}

impl Journal {
  pub fn live_handles(&self) -> i64 {
    self.live.values().sum()
  }

  pub fn called(&self, name: &str) -> usize {
    self.calls.iter().filter(|c| c.as_str() == name).count()
  }
}

/// Behavior of the mock engine.
#[derive(Debug, Clone)]
pub struct Script {
  /// Operations that report failure.
  pub fail: HashSet<&'static str>,
  pub image_size: (u32, u32),
  pub tile_size: (u32, u32),
  pub fail_tile_write: Option<u32>,
  /// Hand out one sample less than the component extent.
  pub short_samples: bool,
}

impl Default for Script {
  fn default() -> Self {
    Self {
      fail: HashSet::new(),
      image_size: (64, 32),
      tile_size: (16, 16),
      fail_tile_write: None,
      short_samples: false,
    }
  }
}

struct Handle {
  kind: &'static str,
  journal: Rc<RefCell<Journal>>,
}

impl Handle {
  fn new(kind: &'static str, journal: &Rc<RefCell<Journal>>) -> Self {
    *journal.borrow_mut().live.entry(kind).or_insert(0) += 1;
    Self {
      kind,
      journal: journal.clone(),
    }
  }
}

impl Drop for Handle {
  fn drop(&mut self) {
    let mut journal = self.journal.borrow_mut();
    *journal.live.entry(self.kind).or_insert(0) -= 1;
    journal.released.push(self.kind);
  }
}

pub struct MockCodec {
  _handle: Handle,
  reduce: u32,
}

pub struct MockStream {
  _handle: Handle,
  consumed: bool,
}

pub struct MockImage {
  _handle: Handle,
  width: u32,
  height: u32,
  components: u32,
  data: Vec<i32>,
}

#[derive(Clone, Default)]
pub struct MockEngine {
  pub journal: Rc<RefCell<Journal>>,
  pub script: Rc<RefCell<Script>>,
}

impl MockEngine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing(ops: &[&'static str]) -> Self {
    let engine = Self::new();
    engine.script.borrow_mut().fail.extend(ops.iter().copied());
    engine
  }

  pub fn set_fail(&self, ops: &[&'static str]) {
    let mut script = self.script.borrow_mut();
    script.fail.clear();
    script.fail.extend(ops.iter().copied());
  }

  fn call(&self, name: &'static str) -> bool {
    self.journal.borrow_mut().calls.push(name.to_string());
    !self.script.borrow().fail.contains(name)
  }

  fn grid(&self) -> (u32, u32) {
    let script = self.script.borrow();
    let (w, h) = script.image_size;
    let (tw, th) = script.tile_size;
    ((w + tw - 1) / tw, (h + th - 1) / th)
  }

  fn handle(&self, kind: &'static str) -> Handle {
    Handle::new(kind, &self.journal)
  }
}

fn reduced(size: u32, reduce: u32) -> u32 {
  (size + (1 << reduce) - 1) >> reduce
}

impl Engine for MockEngine {
  type Codec = MockCodec;
  type Stream = MockStream;
  type Image = MockImage;

  fn create_decoder(&self, _format: CodecFormat, _sink: &SharedSink) -> Option<MockCodec> {
    if !self.call("create_decoder") {
      return None;
    }
    Some(MockCodec {
      _handle: self.handle("codec"),
      reduce: 0,
    })
  }

  fn setup_decoder(&self, codec: &mut MockCodec, params: &DecodeParams) -> bool {
    self.journal.borrow_mut().last_decode_params = Some(*params);
    codec.reduce = params.reduce;
    self.call("setup_decoder")
  }

  fn open_input(&self, path: &Path) -> Option<MockStream> {
    if !self.call("open_input") || !path.is_file() {
      return None;
    }
    Some(MockStream {
      _handle: self.handle("stream"),
      consumed: false,
    })
  }

  fn read_header(&self, _codec: &mut MockCodec, _stream: &mut MockStream) -> Option<MockImage> {
    if !self.call("read_header") {
      return None;
    }
    let (width, height) = self.script.borrow().image_size;
    Some(MockImage {
      _handle: self.handle("image"),
      width,
      height,
      components: 1,
      data: Vec::new(),
    })
  }

  fn set_decode_area(&self, _codec: &mut MockCodec, image: &mut MockImage, region: &Region) -> bool {
    image.width = region.x1 - region.x0;
    image.height = region.y1 - region.y0;
    self.call("set_decode_area")
  }

  fn codestream_info(&self, _codec: &mut MockCodec) -> Option<CodestreamInfo> {
    if !self.call("codestream_info") {
      return None;
    }
    let (tw, th) = self.grid();
    let (tdx, tdy) = self.script.borrow().tile_size;
    Some(CodestreamInfo {
      tx0: 0,
      ty0: 0,
      tdx,
      tdy,
      tw,
      th,
      numcomps: 1,
    })
  }

  fn set_resolution_factor(&self, codec: &mut MockCodec, factor: u32) -> bool {
    codec.reduce = factor;
    self.call("set_resolution_factor")
  }

  fn decode(&self, codec: &mut MockCodec, stream: &mut MockStream, image: &mut MockImage) -> bool {
    if !self.call("decode") || stream.consumed {
      return false;
    }
    let (w, h) = self.script.borrow().image_size;
    image.width = reduced(w, codec.reduce);
    image.height = reduced(h, codec.reduce);
    image.data = (0..image.width * image.height).map(|i| i as i32).collect();
    true
  }

  fn end_decompress(&self, _codec: &mut MockCodec, stream: &mut MockStream) -> bool {
    stream.consumed = true;
    self.call("end_decompress")
  }

  fn decode_tile(
    &self,
    codec: &mut MockCodec,
    _stream: &mut MockStream,
    image: &mut MockImage,
    tile_index: u32,
  ) -> bool {
    let (tw, th) = self.grid();
    if !self.call("decode_tile") || tile_index >= tw * th {
      return false;
    }
    let (tdx, tdy) = self.script.borrow().tile_size;
    image.width = reduced(tdx, codec.reduce);
    image.height = reduced(tdy, codec.reduce);
    image.data = (0..image.width * image.height)
      .map(|i| (tile_index * 10_000 + i) as i32)
      .collect();
    true
  }

  fn first_component<'a>(&self, image: &'a MockImage) -> Option<ComponentView<'a>> {
    if image.data.is_empty() {
      return None;
    }
    Some(ComponentView {
      width: image.width,
      height: image.height,
      precision: 8,
      signed: false,
      components: image.components,
      data: if self.script.borrow().short_samples {
        &image.data[..image.data.len() - 1]
      } else {
        &image.data
      },
    })
  }

  fn create_encoder(&self, _format: CodecFormat, _sink: &SharedSink) -> Option<MockCodec> {
    if !self.call("create_encoder") {
      return None;
    }
    Some(MockCodec {
      _handle: self.handle("codec"),
      reduce: 0,
    })
  }

  fn create_tile_image(
    &self,
    comps: &[ComponentParams],
    _color_space: ColorSpace,
    width: u32,
    height: u32,
  ) -> Option<MockImage> {
    self.journal.borrow_mut().last_components = comps.to_vec();
    if !self.call("create_tile_image") {
      return None;
    }
    Some(MockImage {
      _handle: self.handle("image"),
      width,
      height,
      components: comps.len() as u32,
      data: Vec::new(),
    })
  }

  fn setup_encoder(&self, _codec: &mut MockCodec, params: &EncodeParams, _image: &mut MockImage) -> bool {
    self.journal.borrow_mut().last_encode_params = Some(*params);
    self.call("setup_encoder")
  }

  fn open_output(&self, _path: &Path) -> Option<MockStream> {
    if !self.call("open_output") {
      return None;
    }
    Some(MockStream {
      _handle: self.handle("stream"),
      consumed: false,
    })
  }

  fn start_compress(&self, _codec: &mut MockCodec, _image: &mut MockImage, _stream: &mut MockStream) -> bool {
    self.call("start_compress")
  }

  fn write_tile(&self, _codec: &mut MockCodec, tile_index: u32, data: &[u8], _stream: &mut MockStream) -> bool {
    if !self.call("write_tile") || self.script.borrow().fail_tile_write == Some(tile_index) {
      return false;
    }
    self.journal.borrow_mut().tiles.push((tile_index, data.to_vec()));
    true
  }

  fn end_compress(&self, _codec: &mut MockCodec, _stream: &mut MockStream) -> bool {
    self.call("end_compress")
  }
}

/// Sink keeping every message, prefixed with its level.
#[derive(Default)]
pub struct RecordingSink {
  pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
  pub fn warnings(&self) -> Vec<String> {
    self
      .messages
      .lock()
      .unwrap()
      .iter()
      .filter(|m| m.starts_with("[WARNING]"))
      .cloned()
      .collect()
  }
}

impl EventSink for RecordingSink {
  fn info(&self, msg: &str) {
    self.messages.lock().unwrap().push(format!("[INFO] {}", msg));
  }

  fn warning(&self, msg: &str) {
    self.messages.lock().unwrap().push(format!("[WARNING] {}", msg));
  }

  fn error(&self, msg: &str) {
    self.messages.lock().unwrap().push(format!("[ERROR] {}", msg));
  }
}

pub fn recording_sink() -> (Arc<RecordingSink>, SharedSink) {
  let sink = Arc::new(RecordingSink::default());
  let shared: SharedSink = sink.clone();
  (sink, shared)
}

/// Get temporary output directory for tests
pub fn get_temp_dir() -> PathBuf {
  let temp = env::temp_dir().join("j2kcodec_tests");
  std::fs::create_dir_all(&temp).unwrap();
  temp
}

pub const J2K_HEAD: &[u8] = &[0xff, 0x4f, 0xff, 0x51, 0x00, 0x2f, 0, 0, 0, 0, 0, 0];

/// Write a file starting with `head`, padded to 64 bytes.
pub fn write_stub(name: &str, head: &[u8]) -> PathBuf {
  let path = get_temp_dir().join(name);
  let mut data = head.to_vec();
  data.resize(64, 0);
  std::fs::write(&path, data).unwrap();
  path
}
