//! Codec engine backed by the `openjp2` crate.
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::Path;

use openjp2::{openjpeg::*, opj_image, opj_image_comptparm, Codec, Stream};

use crate::engine::*;
use crate::event::SharedSink;

/// Buffer size of file streams.
const STREAM_BUFFER_SIZE: usize = 1_000_000;

/// The OpenJpeg engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenJpeg;

/// A codec handle bound to the sink its messages are routed to.
pub struct OpenJpegCodec {
  codec: Codec,
  // Pointed to by the codec's message handlers, must outlive `codec`.
  _sink: Box<SharedSink>,
}

fn message(msg: *const c_char) -> String {
  if msg.is_null() {
    return String::new();
  }
  unsafe { CStr::from_ptr(msg).to_string_lossy().into_owned() }
}

fn with_sink(data: *mut c_void, f: impl FnOnce(&SharedSink)) {
  if let Some(sink) = unsafe { (data as *const SharedSink).as_ref() } {
    f(sink);
  }
}

extern "C" fn info_callback(msg: *const c_char, data: *mut c_void) {
  with_sink(data, |sink| sink.info(&message(msg)));
}

extern "C" fn warning_callback(msg: *const c_char, data: *mut c_void) {
  with_sink(data, |sink| sink.warning(&message(msg)));
}

extern "C" fn error_callback(msg: *const c_char, data: *mut c_void) {
  with_sink(data, |sink| sink.error(&message(msg)));
}

impl OpenJpegCodec {
  fn bind(mut codec: Codec, sink: &SharedSink) -> Self {
    let sink = Box::new(sink.clone());
    let data = &*sink as *const SharedSink as *mut c_void;
    codec.set_info_handler(Some(info_callback), data);
    codec.set_warning_handler(Some(warning_callback), data);
    codec.set_error_handler(Some(error_callback), data);
    Self { codec, _sink: sink }
  }
}

fn codec_format(format: CodecFormat) -> OPJ_CODEC_FORMAT {
  match format {
    CodecFormat::J2K => OPJ_CODEC_J2K,
    CodecFormat::JP2 => OPJ_CODEC_JP2,
    CodecFormat::JPT => OPJ_CODEC_JPT,
  }
}

fn prog_order(order: ProgressionOrder) -> OPJ_PROG_ORDER {
  match order {
    ProgressionOrder::LRCP => OPJ_LRCP,
    ProgressionOrder::RLCP => OPJ_RLCP,
    ProgressionOrder::RPCL => OPJ_RPCL,
    ProgressionOrder::PCRL => OPJ_PCRL,
    ProgressionOrder::CPRL => OPJ_CPRL,
  }
}

impl Engine for OpenJpeg {
  type Codec = OpenJpegCodec;
  type Stream = Stream;
  type Image = Box<opj_image>;

  fn create_decoder(&self, format: CodecFormat, sink: &SharedSink) -> Option<Self::Codec> {
    let codec = Codec::new_decoder(codec_format(format))?;
    Some(OpenJpegCodec::bind(codec, sink))
  }

  fn setup_decoder(&self, codec: &mut Self::Codec, params: &DecodeParams) -> bool {
    let mut d_params = opj_dparameters_t::default();
    d_params.cp_reduce = params.reduce;
    d_params.cp_layer = params.layers;
    if let Some(threads) = params.threads {
      // TODO: forward once the Rust port exposes opj_codec_set_threads.
      log::debug!("OpenJpeg decodes single threaded, ignoring hint of {} threads", threads);
    }
    codec.codec.setup_decoder(&mut d_params) != 0
  }

  fn open_input(&self, path: &Path) -> Option<Self::Stream> {
    Stream::new_file(path, STREAM_BUFFER_SIZE, true)
      .map_err(|e| log::debug!("open input {}: {:?}", path.display(), e))
      .ok()
  }

  fn read_header(
    &self,
    codec: &mut Self::Codec,
    stream: &mut Self::Stream,
  ) -> Option<Self::Image> {
    codec.codec.read_header(stream)
  }

  fn set_decode_area(
    &self,
    codec: &mut Self::Codec,
    image: &mut Self::Image,
    region: &Region,
  ) -> bool {
    codec.codec.set_decode_area(
      image,
      region.x0 as i32,
      region.y0 as i32,
      region.x1 as i32,
      region.y1 as i32,
    ) != 0
  }

  fn codestream_info(&self, codec: &mut Self::Codec) -> Option<CodestreamInfo> {
    let mut cstr_info = codec.codec.get_cstr_info();
    if cstr_info.is_null() {
      return None;
    }
    unsafe {
      let info = CodestreamInfo {
        tx0: (*cstr_info).tx0,
        ty0: (*cstr_info).ty0,
        tdx: (*cstr_info).tdx,
        tdy: (*cstr_info).tdy,
        tw: (*cstr_info).tw,
        th: (*cstr_info).th,
        numcomps: (*cstr_info).nbcomps,
      };
      opj_destroy_cstr_info(&mut cstr_info);
      Some(info)
    }
  }

  fn set_resolution_factor(&self, codec: &mut Self::Codec, factor: u32) -> bool {
    codec.codec.set_decoded_resolution_factor(factor) != 0
  }

  fn decode(
    &self,
    codec: &mut Self::Codec,
    stream: &mut Self::Stream,
    image: &mut Self::Image,
  ) -> bool {
    codec.codec.decode(stream, image) != 0
  }

  fn end_decompress(&self, codec: &mut Self::Codec, stream: &mut Self::Stream) -> bool {
    codec.codec.end_decompress(stream) != 0
  }

  fn decode_tile(
    &self,
    codec: &mut Self::Codec,
    stream: &mut Self::Stream,
    image: &mut Self::Image,
    tile_index: u32,
  ) -> bool {
    codec.codec.get_decoded_tile(stream, image, tile_index) != 0
  }

  fn first_component<'a>(&self, image: &'a Self::Image) -> Option<ComponentView<'a>> {
    let comp = image.comps()?.first()?;
    Some(ComponentView {
      width: comp.w,
      height: comp.h,
      precision: comp.prec,
      signed: comp.sgnd != 0,
      components: image.numcomps,
      data: comp.data()?,
    })
  }

  fn create_encoder(&self, format: CodecFormat, sink: &SharedSink) -> Option<Self::Codec> {
    let codec = Codec::new_encoder(codec_format(format))?;
    Some(OpenJpegCodec::bind(codec, sink))
  }

  fn create_tile_image(
    &self,
    comps: &[ComponentParams],
    color_space: ColorSpace,
    width: u32,
    height: u32,
  ) -> Option<Self::Image> {
    let params = comps
      .iter()
      .map(|comp| {
        let mut param = opj_image_comptparm::default();
        param.dx = comp.dx;
        param.dy = comp.dy;
        param.w = comp.w;
        param.h = comp.h;
        param.x0 = comp.x0;
        param.y0 = comp.y0;
        param.prec = comp.prec;
        param.sgnd = comp.sgnd as u32;
        param
      })
      .collect::<Vec<_>>();
    let clrspc = match color_space {
      ColorSpace::Gray => OPJ_CLRSPC_GRAY,
      ColorSpace::SRGB => OPJ_CLRSPC_SRGB,
    };
    let mut image = opj_image::tile_create(&params, clrspc)?;
    image.x0 = 0;
    image.y0 = 0;
    image.x1 = width;
    image.y1 = height;
    image.color_space = clrspc;
    Some(image)
  }

  fn setup_encoder(
    &self,
    codec: &mut Self::Codec,
    params: &EncodeParams,
    image: &mut Self::Image,
  ) -> bool {
    let mut c_params = opj_cparameters_t::default();
    c_params.tcp_numlayers = params.layers as i32;
    c_params.cp_fixed_quality = params.fixed_quality as i32;
    if let Some(ratio) = params.distortion_ratio {
      c_params.tcp_distoratio[0] = ratio;
    }
    c_params.irreversible = params.irreversible as i32;
    c_params.numresolution = params.resolutions as i32;
    c_params.prog_order = prog_order(params.progression);
    c_params.tile_size_on = 1;
    c_params.cp_tx0 = params.tile_origin.0 as i32;
    c_params.cp_ty0 = params.tile_origin.1 as i32;
    c_params.cp_tdx = params.tile_size.0 as i32;
    c_params.cp_tdy = params.tile_size.1 as i32;
    codec.codec.setup_encoder(&mut c_params, image) != 0
  }

  fn open_output(&self, path: &Path) -> Option<Self::Stream> {
    Stream::new_file(path, STREAM_BUFFER_SIZE, false)
      .map_err(|e| log::debug!("open output {}: {:?}", path.display(), e))
      .ok()
  }

  fn start_compress(
    &self,
    codec: &mut Self::Codec,
    image: &mut Self::Image,
    stream: &mut Self::Stream,
  ) -> bool {
    codec.codec.start_compress(image, stream) != 0
  }

  fn write_tile(
    &self,
    codec: &mut Self::Codec,
    tile_index: u32,
    data: &[u8],
    stream: &mut Self::Stream,
  ) -> bool {
    codec.codec.write_tile(tile_index, data, stream) != 0
  }

  fn end_compress(&self, codec: &mut Self::Codec, stream: &mut Self::Stream) -> bool {
    codec.codec.end_compress(stream) != 0
  }
}
