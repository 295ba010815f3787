//! Format detection on files written to disk.
mod common;

use common::*;
use j2kcodec::format::JP2_MAGIC;
use j2kcodec::*;

#[test]
fn short_file_is_invalid() {
  let path = get_temp_dir().join("short_head.j2k");
  std::fs::write(&path, &J2K_HEAD[..4]).unwrap();
  assert!(matches!(sniff(&path), Err(Error::InvalidFormat { .. })));
  assert!(matches!(detect(&path), Err(Error::InvalidFormat { .. })));
}

#[test]
fn missing_file_is_invalid() {
  let path = get_temp_dir().join("no_such_image.jp2");
  assert!(matches!(sniff(&path), Err(Error::InvalidFormat { .. })));
  assert!(matches!(detect(&path), Err(Error::InvalidFormat { .. })));
}

#[test]
fn unknown_signature_and_extension() {
  let path = write_stub("unknown_format.xyz", &[0u8; 12]);
  match sniff(&path) {
    Err(Error::InvalidFormat { path: reported, .. }) => assert_eq!(reported, path),
    other => panic!("expected InvalidFormat, got {:?}", other),
  }
}

#[test]
fn jpip_trusts_extension() {
  let path = write_stub("stream_with_j2k_head.jpt", J2K_HEAD);
  let detection = sniff(&path).unwrap();
  assert_eq!(detection.format, FormatTag::Jpip);
  assert_eq!(detection.mismatch(), None);
  assert_eq!(detect(&path).unwrap(), FormatTag::Jpip);
}

#[test]
fn jp2_four_byte_signature() {
  let path = write_stub("short_signature.jp2", JP2_MAGIC);
  let detection = sniff(&path).unwrap();
  assert_eq!(detection.format, FormatTag::Jp2Container);
  assert_eq!(detection.extension_format, Some(FormatTag::Jp2Container));
  assert_eq!(detection.mismatch(), None);
}

#[test]
fn signature_overrules_unknown_extension() {
  let path = write_stub("codestream.dat", J2K_HEAD);
  let detection = sniff(&path).unwrap();
  assert_eq!(detection.format, FormatTag::Codestream);
  assert_eq!(detection.extension_format, None);
  let mismatch = detection.mismatch().unwrap();
  assert_eq!(mismatch.found, ".dat");
  assert_eq!(mismatch.expected, ".j2k or .jpc or .j2c");
  assert_eq!(detect(&path).unwrap(), FormatTag::Codestream);
}

#[test]
fn jpip_session_uses_jpt_decoder() {
  let engine = MockEngine::new();
  let mut session = CodecSession::with_engine(engine.clone(), std::sync::Arc::new(NullSink));
  session
    .open_stream(write_stub("session_stream.jpt", J2K_HEAD))
    .unwrap();
  session.setup_decoder(DecoderConfig::new()).unwrap();
  assert_eq!(session.codec_format(), Some(CodecFormat::JPT));
  assert_eq!(session.state(), SessionState::Ready);
}
