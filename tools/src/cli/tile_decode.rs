use std::convert::TryFrom;
use std::path::{Path, PathBuf};

use j2kcodec::{CodecSession, DecodedImage, DecoderConfig};

use super::parse_arg;

/// Scale the samples to 8 bits, shifting signed data into the unsigned range.
fn to_gray8(image: &DecodedImage) -> Vec<u8> {
  let precision = image.precision.max(1);
  let offset = if image.signed {
    1i64 << (precision - 1)
  } else {
    0
  };
  let shift = precision.saturating_sub(8);
  image
    .data
    .iter()
    .map(|v| ((*v as i64 + offset) >> shift).max(0).min(255) as u8)
    .collect()
}

fn save_png(image: &DecodedImage, output: &Path) -> Result<(), String> {
  let gray = image::GrayImage::from_raw(image.width, image.height, to_gray8(image))
    .ok_or_else(|| {
      format!(
        "Decoded buffer does not match {}x{}",
        image.width, image.height
      )
    })?;
  gray
    .save(output)
    .map_err(|e| format!("Failed to save {}: {}", output.display(), e))
}

/// `j2k_tile_decode <input> [tile] [reduce] [out.png]`, tile `-1` decodes the whole image.
pub fn run_tile_decode(args: Vec<String>) -> Result<(), String> {
  let mut args = args.into_iter();
  // Skip program name.
  args.next();

  let input_file = args.next().unwrap_or_else(|| "test.j2k".to_string());
  let tile: i64 = parse_arg(args.next(), "-1", "tile index")?;
  let reduce: u32 = parse_arg(args.next(), "0", "resolution factor")?;
  let output_file = args.next().map(PathBuf::from);

  let mut session = CodecSession::new();
  session
    .open_stream(&input_file)
    .map_err(|e| e.to_string())?;
  let info = session
    .setup_decoder(DecoderConfig::new())
    .map_err(|e| e.to_string())?;
  if reduce > 0 {
    session
      .set_resolution_factor(reduce)
      .map_err(|e| e.to_string())?;
  }

  let decoded = if tile < 0 {
    session.decode_image()
  } else {
    let index = u32::try_from(tile).map_err(|_| format!("Invalid tile index: {}", tile))?;
    session.decode_tile(index)
  }
  .map_err(|e| e.to_string())?;

  println!(
    "{}: {}x{} tiles, decoded {}x{} ({} bits, {} components)",
    input_file,
    info.tw,
    info.th,
    decoded.width,
    decoded.height,
    decoded.precision,
    decoded.components
  );
  if let Some(output_file) = output_file {
    save_png(&decoded, &output_file)?;
    log::info!("saved {}", output_file.display());
  }
  Ok(())
}
