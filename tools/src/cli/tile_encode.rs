use j2kcodec::{TileEncoder, TileLayout};
use rand::prelude::*;

use super::parse_arg;

/// Synthesize planar samples, a diagonal gradient or noise.
fn synthesize(layout: &TileLayout, random: bool) -> Vec<i32> {
  let max = (1i32 << layout.bits_per_sample) - 1;
  if random {
    let mut rng = rand::thread_rng();
    return (0..layout.sample_count())
      .map(|_| rng.gen_range(0..=max))
      .collect();
  }
  let width = layout.image_width as usize;
  let plane = width * layout.image_height as usize;
  (0..layout.sample_count())
    .map(|i| {
      let comp = i / plane;
      let (x, y) = ((i % plane) % width, (i % plane) / width);
      ((x + y + comp * 32) % (max as usize + 1)) as i32
    })
    .collect()
}

/// `j2k_tile_encode <comps> <w> <h> <tw> <th> <prec> <out> [random]`
pub fn run_tile_encode(args: Vec<String>) -> Result<(), String> {
  let mut args = args.into_iter();
  // Skip program name.
  args.next();

  let num_comps: u32 = parse_arg(args.next(), "1", "number of components")?;
  let image_width: u32 = parse_arg(args.next(), "2048", "image width")?;
  let image_height: u32 = parse_arg(args.next(), "2048", "image height")?;
  let tile_width: u32 = parse_arg(args.next(), "512", "tile width")?;
  let tile_height: u32 = parse_arg(args.next(), "512", "tile height")?;
  let comp_prec: u32 = parse_arg(args.next(), "8", "component precision")?;
  let output_file = args.next().unwrap_or_else(|| "test.j2k".to_string());
  let is_random = match args.next().as_deref() {
    None => false,
    Some("random") => true,
    Some(flag) => return Err(format!("Invalid random flag: {}", flag)),
  };

  let layout = TileLayout::new(
    image_width,
    image_height,
    tile_width,
    tile_height,
    num_comps,
    comp_prec,
  )
  .map_err(|e| e.to_string())?;
  let samples = synthesize(&layout, is_random);

  TileEncoder::new()
    .encode_as_tiles(&output_file, &samples, &layout)
    .map_err(|e| e.to_string())?;
  println!(
    "Generated outfile {}: {} tiles of {}x{}",
    output_file,
    layout.tile_count(),
    tile_width,
    tile_height
  );
  Ok(())
}
