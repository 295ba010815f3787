use j2kcodec_tools::cli::run_tile_decode;

fn main() -> Result<(), String> {
  // Setup rust logging.
  env_logger::init();

  run_tile_decode(std::env::args().collect())
}
