use j2kcodec_tools::cli::run_tile_encode;

fn main() -> Result<(), String> {
  // Setup rust logging.
  env_logger::init();

  run_tile_encode(std::env::args().collect())
}
