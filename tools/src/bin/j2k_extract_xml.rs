use j2kcodec_tools::cli::run_extract_xml;

fn main() -> Result<(), String> {
  // Setup rust logging.
  env_logger::init();

  run_extract_xml(std::env::args().collect())
}
