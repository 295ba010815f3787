use std::fs;
use std::path::{Path, PathBuf};

/// `j2k_extract_xml <input.jp2> [out.xml]`, the output defaults to `<basename>.xml`.
pub fn run_extract_xml(args: Vec<String>) -> Result<(), String> {
  let mut args = args.into_iter();
  // Skip program name.
  args.next();

  let input_file = args
    .next()
    .ok_or_else(|| "Usage: j2k_extract_xml <input.jp2> [out.xml]".to_string())?;
  let output_file = args
    .next()
    .map(PathBuf::from)
    .unwrap_or_else(|| Path::new(&input_file).with_extension("xml"));

  let xml = j2kcodec::fetch_xml_data(&input_file).map_err(|e| e.to_string())?;
  fs::write(&output_file, &xml)
    .map_err(|e| format!("Failed to write {}: {}", output_file.display(), e))?;
  println!(
    "Extracted {} bytes of XML to {}",
    xml.len(),
    output_file.display()
  );
  Ok(())
}
