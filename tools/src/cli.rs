use std::str::FromStr;

pub mod extract_xml;
pub mod tile_decode;
pub mod tile_encode;

pub use extract_xml::run_extract_xml;
pub use tile_decode::run_tile_decode;
pub use tile_encode::run_tile_encode;

/// Parse an optional positional argument, falling back to `default`.
pub(crate) fn parse_arg<T: FromStr>(
  arg: Option<String>,
  default: &str,
  what: &str,
) -> Result<T, String> {
  let arg = arg.unwrap_or_else(|| default.to_string());
  arg
    .parse()
    .map_err(|_| format!("Invalid {}: {}", what, arg))
}
