///! Command line front ends shared by the j2kcodec tools.
pub mod cli;

pub mod testing {
  use std::env;
  use std::path::PathBuf;

  /// Get temporary output directory for tests
  pub fn get_temp_dir() -> PathBuf {
    let temp = env::temp_dir().join("j2kcodec_tools");
    if let Err(err) = std::fs::create_dir_all(&temp) {
      log::warn!("create {}: {}", temp.display(), err);
    }
    temp
  }

  /// Build an argument list, program name first.
  #[macro_export]
  macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![
            String::from("test"),  // Program name
            $(String::from($arg)),*
        ]
    };
  }
}
