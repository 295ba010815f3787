//! Message sinks for codec events.
use std::sync::Arc;

/// Log target used by `LogSink`.
pub const LOG_TARGET: &str = "j2kcodec";

/// Receives info/warning/error messages from a session and the engine handles it owns.
pub trait EventSink {
  fn info(&self, msg: &str);
  fn warning(&self, msg: &str);
  fn error(&self, msg: &str);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
  fn info(&self, msg: &str) {
    log::info!(target: LOG_TARGET, "{}", msg.trim_end());
  }

  fn warning(&self, msg: &str) {
    log::warn!(target: LOG_TARGET, "{}", msg.trim_end());
  }

  fn error(&self, msg: &str) {
    log::error!(target: LOG_TARGET, "{}", msg.trim_end());
  }
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
  fn info(&self, _msg: &str) {}
  fn warning(&self, _msg: &str) {}
  fn error(&self, _msg: &str) {}
}

pub type SharedSink = Arc<dyn EventSink + Send + Sync>;

pub fn default_sink() -> SharedSink {
  Arc::new(LogSink)
}
