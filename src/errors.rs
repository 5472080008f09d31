use std::time::Duration;
use thiserror::Error;

pub type HarnessResult<T, E = HarnessError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum HarnessError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("SQLite error: {0}")]
  Sql(#[from] rusqlite::Error),

  #[error("config error: {0}")]
  Config(#[from] toml::de::Error),

  #[error("duplicate scenario id: {0}")]
  DuplicateScenario(String),

  #[error("registry is sealed; no further registrations accepted")]
  SealedRegistry,

  #[error("unknown scenario id: {0}")]
  UnknownScenario(String),

  #[error("unknown category: {0}")]
  UnknownCategory(String),

  #[error("sink error: {0}")]
  Sink(#[from] SinkError),

  #[error("other: {0}")]
  Other(String),
}

impl From<&str> for HarnessError {
  fn from(msg: &str) -> Self {
    HarnessError::Other(msg.to_owned())
  }
}

impl From<String> for HarnessError {
  fn from(msg: String) -> Self {
    HarnessError::Other(msg)
  }
}

/// Adapter-level failure. A sink's own controlled refusal of a payload is
/// *not* one of these (see `Outcome::Rejected`); these are infrastructure
/// faults the runner surfaces as an error verdict.
#[derive(Debug, Error)]
pub enum SinkError {
  #[error("failed to spawn `{program}`: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },

  #[error("external call exceeded {0:?}")]
  Timeout(Duration),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("SQLite error: {0}")]
  Sql(#[from] rusqlite::Error),

  #[error("sink produced non-UTF-8 output")]
  Output(#[from] std::string::FromUtf8Error),
}
