use crate::memory::DEFAULT_LIMIT;

/// How much a machine reports about itself on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
  /// Nothing
  #[default]
  Quiet,
  /// Halts, suspensions, cancellation and failures
  Info,
  /// Every decoded instruction as well
  Trace,
}

impl Verbosity {
  /// Map a count of `-v` flags onto a verbosity
  pub fn from_occurrences(count: u8) -> Self {
    match count {
      0 => Self::Quiet,
      1 => Self::Info,
      _ => Self::Trace,
    }
  }
}

/// Per-machine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Name printed in front of every diagnostic line
  pub label: String,
  pub verbosity: Verbosity,
  /// Memory never grows past this many cells
  pub memory_limit: usize,
}

impl Config {
  pub fn new() -> Self {
    Self {
      label: String::from("intcode"),
      verbosity: Verbosity::Quiet,
      memory_limit: DEFAULT_LIMIT,
    }
  }

  pub fn label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
    self.verbosity = verbosity;
    self
  }

  pub fn memory_limit(mut self, cells: usize) -> Self {
    self.memory_limit = cells;
    self
  }

  pub(crate) fn enabled(&self, verbosity: Verbosity) -> bool {
    verbosity != Verbosity::Quiet && self.verbosity >= verbosity
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = Config::default();
    assert_eq!(config.verbosity, Verbosity::Quiet);
    assert_eq!(config.memory_limit, DEFAULT_LIMIT);
    assert!(!config.enabled(Verbosity::Info));
  }

  #[test]
  fn builder() {
    let config = Config::new()
      .label("amp 3")
      .verbosity(Verbosity::Info)
      .memory_limit(64);
    assert_eq!(config.label, "amp 3");
    assert_eq!(config.memory_limit, 64);
    assert!(config.enabled(Verbosity::Info));
    assert!(!config.enabled(Verbosity::Trace));
  }

  #[test]
  fn verbosity_from_flags() {
    assert_eq!(Verbosity::from_occurrences(0), Verbosity::Quiet);
    assert_eq!(Verbosity::from_occurrences(1), Verbosity::Info);
    assert_eq!(Verbosity::from_occurrences(4), Verbosity::Trace);
  }
}
