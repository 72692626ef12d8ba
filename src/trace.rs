//! Leveled diagnostics on stderr, gated by each machine's `Verbosity`.

use std::fmt::{self, Display};
use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::{Config, Verbosity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
  Trace,
  Info,
  Warn,
  Error,
}

impl Level {
  fn verbosity(self) -> Verbosity {
    match self {
      Level::Trace => Verbosity::Trace,
      _ => Verbosity::Info,
    }
  }

  fn color(self) -> ColorSpec {
    let mut spec = ColorSpec::new();
    match self {
      Level::Trace => {
        spec.set_dimmed(true);
      }
      Level::Info => {}
      Level::Warn => {
        spec.set_fg(Some(Color::Yellow)).set_bold(true);
      }
      Level::Error => {
        spec.set_fg(Some(Color::Red)).set_bold(true);
      }
    }
    spec
  }
}

impl Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Level::Trace => write!(f, "TRACE"),
      Level::Info => write!(f, "INFO"),
      Level::Warn => write!(f, "WARN"),
      Level::Error => write!(f, "ERROR"),
    }
  }
}

/// Write one line for `config`'s machine if its verbosity admits `level`.
/// Use the `log_*!` macros instead.
#[doc(hidden)]
pub(crate) fn log(config: &Config, level: Level, message: fmt::Arguments<'_>) {
  if !config.enabled(level.verbosity()) {
    return;
  }
  let mut stderr = StandardStream::stderr(ColorChoice::Auto);
  let _ = stderr.set_color(&level.color());
  let _ = writeln!(stderr, "[{:5}] {}: {}", level, config.label, message);
  let _ = stderr.reset();
}

macro_rules! log_trace {
  ($config:expr, $($arg:tt)*) => {
    $crate::trace::log($config, $crate::trace::Level::Trace, format_args!($($arg)*))
  };
}

macro_rules! log_info {
  ($config:expr, $($arg:tt)*) => {
    $crate::trace::log($config, $crate::trace::Level::Info, format_args!($($arg)*))
  };
}

macro_rules! log_warn {
  ($config:expr, $($arg:tt)*) => {
    $crate::trace::log($config, $crate::trace::Level::Warn, format_args!($($arg)*))
  };
}

macro_rules! log_error {
  ($config:expr, $($arg:tt)*) => {
    $crate::trace::log($config, $crate::trace::Level::Error, format_args!($($arg)*))
  };
}

pub(crate) use {log_error, log_info, log_trace, log_warn};
