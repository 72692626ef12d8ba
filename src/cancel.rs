use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared stop signal.
///
/// Clones observe the same flag. Drivers check it between instructions, so a
/// cancelled machine stops without finishing its program and reports
/// `State::Cancelled` rather than an error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}
