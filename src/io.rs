//! The two capabilities a host hands to a machine: somewhere to read input
//! from and somewhere to send output to.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use crate::vm::Error;

/// What a sink tells the machine after accepting a value
pub type Flow = ControlFlow<()>;

/// A source of input values.
///
/// `read` is called once per `Input` instruction. Returning `None` means no
/// value is ready yet: the machine suspends without consuming the
/// instruction and will call `read` again when it is resumed.
pub trait Input {
  fn read(&mut self) -> Option<i64>;
}

/// A sink for output values.
///
/// `write` is called once per `Output` instruction and must not block.
/// Returning `ControlFlow::Break` cancels the machine after the value has
/// been delivered; an `Err` fails it.
pub trait Output {
  fn write(&mut self, value: i64) -> Result<Flow, Error>;
}

impl<T: Input + ?Sized> Input for &mut T {
  fn read(&mut self) -> Option<i64> {
    (**self).read()
  }
}

impl<T: Output + ?Sized> Output for &mut T {
  fn write(&mut self, value: i64) -> Result<Flow, Error> {
    (**self).write(value)
  }
}

impl<T: Input + ?Sized> Input for Box<T> {
  fn read(&mut self) -> Option<i64> {
    (**self).read()
  }
}

impl<T: Output + ?Sized> Output for Box<T> {
  fn write(&mut self, value: i64) -> Result<Flow, Error> {
    (**self).write(value)
  }
}

impl Input for VecDeque<i64> {
  fn read(&mut self) -> Option<i64> {
    self.pop_front()
  }
}

impl Output for VecDeque<i64> {
  fn write(&mut self, value: i64) -> Result<Flow, Error> {
    self.push_back(value);
    Ok(Flow::Continue(()))
  }
}

impl Output for Vec<i64> {
  fn write(&mut self, value: i64) -> Result<Flow, Error> {
    self.push(value);
    Ok(Flow::Continue(()))
  }
}

/// Input for programs that never read
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl Input for NoInput {
  fn read(&mut self) -> Option<i64> {
    None
  }
}

/// Output that discards every value
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Output for Discard {
  fn write(&mut self, _value: i64) -> Result<Flow, Error> {
    Ok(Flow::Continue(()))
  }
}

/// An `Input` backed by a closure. See [`from_fn`].
#[derive(Debug, Clone)]
pub struct FromFn<F>(F);

impl<F> Input for FromFn<F>
where
  F: FnMut() -> Option<i64>,
{
  fn read(&mut self) -> Option<i64> {
    (self.0)()
  }
}

/// Build an `Input` from a closure returning `None` while no value is ready
pub fn from_fn<F>(f: F) -> FromFn<F>
where
  F: FnMut() -> Option<i64>,
{
  FromFn(f)
}

/// An `Output` backed by a closure. See [`sink_fn`].
#[derive(Debug, Clone)]
pub struct SinkFn<F>(F);

impl<F> Output for SinkFn<F>
where
  F: FnMut(i64) -> Flow,
{
  fn write(&mut self, value: i64) -> Result<Flow, Error> {
    Ok((self.0)(value))
  }
}

/// Build an `Output` from a closure; return `ControlFlow::Break(())` to stop
/// the machine
pub fn sink_fn<F>(f: F) -> SinkFn<F>
where
  F: FnMut(i64) -> Flow,
{
  SinkFn(f)
}

/// Yields a fixed seed exactly once, then reads from the inner input.
///
/// This is how a phase setting reaches a stage before its channel does.
#[derive(Debug, Clone)]
pub struct Seeded<I> {
  seed: Option<i64>,
  inner: I,
}

impl<I> Seeded<I> {
  pub fn new(seed: i64, inner: I) -> Self {
    Self {
      seed: Some(seed),
      inner,
    }
  }

  /// Like `new`, but `None` means the seed was already handed out
  pub fn with_seed(seed: Option<i64>, inner: I) -> Self {
    Self { seed, inner }
  }

  /// Whether the seed has been consumed
  pub fn is_spent(&self) -> bool {
    self.seed.is_none()
  }

  /// The unread seed, if any, and the inner input
  pub fn into_parts(self) -> (Option<i64>, I) {
    (self.seed, self.inner)
  }
}

impl<I: Input> Input for Seeded<I> {
  fn read(&mut self) -> Option<i64> {
    self.seed.take().or_else(|| self.inner.read())
  }
}
