use std::cell::Cell;
use std::fmt;

use crate::io::{Flow, Input, Output};
use crate::vm::Error;

/// Handle to a channel owned by a [`Pipeline`](crate::pipeline::Pipeline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub usize);

impl fmt::Display for ChannelId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// A single-slot handoff between two machines.
///
/// The producer's `Output` fills the slot and the consumer's `Input` empties
/// it. Writing to a full slot is a protocol error rather than an overwrite;
/// schedulers avoid it by not running a producer whose slot is still full.
///
/// Both ends work through `&Channel`, so the producer and consumer of a
/// channel may be the same machine.
#[derive(Debug)]
pub struct Channel {
  id: ChannelId,
  slot: Cell<Option<i64>>,
  sent: Cell<u64>,
}

impl Channel {
  pub fn new(id: ChannelId) -> Self {
    Self {
      id,
      slot: Cell::new(None),
      sent: Cell::new(0),
    }
  }

  pub fn id(&self) -> ChannelId {
    self.id
  }

  /// Fill the slot
  pub fn put(&self, value: i64) -> Result<(), Error> {
    if self.is_full() {
      return Err(Error::ChannelProtocol {
        channel: self.id.0,
        ip: None,
        opcode: None,
      });
    }
    self.slot.set(Some(value));
    self.sent.set(self.sent.get() + 1);
    Ok(())
  }

  /// Empty the slot
  pub fn take(&self) -> Option<i64> {
    self.slot.take()
  }

  /// The pending value, left in place
  pub fn peek(&self) -> Option<i64> {
    self.slot.get()
  }

  pub fn is_full(&self) -> bool {
    self.slot.get().is_some()
  }

  /// Total values ever put on this channel
  pub fn sent(&self) -> u64 {
    self.sent.get()
  }
}

impl Input for &Channel {
  fn read(&mut self) -> Option<i64> {
    self.take()
  }
}

impl Output for &Channel {
  fn write(&mut self, value: i64) -> Result<Flow, Error> {
    self.put(value)?;
    Ok(Flow::Continue(()))
  }
}
