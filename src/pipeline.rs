//! Several machines wired together through single-slot channels and driven
//! by one cooperative, single-threaded scheduler.
//!
//! ```text
//!   ┌──────────── #0 ◄──────────────┐
//!   ▼                               │
//!  [0] ─#1─► [1] ─#2─► [2] ─#3─► [3] ─#4─► [4]
//! ```
//!
//! A stage only ever touches its own memory; values move between stages
//! only through the channels the pipeline owns.

use crate::cancel::CancelToken;
use crate::channel::{Channel, ChannelId};
use crate::config::Config;
use crate::io::Seeded;
use crate::opcode::Opcode;
use crate::program::Image;
use crate::trace::{log_info, log_warn};
use crate::vm::{Error, State, Vm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub usize);

#[derive(Debug)]
struct Stage {
  vm: Vm,
  // handed to the first `Input`, before anything is read from the channel
  seed: Option<i64>,
  input: ChannelId,
  output: ChannelId,
}

/// A set of machines and the channels between them
#[derive(Debug)]
pub struct Pipeline {
  config: Config,
  channels: Vec<Channel>,
  stages: Vec<Stage>,
  cancel: CancelToken,
  // where `signal` reads the result from, for the prebuilt topologies
  result: Option<ChannelId>,
}

impl Pipeline {
  pub fn new() -> Self {
    Self::with_config(Config::new().label("pipeline"))
  }

  /// Stages inherit `config`, labelled `<label>[<index>]`
  pub fn with_config(config: Config) -> Self {
    Self {
      config,
      channels: Vec::new(),
      stages: Vec::new(),
      cancel: CancelToken::new(),
      result: None,
    }
  }

  /// `phases.len()` copies of `image` in a line. Stage `i` reads channel `i`
  /// and writes channel `i + 1`; channel 0 starts out holding `0` and the
  /// final channel receives the result.
  pub fn chain<R>(image: &R, phases: &[i64]) -> Result<Self, Error>
  where
    R: Image + ?Sized,
  {
    Self::chain_with_config(image, phases, Config::new().label("chain"))
  }

  pub fn chain_with_config<R>(image: &R, phases: &[i64], config: Config) -> Result<Self, Error>
  where
    R: Image + ?Sized,
  {
    let mut pipeline = Self::with_config(config);
    let channels: Vec<_> = (0..=phases.len()).map(|_| pipeline.channel()).collect();
    for (i, phase) in phases.iter().enumerate() {
      pipeline.stage(image, Some(*phase), channels[i], channels[i + 1]);
    }
    pipeline.send(channels[0], 0)?;
    pipeline.result = channels.last().copied();
    Ok(pipeline)
  }

  /// `phases.len()` copies of `image` in a directed cycle. Stage `i` reads
  /// channel `i` and writes channel `(i + 1) % n`; channel 0 starts out
  /// holding `0`. When every stage has halted, the last stage's final output
  /// is left on channel 0.
  pub fn feedback_loop<R>(image: &R, phases: &[i64]) -> Result<Self, Error>
  where
    R: Image + ?Sized,
  {
    Self::feedback_loop_with_config(image, phases, Config::new().label("loop"))
  }

  pub fn feedback_loop_with_config<R>(
    image: &R,
    phases: &[i64],
    config: Config,
  ) -> Result<Self, Error>
  where
    R: Image + ?Sized,
  {
    let mut pipeline = Self::with_config(config);
    let channels: Vec<_> = phases.iter().map(|_| pipeline.channel()).collect();
    let n = channels.len();
    for (i, phase) in phases.iter().enumerate() {
      pipeline.stage(image, Some(*phase), channels[i], channels[(i + 1) % n]);
    }
    if let Some(first) = channels.first() {
      pipeline.send(*first, 0)?;
      pipeline.result = Some(*first);
    }
    Ok(pipeline)
  }

  /// Add an empty channel
  pub fn channel(&mut self) -> ChannelId {
    let id = ChannelId(self.channels.len());
    self.channels.push(Channel::new(id));
    id
  }

  /// Add a machine running a copy of `image`. If `seed` is given it is the
  /// machine's first input; after that it reads from `input`. Everything it
  /// outputs goes to `output`.
  pub fn stage<R>(
    &mut self,
    image: &R,
    seed: Option<i64>,
    input: ChannelId,
    output: ChannelId,
  ) -> StageId
  where
    R: Image + ?Sized,
  {
    let id = StageId(self.stages.len());
    let config = self
      .config
      .clone()
      .label(format!("{}[{}]", self.config.label, id.0));
    self.stages.push(Stage {
      vm: Vm::with_config(image, config),
      seed,
      input,
      output,
    });
    id
  }

  /// Put a value on a channel before (or between) runs
  pub fn send(&mut self, channel: ChannelId, value: i64) -> Result<(), Error> {
    self.channels[channel.0].put(value)
  }

  pub fn peek(&self, channel: ChannelId) -> Option<i64> {
    self.channels[channel.0].peek()
  }

  /// The value left on the result channel of a `chain` or `feedback_loop`
  pub fn signal(&self) -> Option<i64> {
    self.result.and_then(|channel| self.peek(channel))
  }

  pub fn vm(&self, stage: StageId) -> &Vm {
    &self.stages[stage.0].vm
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// A token that stops `run` before the next instruction of any stage
  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  /// Drive every stage until all of them have halted.
  ///
  /// Stages take turns in index order. Each turn runs a stage until it waits
  /// for input, fills its output channel, or halts, so a producer never
  /// overwrites a value its consumer has not read yet.
  ///
  /// Returns `State::Halted` once every stage has halted and
  /// `State::Cancelled` if the cancel token fired. If one stage fails, every
  /// other stage is cancelled and the error is returned as `Error::Stage`.
  /// A round in which no stage can make progress is `Error::Deadlock`.
  pub fn run(&mut self) -> Result<State, Error> {
    loop {
      if self.cancel.is_cancelled() {
        return Ok(self.stop());
      }
      if self.stages.iter().all(|stage| stage.vm.state().is_finished()) {
        let state = if self
          .stages
          .iter()
          .any(|stage| stage.vm.state() == State::Cancelled)
        {
          State::Cancelled
        } else {
          State::Halted
        };
        log_info!(&self.config, "all {} stages finished", self.stages.len());
        return Ok(state);
      }

      let mut progressed = false;
      for index in 0..self.stages.len() {
        match self.turn(index) {
          Ok(moved) => progressed |= moved,
          Err(err) => {
            self.cancel_all();
            return Err(Error::Stage {
              stage: index,
              source: Box::new(err),
            });
          }
        }
        if self.cancel.is_cancelled() {
          return Ok(self.stop());
        }
      }
      if !progressed {
        let waiting = self
          .stages
          .iter()
          .enumerate()
          .filter(|(_, stage)| !stage.vm.state().is_finished())
          .map(|(index, _)| index)
          .collect();
        return Err(Error::Deadlock { waiting });
      }
    }
  }

  // one scheduling turn for a stage; reports whether any instruction ran
  fn turn(&mut self, index: usize) -> Result<bool, Error> {
    let stage = &mut self.stages[index];
    let input = &self.channels[stage.input.0];
    let mut output = &self.channels[stage.output.0];
    let mut progressed = false;
    loop {
      if self.cancel.is_cancelled() || stage.vm.state().is_finished() {
        return Ok(progressed);
      }
      if output.is_full() && stage.vm.pending_opcode() == Some(Opcode::Output) {
        return Ok(progressed);
      }
      let sent = output.sent();
      let mut port = Seeded::with_seed(stage.seed.take(), input);
      let step = stage.vm.step(&mut port, &mut output);
      stage.seed = port.into_parts().0;
      match step? {
        State::Running => {
          progressed = true;
          if output.sent() != sent {
            return Ok(progressed);
          }
        }
        State::AwaitingInput => return Ok(progressed),
        _ => return Ok(true),
      }
    }
  }

  fn stop(&mut self) -> State {
    log_warn!(&self.config, "cancelled");
    self.cancel_all();
    State::Cancelled
  }

  fn cancel_all(&mut self) {
    for stage in &mut self.stages {
      stage.vm.cancel();
    }
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new()
  }
}
