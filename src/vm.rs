use crate::cancel::CancelToken;
use crate::config::{Config, Verbosity};
use crate::io::{Flow, Input, Output};
use crate::memory::{AccessError, Memory};
use crate::opcode::{DecodeError, Instruction, Listing, Mode, Opcode};
use crate::program::Image;
use crate::trace::{log_error, log_info, log_trace, log_warn};

/// Where a machine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  /// Ready to execute the instruction at `ip`
  Running,
  /// Stopped on an `Input` instruction whose provider had nothing ready; the
  /// instruction runs again on the next step
  AwaitingInput,
  /// Executed opcode 99
  Halted,
  /// Stopped by a sink or a `CancelToken`
  Cancelled,
  /// Raised an error; the machine will not run again
  Failed,
}

impl State {
  /// Whether no further instruction can ever run
  pub fn is_finished(self) -> bool {
    matches!(self, Self::Halted | Self::Cancelled | Self::Failed)
  }
}

/// An IntCode virtual machine.
///
/// A `Vm` owns a private copy of its program's memory plus the instruction
/// pointer and relative base. It does not own its I/O: the host passes an
/// input provider and an output sink to every [`Vm::step`], so one driver
/// can interleave many machines without any of them blocking.
#[derive(Debug, Clone)]
pub struct Vm {
  ip: usize,
  relative_base: i64,
  memory: Memory,
  state: State,
  config: Config,
  // instructions completed so far
  steps: u64,
}

impl Vm {
  /// Create a machine whose memory is a copy of `image`
  pub fn new<R>(image: &R) -> Self
  where
    R: Image + ?Sized,
  {
    Self::with_config(image, Config::default())
  }

  pub fn with_config<R>(image: &R, config: Config) -> Self
  where
    R: Image + ?Sized,
  {
    Self {
      ip: 0,
      relative_base: 0,
      memory: Memory::with_limit(image.words(), config.memory_limit),
      state: State::Running,
      config,
      steps: 0,
    }
  }

  /// Execute a single instruction.
  ///
  /// Returns the state the machine is left in. A halted or cancelled machine
  /// stays put without touching memory; a failed one reports
  /// [`Error::MachineFailed`].
  pub fn step<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<State, Error>
  where
    I: Input + ?Sized,
    O: Output + ?Sized,
  {
    match self.state {
      State::Halted | State::Cancelled => return Ok(self.state),
      State::Failed => return Err(Error::MachineFailed),
      State::Running | State::AwaitingInput => {}
    }
    let previous = self.state;
    let result = Task::new(self, input, output).run();
    match result {
      Ok(state) => {
        if state != State::AwaitingInput {
          self.steps += 1;
        }
        self.transition(previous, state);
        Ok(state)
      }
      Err(err) => {
        self.state = State::Failed;
        log_error!(&self.config, "failed: {err}");
        Err(err)
      }
    }
  }

  /// Step until the machine halts, is cancelled, or waits for input
  pub fn resume<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<State, Error>
  where
    I: Input + ?Sized,
    O: Output + ?Sized,
  {
    loop {
      match self.step(input, output)? {
        State::Running => continue,
        state => return Ok(state),
      }
    }
  }

  /// Stop the machine where it stands. Has no effect once it has finished.
  pub fn cancel(&mut self) {
    if !self.state.is_finished() {
      log_warn!(&self.config, "cancelled at ip {}", self.ip);
      self.state = State::Cancelled;
    }
  }

  /// The opcode at `ip`, if it decodes. Does not grow memory.
  pub fn pending_opcode(&self) -> Option<Opcode> {
    let word = self.memory.as_slice().get(self.ip).copied().unwrap_or(0);
    Instruction::decode(word).ok().map(|i| i.opcode)
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn ip(&self) -> usize {
    self.ip
  }

  pub fn relative_base(&self) -> i64 {
    self.relative_base
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Number of instructions executed to completion
  pub fn steps(&self) -> u64 {
    self.steps
  }

  fn transition(&mut self, from: State, to: State) {
    self.state = to;
    if from == to {
      return;
    }
    match to {
      State::AwaitingInput => log_info!(&self.config, "waiting for input at ip {}", self.ip),
      State::Halted => log_info!(&self.config, "halted after {} steps", self.steps),
      State::Cancelled => log_warn!(&self.config, "cancelled by output sink at ip {}", self.ip),
      State::Running if from == State::AwaitingInput => {
        log_info!(&self.config, "resumed at ip {}", self.ip)
      }
      _ => {}
    }
  }
}

/// An error that stopped a machine or a pipeline
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("bad memory access at ip {ip}{}: {source}", during(.opcode))]
  Address {
    ip: usize,
    opcode: Option<Opcode>,
    source: AccessError,
  },

  #[error("invalid opcode {opcode} at ip {ip}")]
  InvalidOpcode { ip: usize, opcode: i64 },

  #[error("invalid mode {mode} for parameter {parameter} of {opcode} at ip {ip}")]
  InvalidMode {
    ip: usize,
    opcode: Opcode,
    parameter: usize,
    mode: i64,
  },

  #[error("arithmetic overflow in {opcode} at ip {ip}")]
  Overflow { ip: usize, opcode: Opcode },

  #[error(
    "channel {channel} still holds an unread value{}{}",
    at(.ip),
    during(.opcode)
  )]
  ChannelProtocol {
    channel: usize,
    ip: Option<usize>,
    opcode: Option<Opcode>,
  },

  #[error("no input available for the instruction at ip {ip}")]
  InputStarved { ip: usize },

  #[error("deadlock: stages {waiting:?} are all blocked")]
  Deadlock { waiting: Vec<usize> },

  #[error("stage {stage} failed: {source}")]
  Stage { stage: usize, source: Box<Error> },

  #[error("machine has already failed")]
  MachineFailed,
}

impl Error {
  /// The instruction pointer of the failing instruction, when known
  pub fn ip(&self) -> Option<usize> {
    match self {
      Self::Address { ip, .. }
      | Self::InvalidOpcode { ip, .. }
      | Self::InvalidMode { ip, .. }
      | Self::Overflow { ip, .. }
      | Self::InputStarved { ip } => Some(*ip),
      Self::ChannelProtocol { ip, .. } => *ip,
      Self::Stage { source, .. } => source.ip(),
      _ => None,
    }
  }

  /// The memory address that could not be accessed, for address errors
  pub fn address(&self) -> Option<i64> {
    match self {
      Self::Address { source, .. } => Some(source.address()),
      Self::Stage { source, .. } => source.address(),
      _ => None,
    }
  }
}

fn at(ip: &Option<usize>) -> String {
  ip.map(|ip| format!(" at ip {ip}")).unwrap_or_default()
}

fn during(opcode: &Option<Opcode>) -> String {
  opcode.map(|opcode| format!(" ({opcode})")).unwrap_or_default()
}

/// What the interpreter loop does once a handler has run
enum Next {
  Advance,
  Jump(usize),
  Suspend,
  Halt,
  Cancel,
}

struct Task<'vm, 'io, I: ?Sized, O: ?Sized> {
  vm: &'vm mut Vm,
  input: &'io mut I,
  output: &'io mut O,
  ip: usize,
  opcode: Option<Opcode>,
  modes: [Mode; 3],
}

impl<'vm, 'io, I, O> Task<'vm, 'io, I, O>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  fn new(vm: &'vm mut Vm, input: &'io mut I, output: &'io mut O) -> Self {
    let ip = vm.ip;
    Self {
      vm,
      input,
      output,
      ip,
      opcode: None,
      modes: [Mode::Position; 3],
    }
  }

  fn fault(&self, source: AccessError) -> Error {
    Error::Address {
      ip: self.ip,
      opcode: self.opcode,
      source,
    }
  }

  // sinks don't know where they were written from
  fn locate(&self, err: Error) -> Error {
    match err {
      Error::ChannelProtocol {
        channel,
        ip: None,
        opcode: None,
      } => Error::ChannelProtocol {
        channel,
        ip: Some(self.ip),
        opcode: self.opcode,
      },
      err => err,
    }
  }

  fn overflow(&self, opcode: Opcode) -> Error {
    Error::Overflow { ip: self.ip, opcode }
  }

  fn address(&self, offset: usize) -> i64 {
    (self.ip + offset) as i64
  }

  fn decode(&mut self) -> Result<Instruction, Error> {
    let word = self
      .vm
      .memory
      .read(self.address(0))
      .map_err(|source| self.fault(source))?;
    let instruction = Instruction::decode(word).map_err(|err| match err {
      DecodeError::Opcode(opcode) => Error::InvalidOpcode {
        ip: self.ip,
        opcode,
      },
      DecodeError::Mode {
        opcode,
        parameter,
        mode,
      } => Error::InvalidMode {
        ip: self.ip,
        opcode,
        parameter,
        mode,
      },
    })?;
    self.opcode = Some(instruction.opcode);
    self.modes = instruction.modes;
    Ok(instruction)
  }

  // raw operand of parameter `n`
  fn operand(&mut self, n: usize) -> Result<i64, Error> {
    let address = self.address(1 + n);
    self.vm.memory.read(address).map_err(|source| self.fault(source))
  }

  fn relative(&self, offset: i64, opcode: Opcode) -> Result<i64, Error> {
    self
      .vm
      .relative_base
      .checked_add(offset)
      .ok_or_else(|| self.overflow(opcode))
  }

  fn load(&mut self, n: usize, opcode: Opcode) -> Result<i64, Error> {
    let raw = self.operand(n)?;
    let address = match self.modes[n] {
      Mode::Immediate => return Ok(raw),
      Mode::Position => raw,
      Mode::Relative => self.relative(raw, opcode)?,
    };
    self.vm.memory.read(address).map_err(|source| self.fault(source))
  }

  fn store(&mut self, n: usize, opcode: Opcode, value: i64) -> Result<(), Error> {
    let raw = self.operand(n)?;
    let address = match self.modes[n] {
      Mode::Immediate => {
        return Err(Error::InvalidMode {
          ip: self.ip,
          opcode,
          parameter: n,
          mode: Mode::Immediate as i64,
        })
      }
      Mode::Position => raw,
      Mode::Relative => self.relative(raw, opcode)?,
    };
    self
      .vm
      .memory
      .write(address, value)
      .map_err(|source| self.fault(source))
  }

  fn target(&self, address: i64) -> Result<usize, Error> {
    address
      .try_into()
      .map_err(|_| self.fault(AccessError::Negative(address)))
  }

  fn run(&mut self) -> Result<State, Error> {
    let instruction = self.decode()?;
    if self.vm.config.enabled(Verbosity::Trace) {
      let memory = self.vm.memory.as_slice();
      let operands = memory
        .get(self.ip + 1..(self.ip + instruction.width()).min(memory.len()))
        .unwrap_or(&[]);
      let listing = Listing {
        instruction,
        operands,
      };
      log_trace!(
        &self.vm.config,
        "{:>5} rb={:<5} {}",
        self.ip,
        self.vm.relative_base,
        listing
      );
    }
    let next = match instruction.opcode {
      Opcode::Add => add(self)?,
      Opcode::Multiply => multiply(self)?,
      Opcode::Input => input(self)?,
      Opcode::Output => output(self)?,
      Opcode::JumpIfTrue => jump_if_true(self)?,
      Opcode::JumpIfFalse => jump_if_false(self)?,
      Opcode::LessThan => less_than(self)?,
      Opcode::Equals => equals(self)?,
      Opcode::AdjustRelativeBase => adjust_relative_base(self)?,
      Opcode::Halt => Next::Halt,
    };
    let state = match next {
      Next::Advance => {
        self.vm.ip += instruction.width();
        State::Running
      }
      Next::Jump(target) => {
        self.vm.ip = target;
        State::Running
      }
      Next::Suspend => State::AwaitingInput,
      Next::Halt => State::Halted,
      Next::Cancel => {
        self.vm.ip += instruction.width();
        State::Cancelled
      }
    };
    Ok(state)
  }
}

// m[c] ← a + b
fn add<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let a = task.load(0, Opcode::Add)?;
  let b = task.load(1, Opcode::Add)?;
  let sum = a
    .checked_add(b)
    .ok_or_else(|| task.overflow(Opcode::Add))?;
  task.store(2, Opcode::Add, sum)?;
  Ok(Next::Advance)
}

// m[c] ← a × b
fn multiply<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let a = task.load(0, Opcode::Multiply)?;
  let b = task.load(1, Opcode::Multiply)?;
  let product = a
    .checked_mul(b)
    .ok_or_else(|| task.overflow(Opcode::Multiply))?;
  task.store(2, Opcode::Multiply, product)?;
  Ok(Next::Advance)
}

// m[a] ← input, or suspend with ip unchanged
fn input<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  match task.input.read() {
    Some(value) => {
      task.store(0, Opcode::Input, value)?;
      Ok(Next::Advance)
    }
    None => Ok(Next::Suspend),
  }
}

// output ← a
fn output<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let value = task.load(0, Opcode::Output)?;
  let flow = task.output.write(value).map_err(|err| task.locate(err))?;
  match flow {
    Flow::Continue(()) => Ok(Next::Advance),
    Flow::Break(()) => Ok(Next::Cancel),
  }
}

// if a ≠ 0 : ip ← b
fn jump_if_true<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let condition = task.load(0, Opcode::JumpIfTrue)?;
  let target = task.load(1, Opcode::JumpIfTrue)?;
  if condition != 0 {
    return Ok(Next::Jump(task.target(target)?));
  }
  Ok(Next::Advance)
}

// if a = 0 : ip ← b
fn jump_if_false<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let condition = task.load(0, Opcode::JumpIfFalse)?;
  let target = task.load(1, Opcode::JumpIfFalse)?;
  if condition == 0 {
    return Ok(Next::Jump(task.target(target)?));
  }
  Ok(Next::Advance)
}

// m[c] ← a < b ? 1 : 0
fn less_than<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let a = task.load(0, Opcode::LessThan)?;
  let b = task.load(1, Opcode::LessThan)?;
  task.store(2, Opcode::LessThan, i64::from(a < b))?;
  Ok(Next::Advance)
}

// m[c] ← a = b ? 1 : 0
fn equals<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let a = task.load(0, Opcode::Equals)?;
  let b = task.load(1, Opcode::Equals)?;
  task.store(2, Opcode::Equals, i64::from(a == b))?;
  Ok(Next::Advance)
}

// rb ← rb + a
fn adjust_relative_base<I, O>(task: &mut Task<'_, '_, I, O>) -> Result<Next, Error>
where
  I: Input + ?Sized,
  O: Output + ?Sized,
{
  let delta = task.load(0, Opcode::AdjustRelativeBase)?;
  task.vm.relative_base = task.relative(delta, Opcode::AdjustRelativeBase)?;
  Ok(Next::Advance)
}

/// A machine bundled with the input provider and output sink it runs
/// against. This is the usual way to run a single program.
#[derive(Debug)]
pub struct Computer<I, O> {
  vm: Vm,
  input: I,
  output: O,
  cancel: Option<CancelToken>,
}

impl<I, O> Computer<I, O>
where
  I: Input,
  O: Output,
{
  pub fn new<R>(image: &R, input: I, output: O) -> Self
  where
    R: Image + ?Sized,
  {
    Self::with_config(image, Config::default(), input, output)
  }

  pub fn with_config<R>(image: &R, config: Config, input: I, output: O) -> Self
  where
    R: Image + ?Sized,
  {
    Self {
      vm: Vm::with_config(image, config),
      input,
      output,
      cancel: None,
    }
  }

  /// Stop running as soon as `token` is cancelled
  pub fn with_cancel(mut self, token: CancelToken) -> Self {
    self.cancel = Some(token);
    self
  }

  /// Run until the program halts or is cancelled.
  ///
  /// Running out of input is an error here: nothing else can supply it. Use
  /// [`Computer::resume`] to feed input incrementally instead.
  pub fn run(&mut self) -> Result<State, Error> {
    match self.resume()? {
      State::AwaitingInput => Err(Error::InputStarved { ip: self.vm.ip }),
      state => Ok(state),
    }
  }

  /// Run until the program halts, is cancelled, or waits for input
  pub fn resume(&mut self) -> Result<State, Error> {
    loop {
      if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
        self.vm.cancel();
      }
      match self.vm.step(&mut self.input, &mut self.output)? {
        State::Running => continue,
        state => return Ok(state),
      }
    }
  }

  pub fn vm(&self) -> &Vm {
    &self.vm
  }

  pub fn memory(&self) -> &Memory {
    self.vm.memory()
  }

  pub fn input_mut(&mut self) -> &mut I {
    &mut self.input
  }

  pub fn output(&self) -> &O {
    &self.output
  }

  pub fn output_mut(&mut self) -> &mut O {
    &mut self.output
  }

  pub fn into_parts(self) -> (Vm, I, O) {
    (self.vm, self.input, self.output)
  }
}
