use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
  /// Adds the first two parameters.
  ///
  /// | Operation | Semantics        | Assembly         |
  /// |-----------|------------------|------------------|
  /// | Add       | `m[c] ← a + b`   | `add a, b, c`    |
  Add = 1,

  /// Multiplies the first two parameters.
  ///
  /// | Operation | Semantics        | Assembly         |
  /// |-----------|------------------|------------------|
  /// | Multiply  | `m[c] ← a × b`   | `mul a, b, c`    |
  Multiply = 2,

  /// Stores the next value from the input provider. The only instruction that
  /// can suspend a machine.
  ///
  /// | Operation | Semantics        | Assembly |
  /// |-----------|------------------|----------|
  /// | Input     | `m[a] ← input`   | `in a`   |
  Input = 3,

  /// | Operation | Semantics        | Assembly |
  /// |-----------|------------------|----------|
  /// | Output    | `output ← a`     | `out a`  |
  Output = 4,

  /// | Operation  | Semantics              | Assembly    |
  /// |------------|------------------------|-------------|
  /// | JumpIfTrue | `if a ≠ 0 : ip ← b`    | `jnz a, b`  |
  JumpIfTrue = 5,

  /// | Operation   | Semantics              | Assembly   |
  /// |-------------|------------------------|------------|
  /// | JumpIfFalse | `if a = 0 : ip ← b`    | `jz a, b`  |
  JumpIfFalse = 6,

  /// | Operation | Semantics                 | Assembly       |
  /// |-----------|---------------------------|----------------|
  /// | LessThan  | `m[c] ← a < b ? 1 : 0`    | `lt a, b, c`   |
  LessThan = 7,

  /// | Operation | Semantics                 | Assembly       |
  /// |-----------|---------------------------|----------------|
  /// | Equals    | `m[c] ← a = b ? 1 : 0`    | `eq a, b, c`   |
  Equals = 8,

  /// | Operation          | Semantics     | Assembly |
  /// |--------------------|---------------|----------|
  /// | AdjustRelativeBase | `rb ← rb + a` | `arb a`  |
  AdjustRelativeBase = 9,

  /// | Operation | Semantics          | Assembly |
  /// |-----------|--------------------|----------|
  /// | Halt      | `(stop execution)` | `halt`   |
  Halt = 99,
}

impl Opcode {
  /// Number of parameters following the instruction word
  pub fn arity(self) -> usize {
    match self {
      Self::Add | Self::Multiply | Self::LessThan | Self::Equals => 3,
      Self::JumpIfTrue | Self::JumpIfFalse => 2,
      Self::Input | Self::Output | Self::AdjustRelativeBase => 1,
      Self::Halt => 0,
    }
  }

  /// Index of the parameter this opcode writes through, if any
  pub fn write_parameter(self) -> Option<usize> {
    match self {
      Self::Add | Self::Multiply | Self::LessThan | Self::Equals => Some(2),
      Self::Input => Some(0),
      _ => None,
    }
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Multiply => "mul",
      Self::Input => "in",
      Self::Output => "out",
      Self::JumpIfTrue => "jnz",
      Self::JumpIfFalse => "jz",
      Self::LessThan => "lt",
      Self::Equals => "eq",
      Self::AdjustRelativeBase => "arb",
      Self::Halt => "halt",
    }
  }
}

impl TryFrom<i64> for Opcode {
  type Error = i64;

  fn try_from(code: i64) -> Result<Self, Self::Error> {
    match code {
      1 => Ok(Self::Add),
      2 => Ok(Self::Multiply),
      3 => Ok(Self::Input),
      4 => Ok(Self::Output),
      5 => Ok(Self::JumpIfTrue),
      6 => Ok(Self::JumpIfFalse),
      7 => Ok(Self::LessThan),
      8 => Ok(Self::Equals),
      9 => Ok(Self::AdjustRelativeBase),
      99 => Ok(Self::Halt),
      other => Err(other),
    }
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

/// How a raw operand is turned into a value or a destination
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
  /// The operand is an address
  #[default]
  Position = 0,
  /// The operand is the value itself; cannot be written through
  Immediate = 1,
  /// The operand is an offset from the relative base
  Relative = 2,
}

impl TryFrom<i64> for Mode {
  type Error = i64;

  fn try_from(digit: i64) -> Result<Self, Self::Error> {
    match digit {
      0 => Ok(Self::Position),
      1 => Ok(Self::Immediate),
      2 => Ok(Self::Relative),
      other => Err(other),
    }
  }
}

/// Why an instruction word could not be decoded
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
  #[error("unknown opcode {0}")]
  Opcode(i64),

  #[error("mode {mode} is not allowed for parameter {parameter} of {opcode}")]
  Mode {
    opcode: Opcode,
    parameter: usize,
    mode: i64,
  },
}

/// A decoded instruction word: the opcode and the mode of each parameter it
/// takes. Modes past the opcode's arity are always `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
  pub opcode: Opcode,
  pub modes: [Mode; 3],
}

impl Instruction {
  /// Split `word` into its opcode (lowest two decimal digits) and parameter
  /// modes (hundreds digit for the first parameter, thousands for the
  /// second, ...). Digits beyond the opcode's arity are ignored.
  ///
  /// Unknown mode digits and an immediate-mode write parameter are both
  /// rejected here, before the instruction touches memory or I/O.
  pub fn decode(word: i64) -> Result<Self, DecodeError> {
    if word < 0 {
      return Err(DecodeError::Opcode(word));
    }
    let opcode = Opcode::try_from(word % 100).map_err(DecodeError::Opcode)?;
    let mut modes = [Mode::Position; 3];
    let mut digits = word / 100;
    for (parameter, mode) in modes.iter_mut().enumerate().take(opcode.arity()) {
      let digit = digits % 10;
      *mode = Mode::try_from(digit).map_err(|mode| DecodeError::Mode {
        opcode,
        parameter,
        mode,
      })?;
      digits /= 10;
    }
    if let Some(parameter) = opcode.write_parameter() {
      if modes[parameter] == Mode::Immediate {
        return Err(DecodeError::Mode {
          opcode,
          parameter,
          mode: Mode::Immediate as i64,
        });
      }
    }
    Ok(Self { opcode, modes })
  }

  pub fn arity(&self) -> usize {
    self.opcode.arity()
  }

  /// Distance to the next instruction when no jump is taken
  pub fn width(&self) -> usize {
    1 + self.arity()
  }

  /// Modes of the parameters this instruction actually takes
  pub fn parameter_modes(&self) -> &[Mode] {
    &self.modes[..self.arity()]
  }
}

fn operand(mode: Mode, raw: i64) -> String {
  match mode {
    Mode::Position => format!("[{raw}]"),
    Mode::Immediate => format!("{raw}"),
    Mode::Relative if raw < 0 => format!("[rb-{}]", raw.unsigned_abs()),
    Mode::Relative => format!("[rb+{raw}]"),
  }
}

/// Renders an instruction together with the operands that follow it in
/// memory, e.g. `add [9], 3, [rb+1]`.
pub struct Listing<'a> {
  pub instruction: Instruction,
  pub operands: &'a [i64],
}

impl fmt::Display for Listing<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.instruction.opcode)?;
    let modes = self.instruction.parameter_modes();
    for (i, (mode, raw)) in modes.iter().zip(self.operands).enumerate() {
      let sep = if i == 0 { " " } else { ", " };
      write!(f, "{sep}{}", operand(*mode, *raw))?;
    }
    Ok(())
  }
}

/// Linear-sweep disassembly of a program image.
///
/// Every line is `address: text`. Cells that do not decode, or whose operands
/// run past the end of the image, are listed as `data` words.
pub fn disassemble(image: &[i64]) -> Vec<String> {
  let mut lines = Vec::new();
  let mut address = 0;
  while address < image.len() {
    let word = image[address];
    match Instruction::decode(word) {
      Ok(instruction) if address + instruction.width() <= image.len() => {
        let operands = &image[address + 1..address + instruction.width()];
        let listing = Listing {
          instruction,
          operands,
        };
        lines.push(format!("{address:>5}: {listing}"));
        address += instruction.width();
      }
      _ => {
        lines.push(format!("{address:>5}: data {word}"));
        address += 1;
      }
    }
  }
  lines
}
