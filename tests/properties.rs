//! Property-based tests for the machine.
//!
//! Uses proptest to check invariants across generated programs and inputs.

use std::collections::VecDeque;

use intcode::io::{Discard, NoInput};
use intcode::{Computer, Error, Instruction, Memory, Mode, Opcode, State, Vm};
use proptest::prelude::*;

// ========================================================================
// Memory
// ========================================================================

proptest! {
  /// Reading a cell that was never written yields zero and leaves the
  /// existing cells alone.
  #[test]
  fn prop_unwritten_reads_zero(
    image in prop::collection::vec(any::<i64>(), 0..32),
    address in 0i64..4096,
  ) {
    let mut memory = Memory::new(&image);
    let value = memory.read(address).unwrap();
    if (address as usize) < image.len() {
      prop_assert_eq!(value, image[address as usize]);
    } else {
      prop_assert_eq!(value, 0);
      prop_assert_eq!(memory.len(), address as usize + 1);
    }
    prop_assert_eq!(&memory.as_slice()[..image.len()], &image[..]);
  }

  /// Writing past the end extends memory without disturbing earlier cells.
  #[test]
  fn prop_write_extends(
    image in prop::collection::vec(any::<i64>(), 0..32),
    address in 0i64..4096,
    value in any::<i64>(),
  ) {
    let mut memory = Memory::new(&image);
    memory.write(address, value).unwrap();
    prop_assert_eq!(memory.read(address).unwrap(), value);
    prop_assert!(memory.len() >= image.len());
    for (i, original) in image.iter().enumerate() {
      if i as i64 != address {
        prop_assert_eq!(memory.as_slice()[i], *original);
      }
    }
  }

  /// Negative addresses are always rejected.
  #[test]
  fn prop_negative_rejected(address in i64::MIN..0) {
    let mut memory = Memory::new(&[1, 2, 3]);
    prop_assert!(memory.read(address).is_err());
    prop_assert!(memory.write(address, 0).is_err());
    prop_assert_eq!(memory.len(), 3);
  }
}

// ========================================================================
// Decoder
// ========================================================================

fn read_mode() -> impl Strategy<Value = i64> {
  prop_oneof![Just(0i64), Just(1), Just(2)]
}

fn write_mode() -> impl Strategy<Value = i64> {
  prop_oneof![Just(0i64), Just(2)]
}

proptest! {
  /// Mode digits come back in parameter order.
  #[test]
  fn prop_decode_modes(a in read_mode(), b in read_mode(), c in write_mode()) {
    let word = c * 10000 + b * 1000 + a * 100 + 1;
    let instruction = Instruction::decode(word).unwrap();
    prop_assert_eq!(instruction.opcode, Opcode::Add);
    let expected: Vec<Mode> = [a, b, c]
      .iter()
      .map(|digit| Mode::try_from(*digit).unwrap())
      .collect();
    prop_assert_eq!(instruction.parameter_modes(), &expected[..]);
  }

  /// Any immediate write parameter is refused, for every writing opcode.
  #[test]
  fn prop_immediate_write_rejected(
    opcode in prop_oneof![Just(1i64), Just(2), Just(7), Just(8)],
    a in read_mode(),
    b in read_mode(),
  ) {
    let word = 10000 + b * 1000 + a * 100 + opcode;
    let image = [word, 0, 0, 0, 99];
    let mut vm = Vm::new(&image);
    let result = vm.step(&mut NoInput, &mut Discard);
    prop_assert!(
      matches!(result, Err(Error::InvalidMode { parameter: 2, mode: 1, .. })),
      "{} gave {:?}",
      word,
      result
    );
    prop_assert_eq!(vm.memory().as_slice(), &image[..]);
  }
}

// ========================================================================
// Execution
// ========================================================================

proptest! {
  /// Setting the relative base to `base` and writing at relative offset
  /// `offset` touches the same cell as a position-mode write to
  /// `base + offset`.
  #[test]
  fn prop_relative_base_equivalence(
    base in 0i64..500,
    offset in -100i64..500,
    a in any::<i32>(),
    b in any::<i32>(),
  ) {
    prop_assume!(base + offset >= 12);
    let (a, b) = (i64::from(a), i64::from(b));

    // arb base; add a, b -> [rb+offset]; halt
    let relative = [109, base, 21101, a, b, offset, 99];
    // add a, b -> [base+offset]; halt
    let position = [1101, a, b, base + offset, 99];

    let mut left = Vm::new(&relative);
    prop_assert_eq!(left.resume(&mut NoInput, &mut Discard), Ok(State::Halted));
    let mut right = Vm::new(&position);
    prop_assert_eq!(right.resume(&mut NoInput, &mut Discard), Ok(State::Halted));

    let target = (base + offset) as usize;
    prop_assert_eq!(left.memory()[target], a + b);
    prop_assert_eq!(right.memory()[target], a + b);
    prop_assert_eq!(left.memory().len(), right.memory().len());
  }

  /// Identical program and input give identical output and final memory.
  #[test]
  fn prop_deterministic(inputs in prop::collection::vec(-1000i64..1000, 1..20)) {
    // sums its inputs until it reads a zero-length count: reads n, then n values
    let image = [
      3, 100, // in n
      1006, 100, 20, // jz n -> halt
      3, 101, // in x
      1, 101, 102, 102, // sum += x
      4, 102, // out sum
      1001, 100, -1, 100, // n -= 1
      1105, 1, 2, // loop
      99,
    ];
    let mut feed = vec![inputs.len() as i64];
    feed.extend(&inputs);

    let run = || {
      let mut computer = Computer::new(&image, VecDeque::from(feed.clone()), Vec::new());
      let state = computer.run();
      let (vm, _, output) = computer.into_parts();
      (state, vm.memory().clone(), output)
    };
    let first = run();
    let second = run();
    prop_assert_eq!(&first.0, &Ok(State::Halted));
    prop_assert_eq!(&first, &second);

    let mut sum = 0;
    let expected: Vec<i64> = inputs.iter().map(|x| { sum += x; sum }).collect();
    prop_assert_eq!(first.2, expected);
  }
}
