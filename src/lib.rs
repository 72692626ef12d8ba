//! An IntCode virtual machine
//!
//! Programs are flat lists of signed integers. A [`Vm`] executes one
//! instruction per [`Vm::step`] against an input provider and an output sink
//! supplied by the host, and suspends instead of blocking when input runs dry.
//! [`Computer`] bundles a machine with its I/O for the common single-program
//! case; [`Pipeline`] wires several machines together through single-slot
//! channels and schedules them cooperatively on one thread.

pub mod cancel;
pub mod channel;
pub mod config;
pub mod io;
pub mod memory;
pub mod opcode;
pub mod pipeline;
pub mod program;
mod trace;
pub mod vm;

pub use cancel::CancelToken;
pub use channel::{Channel, ChannelId};
pub use config::{Config, Verbosity};
pub use io::{Input, Output};
pub use memory::Memory;
pub use opcode::{Instruction, Mode, Opcode};
pub use pipeline::{Pipeline, StageId};
pub use program::{Image, Program};
pub use vm::{Computer, Error, State, Vm};
