use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use intcode::io::{sink_fn, Flow};
use intcode::opcode::disassemble;
use intcode::{Computer, Config, Image, Input, Output, Pipeline, Program, State, Verbosity};

#[derive(Parser, Debug)]
#[command(name = "intcode")]
#[command(about = "Run IntCode programs", long_about = None)]
struct Cli {
  /// Increase diagnostics on stderr (-v lifecycle, -vv every instruction)
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  /// Largest number of memory cells a machine may use
  #[arg(long, global = true)]
  memory_limit: Option<usize>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run one program; inputs come from --input, then from stdin
  Run {
    #[command(flatten)]
    program: ProgramArgs,

    /// Comma-separated values fed to the program before stdin is read
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    input: Vec<i64>,

    /// Print memory[0] after the program halts
    #[arg(long, action = ArgAction::SetTrue)]
    result: bool,
  },

  /// Run copies of a program in a line, each seeded with a phase setting
  Chain {
    #[command(flatten)]
    program: ProgramArgs,

    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    phases: Vec<i64>,
  },

  /// Run copies of a program in a feedback loop, each seeded with a phase
  /// setting
  Feedback {
    #[command(flatten)]
    program: ProgramArgs,

    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    phases: Vec<i64>,
  },

  /// Print a linear listing of a program
  Disassemble {
    #[command(flatten)]
    program: ProgramArgs,
  },
}

#[derive(Args, Debug)]
struct ProgramArgs {
  /// Path to a comma-separated program image
  file: PathBuf,

  /// Overwrite a cell before running, as ADDRESS=VALUE
  #[arg(long, value_parser = parse_patch)]
  patch: Vec<(usize, i64)>,
}

fn parse_patch(text: &str) -> Result<(usize, i64), String> {
  let (address, value) = text
    .split_once('=')
    .ok_or_else(|| format!("expected ADDRESS=VALUE, got {text:?}"))?;
  let address = address
    .trim()
    .parse()
    .map_err(|err| format!("bad address {address:?}: {err}"))?;
  let value = value
    .trim()
    .parse()
    .map_err(|err| format!("bad value {value:?}: {err}"))?;
  Ok((address, value))
}

fn load(args: &ProgramArgs) -> Result<Program> {
  let text = fs::read_to_string(&args.file)
    .with_context(|| format!("failed to read {}", args.file.display()))?;
  let mut program: Program = text
    .parse()
    .with_context(|| format!("failed to parse {}", args.file.display()))?;
  for (address, value) in &args.patch {
    program.patch(*address, *value);
  }
  Ok(program)
}

fn config(cli: &Cli, path: &Path) -> Config {
  let label = path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| String::from("intcode"));
  let config = Config::new()
    .label(label)
    .verbosity(Verbosity::from_occurrences(cli.verbose));
  match cli.memory_limit {
    Some(cells) => config.memory_limit(cells),
    None => config,
  }
}

/// Values from the command line first, then one integer per stdin line
struct Terminal {
  queued: VecDeque<i64>,
  stdin: io::StdinLock<'static>,
}

impl Input for Terminal {
  fn read(&mut self) -> Option<i64> {
    if let Some(value) = self.queued.pop_front() {
      return Some(value);
    }
    loop {
      eprint!("Enter input: ");
      let _ = io::stderr().flush();
      let mut line = String::new();
      match self.stdin.read_line(&mut line) {
        Ok(0) | Err(_) => return None,
        Ok(_) => match line.trim().parse() {
          Ok(value) => return Some(value),
          Err(err) => eprintln!("not an integer ({err}), try again"),
        },
      }
    }
  }
}

/// One value per line; a writer that fails stops the program instead of
/// silently dropping its output
fn printer<W: Write>(mut writer: W) -> impl Output {
  sink_fn(move |value| match writeln!(writer, "{value}") {
    Ok(()) => Flow::Continue(()),
    Err(_) => Flow::Break(()),
  })
}

fn run(cli: &Cli, args: &ProgramArgs, input: &[i64], result: bool) -> Result<()> {
  let program = load(args)?;
  let terminal = Terminal {
    queued: input.iter().copied().collect(),
    stdin: io::stdin().lock(),
  };
  let output = printer(io::stdout());
  let mut computer = Computer::with_config(&program, config(cli, &args.file), terminal, output);
  match computer.run()? {
    State::Halted => {}
    State::Cancelled => bail!("stopped: could not write to stdout"),
    state => bail!("program stopped early ({state:?})"),
  }
  if result {
    println!("{}", computer.memory()[0]);
  }
  Ok(())
}

fn signal(mut pipeline: Pipeline) -> Result<()> {
  match pipeline.run()? {
    State::Halted => {}
    state => bail!("pipeline stopped early ({state:?})"),
  }
  match pipeline.signal() {
    Some(value) => println!("{value}"),
    None => bail!("pipeline produced no signal"),
  }
  Ok(())
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  match &cli.command {
    Command::Run {
      program,
      input,
      result,
    } => run(&cli, program, input, *result),
    Command::Chain { program, phases } => {
      let image = load(program)?;
      let config = config(&cli, &program.file);
      signal(Pipeline::chain_with_config(&image, phases, config)?)
    }
    Command::Feedback { program, phases } => {
      let image = load(program)?;
      let config = config(&cli, &program.file);
      signal(Pipeline::feedback_loop_with_config(&image, phases, config)?)
    }
    Command::Disassemble { program } => {
      let image = load(program)?;
      for line in disassemble(image.words()) {
        println!("{line}");
      }
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use intcode::io::NoInput;

  struct Closed;

  impl Write for Closed {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
      Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn printer_writes_lines() {
    let mut buffer = Vec::new();
    let mut sink = printer(&mut buffer);
    assert_eq!(sink.write(-3), Ok(Flow::Continue(())));
    assert_eq!(sink.write(12), Ok(Flow::Continue(())));
    drop(sink);
    assert_eq!(String::from_utf8(buffer).unwrap(), "-3\n12\n");
  }

  #[test]
  fn closed_stdout_stops_the_program() {
    // prints forever
    let image: Program = "104,1,1105,1,0".parse().unwrap();
    let mut computer = Computer::new(&image, NoInput, printer(Closed));
    assert_eq!(computer.run(), Ok(State::Cancelled));
    assert_eq!(computer.vm().steps(), 1);
  }

  #[test]
  fn patch_arguments() {
    assert_eq!(parse_patch("1=12"), Ok((1, 12)));
    assert_eq!(parse_patch(" 2 = -5 "), Ok((2, -5)));
    assert!(parse_patch("12").is_err());
    assert!(parse_patch("-1=0").is_err());
  }
}
