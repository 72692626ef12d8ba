use std::num::ParseIntError;
use std::str::FromStr;

/// Anything a machine can copy its initial memory from
pub trait Image {
  fn words(&self) -> &[i64];
}

/// A `Program` is the initial memory image of an IntCode machine.
///
/// Machines copy the image when they are built, so one program can back any
/// number of machines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
  words: Vec<i64>,
}

impl Program {
  /// Overwrite a single cell of the image, growing it with zeroes if needed
  pub fn patch(&mut self, address: usize, value: i64) {
    if address >= self.words.len() {
      self.words.resize(address + 1, 0);
    }
    self.words[address] = value;
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }
}

impl From<Vec<i64>> for Program {
  fn from(words: Vec<i64>) -> Self {
    Self { words }
  }
}

impl From<&[i64]> for Program {
  fn from(words: &[i64]) -> Self {
    Self {
      words: words.to_vec(),
    }
  }
}

impl Image for Program {
  fn words(&self) -> &[i64] {
    &self.words
  }
}

impl Image for [i64] {
  fn words(&self) -> &[i64] {
    self
  }
}

impl Image for Vec<i64> {
  fn words(&self) -> &[i64] {
    self
  }
}

impl<const N: usize> Image for [i64; N] {
  fn words(&self) -> &[i64] {
    self
  }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("word {index} ({token:?}) is not an integer")]
pub struct ParseError {
  pub index: usize,
  pub token: String,
  #[source]
  pub source: ParseIntError,
}

impl FromStr for Program {
  type Err = ParseError;

  /// Parse the usual text form: signed decimal words separated by commas.
  /// Surrounding whitespace and a trailing comma are accepted.
  fn from_str(text: &str) -> Result<Self, Self::Err> {
    let text = text.trim();
    let text = text.strip_suffix(',').unwrap_or(text);
    if text.is_empty() {
      return Ok(Self::default());
    }
    let words = text
      .split(',')
      .enumerate()
      .map(|(index, token)| {
        let token = token.trim();
        token.parse::<i64>().map_err(|source| ParseError {
          index,
          token: token.to_owned(),
          source,
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { words })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_line() {
    let program: Program = "1,9,10,3,2,3,11,0,99,30,40,50\n".parse().unwrap();
    assert_eq!(program.words(), &[1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50]);
  }

  #[test]
  fn parses_negative_and_spaced() {
    let program: Program = " 109, -1 ,204,-1,\n".parse().unwrap();
    assert_eq!(program.words(), &[109, -1, 204, -1]);
  }

  #[test]
  fn parses_large_words() {
    let program: Program = "104,1125899906842624,99".parse().unwrap();
    assert_eq!(program.words()[1], 1_125_899_906_842_624);
  }

  #[test]
  fn empty_text_is_empty_program() {
    let program: Program = "  \n".parse().unwrap();
    assert!(program.is_empty());
  }

  #[test]
  fn reports_bad_word() {
    let err = "1,2,x,4".parse::<Program>().unwrap_err();
    assert_eq!(err.index, 2);
    assert_eq!(err.token, "x");
  }

  #[test]
  fn patch_grows() {
    let mut program = Program::from(vec![1, 0, 0]);
    program.patch(1, 12);
    program.patch(5, 2);
    assert_eq!(program.words(), &[1, 12, 0, 0, 0, 2]);
  }
}
