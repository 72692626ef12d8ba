/// The largest number of cells a machine will allocate unless configured
/// otherwise (`1 << 24` cells, 128 MiB of `i64`s)
pub const DEFAULT_LIMIT: usize = 1 << 24;

/// A failed attempt to touch a memory cell
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
  #[error("address {0} is negative")]
  Negative(i64),

  #[error("address {address} is beyond the memory limit of {limit} cells")]
  Limit { address: i64, limit: usize },
}

impl AccessError {
  /// The address that could not be accessed
  pub fn address(&self) -> i64 {
    match self {
      Self::Negative(address) => *address,
      Self::Limit { address, .. } => *address,
    }
  }
}

/// A growable tape of signed words.
///
/// Any access past the end zero-fills the tape up to and including the
/// addressed cell, so a cell that was never written reads as `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
  cells: Vec<i64>,
  limit: usize,
}

impl Memory {
  /// Create memory holding a copy of `image`
  pub fn new(image: &[i64]) -> Self {
    Self::with_limit(image, DEFAULT_LIMIT)
  }

  /// Create memory holding a copy of `image` that never grows past `limit`
  /// cells
  pub fn with_limit(image: &[i64], limit: usize) -> Self {
    Self {
      cells: image.to_vec(),
      limit: limit.max(image.len()),
    }
  }

  pub fn read(&mut self, address: i64) -> Result<i64, AccessError> {
    let index = self.grow_to(address)?;
    Ok(self.cells[index])
  }

  pub fn write(&mut self, address: i64, value: i64) -> Result<(), AccessError> {
    let index = self.grow_to(address)?;
    self.cells[index] = value;
    Ok(())
  }

  /// Number of cells currently backed by storage
  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn as_slice(&self) -> &[i64] {
    &self.cells
  }

  fn grow_to(&mut self, address: i64) -> Result<usize, AccessError> {
    let index: usize = address
      .try_into()
      .map_err(|_| AccessError::Negative(address))?;
    if index >= self.limit {
      return Err(AccessError::Limit {
        address,
        limit: self.limit,
      });
    }
    if index >= self.cells.len() {
      self.cells.resize(index + 1, 0);
    }
    Ok(index)
  }
}

impl std::ops::Index<usize> for Memory {
  type Output = i64;

  fn index(&self, index: usize) -> &Self::Output {
    &self.cells[index]
  }
}
