use std::collections::TryReserveError;

use thiserror::Error;

use crate::record::Key;

/// Error enumerates over all possible errors that this package
/// shall return.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Node slots could not be allocated, index is left unchanged.
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    /// Fatal case, index entries are not in sort-order.
    #[error("sort error, key {0} out of order with ancestor {1}")]
    SortError(Key, Key),
    /// Fatal case, sub-tree heights under `key` differ by more than one.
    #[error("unbalanced node {key}, left: {left} right: {right}")]
    Unbalanced { key: Key, left: i32, right: i32 },
    /// Fatal case, cached height does not match the computed height.
    #[error("height mismatch at {key}, cached: {cached} actual: {actual}")]
    HeightMismatch { key: Key, cached: i32, actual: i32 },
    /// Fatal case, nodes reachable from root differ from entry count.
    #[error("count mismatch, expected: {expected} actual: {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Error {
        Error::OutOfMemory(err.to_string())
    }
}
