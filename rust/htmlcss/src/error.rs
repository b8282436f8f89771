//! Error types for pool and dictionary operations.
//!
//! Only allocation failures are errors. A missing key, an out-of-range
//! index or removing an absent key are ordinary negative results and are
//! reported through `Option`.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The string pool could not grow its tables.
    #[error("string pool allocation failed")]
    PoolAlloc(#[source] TryReserveError),

    /// The string pool ran out of 32-bit ids.
    #[error("string pool exhausted ({count} strings)")]
    PoolExhausted { count: usize },

    /// The dictionary could not grow its pair array.
    #[error("dictionary growth to {requested} pairs failed")]
    DictAlloc {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Result type alias for pool and dictionary operations.
pub type Result<T> = std::result::Result<T, Error>;
