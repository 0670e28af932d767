use thiserror::Error;

/// Errors returned by wire codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Buffer ended before a complete field.
    #[error("truncated record: {0}")]
    Truncated(&'static str),
    /// Varint value does not fit in 64 bits.
    #[error("varint overflow")]
    Overflow,
    /// Output buffer cannot hold the record head.
    #[error("buffer too small: {0}")]
    BufferTooSmall(&'static str),
    /// Whole-record validation failure; no partial results are surfaced.
    #[error("malformed record: {0}")]
    Malformed(&'static str),
}
