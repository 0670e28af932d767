//! Custody-transfer wire primitives.
//!
//! Defines the SDNV varint pair, aggregate-custody-signal records, and
//! the CRC parameter sets offered for block integrity.

pub mod acs;
pub mod crc;
pub mod error;
pub mod sdnv;

pub use error::CodecError;
