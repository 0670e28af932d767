//! Core custody-transfer primitives shared across crates.
//!
//! Includes custody identifiers, signal reason codes, `ipn` endpoints and
//! routes, and the ordered custody-ID range set.

pub mod error;
pub mod rangeset;
pub mod types;

pub use error::FerryError;
pub use rangeset::{CidRange, CidRangeSet};
pub use types::{
    CustodyId, Endpoint, ReasonCode, Route, REASON_BLOCK_UNINTELLIGIBLE, REASON_DEPLETED_STORAGE,
    REASON_DEST_UNINTELLIGIBLE, REASON_NO_INFO, REASON_NO_ROUTE, REASON_NO_TIMELY_CONTACT,
    REASON_REDUNDANT_RECEPTION,
};
