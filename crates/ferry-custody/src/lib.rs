//! Custody-transfer controller for bundle channels.
//!
//! This crate drives the custody lifecycle on top of the wire primitives:
//! registering transfers pending acceptance, sweeping them for timed
//! retransmission, applying inbound custody signals, and aggregating
//! locally accepted custody IDs into outbound signals.

pub mod config;
pub mod courier;
pub mod error;
pub mod receive;
pub mod state;
pub mod sweep;
pub mod transfer;
