use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ferry_core::error::FerryError;
use ferry_core::types::CustodyId;
use ferry_core::{CidRangeSet, Route};

use crate::config::CustodyConfig;
use crate::error::CustodyError;

/// One bundle awaiting custody acceptance by the peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransfer {
    /// Retained bundle image handed back to the courier on retransmit.
    pub bundle: Bytes,
    /// Registration time; abandonment is measured from here.
    pub enqueued_at: u64,
    /// Next retransmission deadline.
    pub deadline: u64,
    /// Retransmissions already performed.
    pub retries: u32,
}

/// Cumulative per-channel counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Transfers registered on this channel.
    pub registered: u64,
    /// Retransmissions issued by sweeps.
    pub retransmissions: u64,
    /// Transfers abandoned on timeout, retry exhaustion, or close.
    pub abandoned: u64,
    /// Custody acceptances recorded for the peer's bundles.
    pub custody_accepted: u64,
    /// Acceptances of already-covered CIDs.
    pub duplicate_accepts: u64,
    /// Aggregate signals delivered to the courier.
    pub signals_sent: u64,
    /// Inbound signals applied.
    pub signals_received: u64,
    /// Acknowledged CIDs matched to pending transfers.
    pub acks_matched: u64,
    /// Acknowledged CIDs with no matching pending transfer.
    pub acks_unknown: u64,
    /// Refused signals received.
    pub refusals: u64,
    /// Courier call failures observed.
    pub courier_failures: u64,
}

/// Per-channel custody state.
///
/// One channel per custodial relationship; channels are fully isolated.
/// All operations take `&mut`, so callers sharing a channel across
/// threads wrap it in a `Mutex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyChannel {
    /// Endpoint pair this channel serves.
    pub route: Route,
    /// Validated channel configuration.
    pub config: CustodyConfig,
    /// Next custody ID to assign.
    pub next_cid: CustodyId,
    /// Transfers awaiting acknowledgment, keyed by custody ID.
    pub pending: BTreeMap<CustodyId, PendingTransfer>,
    /// Locally accepted CIDs awaiting outbound aggregation.
    pub accepted: CidRangeSet,
    /// Time of the last outbound signal flush.
    pub last_flush_at: u64,
    /// Cumulative counters.
    pub stats: ChannelStats,
}

/// Final accounting returned by `CustodyChannel::close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReport {
    /// CIDs still pending at teardown, reported as delivery failures.
    pub abandoned: Vec<CustodyId>,
    /// Accepted-CID ranges never flushed into an outbound signal.
    pub unflushed_ranges: usize,
    /// Final channel counters, abandonments included.
    pub stats: ChannelStats,
}

impl CustodyChannel {
    /// Opens a channel after validating its route and config.
    pub fn open(route: Route, config: CustodyConfig) -> Result<Self, CustodyError> {
        route.validate().map_err(|err| match err {
            FerryError::InvalidRoute(detail) | FerryError::InvalidEndpoint(detail) => {
                CustodyError::InvalidParameter(detail)
            }
        })?;
        config.validate()?;
        Ok(CustodyChannel {
            route,
            config,
            next_cid: 0,
            pending: BTreeMap::new(),
            accepted: CidRangeSet::new(),
            last_flush_at: 0,
            stats: ChannelStats::default(),
        })
    }

    /// Tears the channel down, reporting every still-pending CID.
    ///
    /// Entries still requesting custody are abandoned, never silently
    /// dropped: the report records that they were never acknowledged.
    pub fn close(mut self) -> CloseReport {
        let abandoned: Vec<CustodyId> = self.pending.keys().copied().collect();
        if !abandoned.is_empty() {
            warn!(
                count = abandoned.len(),
                destination = %self.route.destination,
                "closing channel with unacknowledged transfers"
            );
            self.stats.abandoned += abandoned.len() as u64;
        }
        CloseReport {
            abandoned,
            unflushed_ranges: self.accepted.range_count(),
            stats: self.stats,
        }
    }
}
