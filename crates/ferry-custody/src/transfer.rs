use bytes::Bytes;
use tracing::debug;

use ferry_core::types::CustodyId;

use crate::state::{CustodyChannel, PendingTransfer};

/// Registers a bundle as requiring custody acceptance.
///
/// Assigns the channel's next CID and arms the first retransmission
/// deadline one period out; the caller has already transmitted the
/// bundle once. Returns the assigned CID.
pub fn register_transfer(channel: &mut CustodyChannel, bundle: Bytes, now: u64) -> CustodyId {
    let cid = channel.next_cid;
    channel.next_cid += 1;

    let deadline = now.saturating_add(channel.config.retransmit_period_secs);
    channel.pending.insert(
        cid,
        PendingTransfer {
            bundle,
            enqueued_at: now,
            deadline,
            retries: 0,
        },
    );
    channel.stats.registered += 1;
    debug!(cid, deadline, "registered custody transfer");
    cid
}

/// Withdraws one pending transfer; true when it was still pending.
pub fn cancel_transfer(channel: &mut CustodyChannel, cid: CustodyId) -> bool {
    let removed = channel.pending.remove(&cid).is_some();
    if removed {
        channel.stats.abandoned += 1;
        debug!(cid, "cancelled custody transfer");
    }
    removed
}
