use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ferry_codec::acs::{encode_signal, SignalStatus};
use ferry_core::types::{CustodyId, REASON_NO_INFO};

use crate::courier::BundleCourier;
use crate::error::CustodyError;
use crate::state::CustodyChannel;

/// Timing inputs for one sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepParams {
    /// Seconds between retransmissions of one entry.
    pub period_secs: u64,
    /// Seconds a transfer may stay pending before abandonment.
    pub timeout_secs: u64,
    /// Caller clock.
    pub now: u64,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// CIDs re-issued through the courier this sweep.
    pub retransmitted: Vec<CustodyId>,
    /// CIDs that exhausted their time or retry budget: delivery
    /// failures for those entries, not a call failure.
    pub abandoned: Vec<CustodyId>,
    /// Outbound aggregate signals delivered.
    pub signals_sent: usize,
    /// `generate` calls the courier rejected; those entries keep their
    /// deadline and retry on the next sweep.
    pub generate_failures: usize,
}

/// The scheduling tick: abandon, retransmit, then flush.
///
/// Non-blocking and safe at any cadence. No entry retransmits more
/// often than `period_secs`, and an entry removed by a prior `receive`
/// is never re-issued.
pub fn sweep<C: BundleCourier>(
    channel: &mut CustodyChannel,
    courier: &mut C,
    params: SweepParams,
) -> Result<SweepReport, CustodyError> {
    let mut report = SweepReport::default();

    let expired: Vec<CustodyId> = channel
        .pending
        .iter()
        .filter(|(_, entry)| {
            params.now.saturating_sub(entry.enqueued_at) >= params.timeout_secs
                || entry.retries >= channel.config.max_retries
        })
        .map(|(&cid, _)| cid)
        .collect();
    for cid in expired {
        channel.pending.remove(&cid);
        channel.stats.abandoned += 1;
        warn!(cid, "abandoned custody transfer");
        report.abandoned.push(cid);
    }

    let due: Vec<CustodyId> = channel
        .pending
        .iter()
        .filter(|(_, entry)| entry.deadline <= params.now)
        .map(|(&cid, _)| cid)
        .collect();
    for cid in due {
        let Some(bundle) = channel.pending.get(&cid).map(|entry| entry.bundle.clone()) else {
            continue;
        };
        match courier.generate(cid, &bundle, params.timeout_secs) {
            Ok(()) => {
                if let Some(entry) = channel.pending.get_mut(&cid) {
                    entry.retries += 1;
                    entry.deadline = params.now.saturating_add(params.period_secs);
                    debug!(cid, retries = entry.retries, "retransmitted custody transfer");
                }
                channel.stats.retransmissions += 1;
                report.retransmitted.push(cid);
            }
            Err(err) => {
                warn!(cid, error = %err, "courier rejected retransmission");
                channel.stats.courier_failures += 1;
                report.generate_failures += 1;
            }
        }
    }

    let flush_due = !channel.accepted.is_empty()
        && params.now.saturating_sub(channel.last_flush_at) >= channel.config.signal_rate_secs;
    if flush_due {
        report.signals_sent = flush_signals(channel, courier, params.now, params.timeout_secs)?;
    }

    Ok(report)
}

/// Sweep using the channel's configured period and timeout.
pub fn sweep_with_config<C: BundleCourier>(
    channel: &mut CustodyChannel,
    courier: &mut C,
    now: u64,
) -> Result<SweepReport, CustodyError> {
    let policy = channel.config.transfer_policy();
    sweep(
        channel,
        courier,
        SweepParams {
            period_secs: policy.period_secs,
            timeout_secs: policy.timeout_secs,
            now,
        },
    )
}

/// Flushes the acceptance-side range set as outbound signals.
///
/// Each signal carries up to `max_fills` whole ranges; a truncated
/// encode drains only the ranges it conveyed, and the loop continues
/// until the set is empty, the courier fails, or the buffer cannot
/// carry a single whole fill. Returns the number of signals delivered.
pub fn flush_signals<C: BundleCourier>(
    channel: &mut CustodyChannel,
    courier: &mut C,
    now: u64,
    timeout_secs: u64,
) -> Result<usize, CustodyError> {
    let mut buf = vec![0_u8; channel.config.signal_buffer_len];
    let mut sent = 0_usize;

    while !channel.accepted.is_empty() {
        let report = encode_signal(
            &mut buf,
            channel.config.max_fills,
            &channel.accepted,
            SignalStatus::accepted(REASON_NO_INFO),
        )?;
        if report.truncated && report.fills == 0 {
            // Not even one whole fill fits, so the loop cannot make
            // progress; validated configs keep the buffer above this.
            warn!(
                buffer_len = buf.len(),
                "signal buffer cannot carry a fill pair"
            );
            break;
        }
        match courier.deliver_signal(
            &channel.route.destination,
            &buf[..report.written],
            timeout_secs,
        ) {
            Ok(()) => {
                channel.accepted.remove_leading(report.fills);
                channel.stats.signals_sent += 1;
                sent += 1;
                debug!(
                    fills = report.fills,
                    truncated = report.truncated,
                    destination = %channel.route.destination,
                    "flushed aggregate custody signal"
                );
            }
            Err(err) => {
                warn!(error = %err, "courier rejected aggregate custody signal");
                channel.stats.courier_failures += 1;
                break;
            }
        }
    }

    channel.last_flush_at = now;
    Ok(sent)
}
