use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ferry_codec::acs::{parse_signal, SignalStatus};
use ferry_codec::CodecError;
use ferry_core::types::{CustodyId, Endpoint, ReasonCode};
use ferry_core::CidRange;

use crate::courier::BundleCourier;
use crate::error::CustodyError;
use crate::state::CustodyChannel;
use crate::sweep::flush_signals;

/// One inbound claim: a bundle offered for acceptance, or a decoded
/// aggregate custody signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyClaim {
    /// The peer offers custody of the bundle tracked under `cid`.
    Transfer { cid: CustodyId },
    /// The peer acknowledges (or refuses) custody of the covered CIDs.
    Signal {
        status: SignalStatus,
        ranges: Vec<CidRange>,
    },
}

/// The acknowledging peer plus one parsed inbound claim.
///
/// Transient: built from wire bytes or directly, consumed by `receive`
/// or `accept_custody`, then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Custodian {
    /// Peer the claim came from.
    pub endpoint: Endpoint,
    pub claim: CustodyClaim,
}

impl Custodian {
    /// A peer offering custody of one bundle.
    pub fn transfer(endpoint: Endpoint, cid: CustodyId) -> Self {
        Custodian {
            endpoint,
            claim: CustodyClaim::Transfer { cid },
        }
    }

    /// Parses an aggregate-custody-signal record into a claim.
    ///
    /// A malformed record fails here, before any channel state is
    /// touched.
    pub fn from_signal_bytes(endpoint: Endpoint, bytes: &[u8]) -> Result<Self, CodecError> {
        let (summary, ranges) = parse_signal(bytes)?;
        Ok(Custodian {
            endpoint,
            claim: CustodyClaim::Signal {
                status: summary.status,
                ranges,
            },
        })
    }
}

/// Timing inputs for `receive`.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveParams {
    /// Caller clock, used when acceptance forces a signal flush.
    pub now: u64,
    /// Forwarded to courier calls so implementations can bound their
    /// storage waits; the custody core itself never blocks.
    pub timeout_secs: u64,
}

/// Result of `accept_custody`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub cid: CustodyId,
    /// False when the CID was already covered (duplicate reception).
    pub newly_accepted: bool,
    /// Set once the accepted set has grown to the fill budget; the
    /// caller should flush out of cadence.
    pub flush_recommended: bool,
}

/// Result of `receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Custody of the peer's bundle was accepted locally.
    Accepted {
        cid: CustodyId,
        newly_accepted: bool,
        flush_recommended: bool,
        /// Signals delivered by the forced out-of-cadence flush.
        flushed: usize,
    },
    /// An accepted signal was applied against pending transfers.
    Acknowledged { matched: u64, unknown: u64 },
    /// A refused signal arrived; pending transfers stay in place.
    Refused { covered: u64, reason: ReasonCode },
}

/// Accepts custody of a bundle on behalf of this node.
///
/// Inserts the offered CID into the acceptance-side range set for a
/// later flush. Idempotent: a duplicate acceptance changes nothing but
/// is counted.
pub fn accept_custody(
    channel: &mut CustodyChannel,
    custodian: &Custodian,
) -> Result<AcceptOutcome, CustodyError> {
    if custodian.endpoint != channel.route.destination {
        warn!(
            peer = %custodian.endpoint,
            expected = %channel.route.destination,
            "custody offer from unexpected peer"
        );
        return Err(CustodyError::PeerMismatch);
    }
    let cid = match custodian.claim {
        CustodyClaim::Transfer { cid } => cid,
        CustodyClaim::Signal { .. } => {
            return Err(CustodyError::InvalidParameter(
                "signal claim offers no bundle to accept",
            ))
        }
    };

    let newly_accepted = channel.accepted.insert(cid);
    if newly_accepted {
        channel.stats.custody_accepted += 1;
        debug!(cid, "accepted custody");
    } else {
        channel.stats.duplicate_accepts += 1;
        debug!(cid, "duplicate custody acceptance");
    }

    Ok(AcceptOutcome {
        cid,
        newly_accepted,
        flush_recommended: channel.accepted.range_count() >= channel.config.max_fills,
    })
}

/// Drives one inbound claim into the channel.
///
/// A `Transfer` claim is accepted locally and, once the accepted set
/// has outgrown the fill budget, flushed immediately. A `Signal` claim
/// is applied against pending transfers: covered entries are removed
/// and confirmed through `courier.acknowledge`, while a refusal leaves
/// every entry pending for retransmission.
pub fn receive<C: BundleCourier>(
    channel: &mut CustodyChannel,
    courier: &mut C,
    custodian: &Custodian,
    params: ReceiveParams,
) -> Result<ReceiveOutcome, CustodyError> {
    match &custodian.claim {
        CustodyClaim::Transfer { .. } => {
            let accepted = accept_custody(channel, custodian)?;
            let flushed = if accepted.flush_recommended {
                flush_signals(channel, courier, params.now, params.timeout_secs)?
            } else {
                0
            };
            Ok(ReceiveOutcome::Accepted {
                cid: accepted.cid,
                newly_accepted: accepted.newly_accepted,
                flush_recommended: accepted.flush_recommended,
                flushed,
            })
        }
        CustodyClaim::Signal { status, ranges } => {
            if custodian.endpoint != channel.route.destination {
                warn!(
                    peer = %custodian.endpoint,
                    expected = %channel.route.destination,
                    "custody signal from unexpected peer"
                );
                return Err(CustodyError::PeerMismatch);
            }
            Ok(apply_signal(channel, courier, *status, ranges))
        }
    }
}

fn apply_signal<C: BundleCourier>(
    channel: &mut CustodyChannel,
    courier: &mut C,
    status: SignalStatus,
    ranges: &[CidRange],
) -> ReceiveOutcome {
    channel.stats.signals_received += 1;
    let covered = ranges
        .iter()
        .fold(0_u64, |total, range| total.saturating_add(range.cid_count()));

    if !status.accepted {
        channel.stats.refusals += 1;
        warn!(
            covered,
            reason = status.reason.bits(),
            "custody refused; transfers stay pending"
        );
        return ReceiveOutcome::Refused {
            covered,
            reason: status.reason,
        };
    }

    let mut matched = 0_u64;
    for range in ranges {
        let acked: Vec<CustodyId> = channel
            .pending
            .range(range.first..=range.last)
            .map(|(&cid, _)| cid)
            .collect();
        for cid in acked {
            channel.pending.remove(&cid);
            matched += 1;
            if let Err(err) = courier.acknowledge(cid) {
                warn!(cid, error = %err, "courier rejected delivery confirmation");
                channel.stats.courier_failures += 1;
            }
        }
    }

    let unknown = covered.saturating_sub(matched);
    channel.stats.acks_matched += matched;
    channel.stats.acks_unknown += unknown;
    debug!(matched, unknown, "applied aggregate custody signal");
    ReceiveOutcome::Acknowledged { matched, unknown }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ferry_codec::acs::{encode_signal, SignalStatus};
    use ferry_core::types::{REASON_DEPLETED_STORAGE, REASON_NO_INFO};
    use ferry_core::{CidRange, CidRangeSet, Endpoint, Route};

    use super::{accept_custody, receive, Custodian, CustodyClaim, ReceiveOutcome, ReceiveParams};
    use crate::config::CustodyConfig;
    use crate::courier::RecordingCourier;
    use crate::error::CustodyError;
    use crate::state::CustodyChannel;
    use crate::transfer::register_transfer;

    fn peer() -> Endpoint {
        Endpoint::new(20, 1)
    }

    fn open_channel(config: CustodyConfig) -> CustodyChannel {
        let route = Route::new(Endpoint::new(10, 1), peer());
        CustodyChannel::open(route, config).expect("channel should open")
    }

    fn params(now: u64) -> ReceiveParams {
        ReceiveParams {
            now,
            timeout_secs: 30,
        }
    }

    fn signal_custodian(ranges: &[(u64, u64)], accepted: bool) -> Custodian {
        let mut set = CidRangeSet::new();
        for &(first, last) in ranges {
            for cid in first..=last {
                set.insert(cid);
            }
        }
        let status = if accepted {
            SignalStatus::accepted(REASON_NO_INFO)
        } else {
            SignalStatus::refused(REASON_DEPLETED_STORAGE)
        };
        let mut buf = [0_u8; 256];
        let report = encode_signal(&mut buf, 64, &set, status).expect("signal should encode");
        Custodian::from_signal_bytes(peer(), &buf[..report.written])
            .expect("signal should parse")
    }

    #[test]
    fn single_id_signal_acknowledges_exactly_one_transfer() {
        let mut channel = open_channel(CustodyConfig::default());
        let mut courier = RecordingCourier::default();
        for _ in 0..101 {
            register_transfer(&mut channel, Bytes::from_static(b"bundle"), 0);
        }

        let custodian = signal_custodian(&[(100, 100)], true);
        let outcome = receive(&mut channel, &mut courier, &custodian, params(1))
            .expect("signal should apply");

        assert_eq!(outcome, ReceiveOutcome::Acknowledged { matched: 1, unknown: 0 });
        assert!(!channel.pending.contains_key(&100));
        assert_eq!(channel.pending.len(), 100);
        assert_eq!(courier.acknowledged, vec![100]);
    }

    #[test]
    fn signal_ranges_remove_every_covered_transfer() {
        let mut channel = open_channel(CustodyConfig::default());
        let mut courier = RecordingCourier::default();
        for _ in 0..12 {
            register_transfer(&mut channel, Bytes::from_static(b"bundle"), 0);
        }

        let custodian = signal_custodian(&[(5, 7), (10, 11)], true);
        let outcome = receive(&mut channel, &mut courier, &custodian, params(1))
            .expect("signal should apply");

        assert_eq!(outcome, ReceiveOutcome::Acknowledged { matched: 5, unknown: 0 });
        assert_eq!(courier.acknowledged, vec![5, 6, 7, 10, 11]);
        assert_eq!(channel.stats.acks_matched, 5);
    }

    #[test]
    fn unknown_cids_are_counted_not_failed() {
        let mut channel = open_channel(CustodyConfig::default());
        let mut courier = RecordingCourier::default();
        register_transfer(&mut channel, Bytes::from_static(b"bundle"), 0);

        let custodian = signal_custodian(&[(0, 4)], true);
        let outcome = receive(&mut channel, &mut courier, &custodian, params(1))
            .expect("signal should apply");

        assert_eq!(outcome, ReceiveOutcome::Acknowledged { matched: 1, unknown: 4 });
        assert_eq!(channel.stats.acks_unknown, 4);
    }

    #[test]
    fn refused_signal_leaves_transfers_pending() {
        let mut channel = open_channel(CustodyConfig::default());
        let mut courier = RecordingCourier::default();
        let cid = register_transfer(&mut channel, Bytes::from_static(b"bundle"), 0);

        let custodian = signal_custodian(&[(cid, cid)], false);
        let outcome = receive(&mut channel, &mut courier, &custodian, params(1))
            .expect("refusal should apply");

        assert_eq!(
            outcome,
            ReceiveOutcome::Refused { covered: 1, reason: REASON_DEPLETED_STORAGE }
        );
        assert!(channel.pending.contains_key(&cid));
        assert!(courier.acknowledged.is_empty());
        assert_eq!(channel.stats.refusals, 1);
    }

    #[test]
    fn acceptance_is_idempotent_and_counted() {
        let mut channel = open_channel(CustodyConfig::default());
        let custodian = Custodian::transfer(peer(), 42);

        let first = accept_custody(&mut channel, &custodian).expect("accept should work");
        assert!(first.newly_accepted);
        assert!(!first.flush_recommended);

        let second = accept_custody(&mut channel, &custodian).expect("accept should work");
        assert!(!second.newly_accepted);
        assert!(channel.accepted.contains(42));
        assert_eq!(channel.stats.custody_accepted, 1);
        assert_eq!(channel.stats.duplicate_accepts, 1);
    }

    #[test]
    fn acceptance_past_the_fill_budget_forces_a_flush() {
        let config = CustodyConfig {
            max_fills: 2,
            ..CustodyConfig::default()
        };
        let mut channel = open_channel(config);
        let mut courier = RecordingCourier::default();

        let first = receive(
            &mut channel,
            &mut courier,
            &Custodian::transfer(peer(), 1),
            params(3),
        )
        .expect("accept should work");
        assert_eq!(
            first,
            ReceiveOutcome::Accepted {
                cid: 1,
                newly_accepted: true,
                flush_recommended: false,
                flushed: 0,
            }
        );

        // A second isolated CID reaches the two-fill budget.
        let second = receive(
            &mut channel,
            &mut courier,
            &Custodian::transfer(peer(), 9),
            params(3),
        )
        .expect("accept should work");
        assert_eq!(
            second,
            ReceiveOutcome::Accepted {
                cid: 9,
                newly_accepted: true,
                flush_recommended: true,
                flushed: 1,
            }
        );
        assert!(channel.accepted.is_empty());
        assert_eq!(courier.signals.len(), 1);
        assert_eq!(courier.last_signal_timeout, Some(30));
        assert_eq!(channel.last_flush_at, 3);
    }

    #[test]
    fn claims_from_the_wrong_peer_are_rejected() {
        let mut channel = open_channel(CustodyConfig::default());
        let mut courier = RecordingCourier::default();
        let stranger = Custodian::transfer(Endpoint::new(99, 1), 1);

        assert!(matches!(
            accept_custody(&mut channel, &stranger),
            Err(CustodyError::PeerMismatch)
        ));

        let stray_signal = Custodian {
            endpoint: Endpoint::new(99, 1),
            claim: CustodyClaim::Signal {
                status: SignalStatus::accepted(REASON_NO_INFO),
                ranges: vec![CidRange::single(1)],
            },
        };
        assert!(matches!(
            receive(&mut channel, &mut courier, &stray_signal, params(0)),
            Err(CustodyError::PeerMismatch)
        ));
        assert!(channel.accepted.is_empty());
    }

    #[test]
    fn accept_custody_rejects_signal_claims() {
        let mut channel = open_channel(CustodyConfig::default());
        let custodian = signal_custodian(&[(1, 1)], true);
        assert!(matches!(
            accept_custody(&mut channel, &custodian),
            Err(CustodyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn malformed_signal_bytes_never_build_a_custodian() {
        // A gap varint with no trailing length.
        let err = Custodian::from_signal_bytes(peer(), &[0x80, 0x05, 0x02, 0x02])
            .expect_err("partial fill pair should be rejected");
        assert!(matches!(err, ferry_codec::CodecError::Truncated(_)));
    }
}
