//! Aggregate custody signal records.
//!
//! One record acknowledges many custody IDs: a status byte, the first
//! covered CID as its base, then run-length fills. Each fill after the
//! first is a `(gap, length)` SDNV pair where `gap` skips unacknowledged
//! IDs and `length` is `last - first` of the conveyed range; the first
//! fill carries only its length because the base already names its start.

use serde::{Deserialize, Serialize};

use ferry_core::types::ReasonCode;
use ferry_core::{CidRange, CidRangeSet};

use crate::error::CodecError;
use crate::sdnv;

/// Administrative-record type byte carried ahead of a signal payload.
pub const ACS_RECORD_TYPE: u8 = 0x40;
/// Status-byte bit set when custody was accepted rather than refused.
pub const ACS_ACK_MASK: u8 = 0x80;

/// Recognizes an administrative record carrying an aggregate signal.
pub fn is_acs_record(bytes: &[u8]) -> bool {
    bytes.first().map_or(false, |byte| *byte == ACS_RECORD_TYPE)
}

/// Decoded status byte: acceptance flag plus reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStatus {
    pub accepted: bool,
    pub reason: ReasonCode,
}

impl SignalStatus {
    pub fn accepted(reason: ReasonCode) -> Self {
        SignalStatus {
            accepted: true,
            reason,
        }
    }

    pub fn refused(reason: ReasonCode) -> Self {
        SignalStatus {
            accepted: false,
            reason,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mask = if self.accepted { ACS_ACK_MASK } else { 0 };
        mask | self.reason.bits()
    }

    pub fn from_byte(byte: u8) -> Self {
        SignalStatus {
            accepted: byte & ACS_ACK_MASK != 0,
            reason: ReasonCode::from_status_bits(byte),
        }
    }
}

/// Outcome of one signal encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeReport {
    /// Signal length in bytes; the record is `buf[..written]`.
    pub written: usize,
    /// Complete ranges conveyed, one fill each. After a truncated
    /// flush the caller drains exactly this many leading ranges.
    pub fills: usize,
    /// Set when the fill budget or buffer capacity deferred a
    /// remainder; the partial signal is still valid.
    pub truncated: bool,
}

/// Encodes the lowest ranges of `set` into `buf`.
///
/// Ranges are always encoded whole. A range that would exceed
/// `max_fills` or the buffer is deferred and reported via `truncated`,
/// never split. An empty set encodes to the status byte alone.
pub fn encode_signal(
    buf: &mut [u8],
    max_fills: usize,
    set: &CidRangeSet,
    status: SignalStatus,
) -> Result<EncodeReport, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::BufferTooSmall("no room for status byte"));
    }
    buf[0] = status.to_byte();
    let mut offset = 1;

    let base = match set.first() {
        Some(range) => range.first,
        None => {
            return Ok(EncodeReport {
                written: offset,
                fills: 0,
                truncated: false,
            })
        }
    };
    // The head (status + base) cannot be deferred; everything after it can.
    offset = sdnv::write(buf, offset, base)
        .map_err(|_| CodecError::BufferTooSmall("no room for base cid"))?;

    let mut fills = 0_usize;
    let mut truncated = false;
    let mut previous_last = base;
    for (index, range) in set.ranges().enumerate() {
        let length = range.last - range.first;
        let gap = if index == 0 {
            None
        } else {
            // Disjoint, non-adjacent ranges keep this >= 1.
            Some(range.first - previous_last - 1)
        };
        let needed = sdnv::len(length) + gap.map_or(0, sdnv::len);
        if fills >= max_fills || buf.len() - offset < needed {
            truncated = true;
            break;
        }
        if let Some(gap) = gap {
            offset = sdnv::write(buf, offset, gap)?;
        }
        offset = sdnv::write(buf, offset, length)?;
        fills += 1;
        previous_last = range.last;
    }

    Ok(EncodeReport {
        written: offset,
        fills,
        truncated,
    })
}

/// Summary of one decoded signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSummary {
    pub status: SignalStatus,
    /// Total CIDs covered by the conveyed ranges.
    pub num_acks: u64,
}

/// Decodes a signal, invoking `on_range` once per contiguous range.
///
/// The whole record is validated before the first callback fires, so a
/// malformed record reports nothing at all. A one-byte record is the
/// valid empty signal.
pub fn decode_signal(
    bytes: &[u8],
    mut on_range: impl FnMut(CidRange),
) -> Result<SignalSummary, CodecError> {
    let status_byte = *bytes
        .first()
        .ok_or(CodecError::Truncated("empty record"))?;
    let status = SignalStatus::from_byte(status_byte);
    if bytes.len() == 1 {
        return Ok(SignalSummary {
            status,
            num_acks: 0,
        });
    }

    let (base, mut offset) = sdnv::read(bytes, 1)?;

    let mut ranges: Vec<CidRange> = Vec::new();
    let mut previous_last = base;
    let mut num_acks: u64 = 0;
    while offset < bytes.len() {
        let first = if ranges.is_empty() {
            base
        } else {
            let (gap, next) = sdnv::read(bytes, offset)?;
            offset = next;
            previous_last
                .checked_add(1)
                .and_then(|start| start.checked_add(gap))
                .ok_or(CodecError::Malformed("range start overflows"))?
        };
        let (length, next) = sdnv::read(bytes, offset)?;
        offset = next;
        let last = first
            .checked_add(length)
            .ok_or(CodecError::Malformed("range end overflows"))?;

        let range = CidRange { first, last };
        num_acks = num_acks.saturating_add(range.cid_count());
        ranges.push(range);
        previous_last = last;
    }

    for range in ranges {
        on_range(range);
    }
    Ok(SignalSummary { status, num_acks })
}

/// Decodes a signal, materializing its ranges.
pub fn parse_signal(bytes: &[u8]) -> Result<(SignalSummary, Vec<CidRange>), CodecError> {
    let mut ranges = Vec::new();
    let summary = decode_signal(bytes, |range| ranges.push(range))?;
    Ok((summary, ranges))
}
