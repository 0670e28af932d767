use serde::{Deserialize, Serialize};

use crate::error::CustodyError;

/// Smallest usable signal buffer: the status byte plus two
/// maximum-width SDNVs (base and first fill length).
pub const MIN_SIGNAL_BUFFER_LEN: usize = 21;

/// Retransmission policy projected out of the channel config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    /// Seconds between retransmissions of one pending transfer.
    pub period_secs: u64,
    /// Seconds a transfer may stay pending before abandonment.
    pub timeout_secs: u64,
    /// Hard cap on retransmission attempts per transfer.
    pub max_retries: u32,
}

/// Per-channel custody configuration.
///
/// All durations are caller-clock seconds; every field must be nonzero
/// (and the signal buffer at least [`MIN_SIGNAL_BUFFER_LEN`]) for the
/// channel to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Seconds between retransmissions of an unacknowledged transfer.
    pub retransmit_period_secs: u64,
    /// Seconds before a pending transfer is abandoned.
    pub abandon_timeout_secs: u64,
    /// Maximum retransmission attempts before abandonment.
    pub max_retries: u32,
    /// Fill pairs allowed per outbound aggregate signal.
    pub max_fills: usize,
    /// Seconds between outbound signal flushes (the aggregation cadence).
    pub signal_rate_secs: u64,
    /// Outbound signal record buffer size in bytes.
    pub signal_buffer_len: usize,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            retransmit_period_secs: 10,
            abandon_timeout_secs: 120,
            max_retries: 16,
            max_fills: 64,
            signal_rate_secs: 5,
            signal_buffer_len: 2048,
        }
    }
}

impl CustodyConfig {
    /// Rejects any zero timing or capacity value.
    pub fn validate(&self) -> Result<(), CustodyError> {
        if self.retransmit_period_secs == 0 {
            return Err(CustodyError::InvalidParameter("zero retransmit period"));
        }
        if self.abandon_timeout_secs == 0 {
            return Err(CustodyError::InvalidParameter("zero abandon timeout"));
        }
        if self.max_retries == 0 {
            return Err(CustodyError::InvalidParameter("zero retry budget"));
        }
        if self.max_fills == 0 {
            return Err(CustodyError::InvalidParameter("zero fill budget"));
        }
        if self.signal_rate_secs == 0 {
            return Err(CustodyError::InvalidParameter("zero signal rate"));
        }
        if self.signal_buffer_len < MIN_SIGNAL_BUFFER_LEN {
            return Err(CustodyError::InvalidParameter(
                "signal buffer below one whole fill",
            ));
        }
        Ok(())
    }

    /// Returns the retransmission policy derived from this config.
    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            period_secs: self.retransmit_period_secs,
            timeout_secs: self.abandon_timeout_secs,
            max_retries: self.max_retries,
        }
    }

    /// Parses and validates a config from TOML text.
    ///
    /// Omitted keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, CustodyError> {
        let config: CustodyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
