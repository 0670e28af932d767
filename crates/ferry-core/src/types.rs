use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FerryError;

/// Custody identifier: per-channel monotonic counter naming one bundle
/// instance awaiting custody acceptance.
pub type CustodyId = u64;

/// Custody-signal reason code (low 7 bits of the status byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCode(pub u8);

/// Reason values carried in custody signals.
pub const REASON_NO_INFO: ReasonCode = ReasonCode(0);
pub const REASON_REDUNDANT_RECEPTION: ReasonCode = ReasonCode(3);
pub const REASON_DEPLETED_STORAGE: ReasonCode = ReasonCode(4);
pub const REASON_DEST_UNINTELLIGIBLE: ReasonCode = ReasonCode(5);
pub const REASON_NO_ROUTE: ReasonCode = ReasonCode(6);
pub const REASON_NO_TIMELY_CONTACT: ReasonCode = ReasonCode(7);
pub const REASON_BLOCK_UNINTELLIGIBLE: ReasonCode = ReasonCode(8);

impl ReasonCode {
    /// Masks an arbitrary status byte down to the 7-bit reason field.
    pub fn from_status_bits(bits: u8) -> Self {
        ReasonCode(bits & 0x7f)
    }

    /// Reason bits as carried in a status byte.
    pub fn bits(&self) -> u8 {
        self.0 & 0x7f
    }
}

/// `ipn`-scheme endpoint: node and service numbers.
///
/// Serializes as its text form `ipn:node.service`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: u64,
    pub service: u64,
}

impl Endpoint {
    pub fn new(node: u64, service: u64) -> Self {
        Endpoint { node, service }
    }

    /// Node number zero is the null endpoint and never routable.
    pub fn is_null(&self) -> bool {
        self.node == 0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipn:{}.{}", self.node, self.service)
    }
}

impl FromStr for Endpoint {
    type Err = FerryError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let numbers = text
            .strip_prefix("ipn:")
            .ok_or(FerryError::InvalidEndpoint("missing ipn scheme"))?;
        let (node, service) = numbers
            .split_once('.')
            .ok_or(FerryError::InvalidEndpoint("missing service number"))?;
        let node = node
            .parse::<u64>()
            .map_err(|_| FerryError::InvalidEndpoint("bad node number"))?;
        let service = service
            .parse::<u64>()
            .map_err(|_| FerryError::InvalidEndpoint("bad service number"))?;
        Ok(Endpoint { node, service })
    }
}

impl Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Endpoint pair naming one custodial relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Local custodian endpoint.
    pub local: Endpoint,
    /// Peer custodian endpoint; outbound signals are addressed here.
    pub destination: Endpoint,
    /// Optional status-report destination.
    pub report_to: Option<Endpoint>,
}

impl Route {
    pub fn new(local: Endpoint, destination: Endpoint) -> Self {
        Route {
            local,
            destination,
            report_to: None,
        }
    }

    /// A usable route names nonzero local and destination nodes.
    pub fn validate(&self) -> Result<(), FerryError> {
        if self.local.is_null() {
            return Err(FerryError::InvalidRoute("null local endpoint"));
        }
        if self.destination.is_null() {
            return Err(FerryError::InvalidRoute("null destination endpoint"));
        }
        Ok(())
    }
}
