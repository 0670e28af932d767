use std::fmt;

use bytes::Bytes;

use ferry_core::types::{CustodyId, Endpoint};

/// Delivery capabilities the custody controller drives.
///
/// The controller never performs I/O itself; implementations carry the
/// transport and storage wiring and may enforce `timeout_secs` on any
/// internal queue wait.
pub trait BundleCourier {
    /// Courier-specific delivery error.
    type Error: fmt::Display;

    /// (Re)produces and transmits the bundle tracked under `cid`.
    fn generate(
        &mut self,
        cid: CustodyId,
        bundle: &Bytes,
        timeout_secs: u64,
    ) -> Result<(), Self::Error>;

    /// Delivers the application-level confirmation for an acknowledged CID.
    fn acknowledge(&mut self, cid: CustodyId) -> Result<(), Self::Error>;

    /// Ships an encoded aggregate custody signal toward `destination`.
    fn deliver_signal(
        &mut self,
        destination: &Endpoint,
        record: &[u8],
        timeout_secs: u64,
    ) -> Result<(), Self::Error>;
}

/// In-memory courier for tests and simulations.
#[derive(Debug, Default, Clone)]
pub struct RecordingCourier {
    /// Every `generate` call, in order.
    pub generated: Vec<(CustodyId, Bytes)>,
    /// Every `acknowledge` call, in order.
    pub acknowledged: Vec<CustodyId>,
    /// Every delivered signal record, in order.
    pub signals: Vec<(Endpoint, Vec<u8>)>,
    /// Timeout handed to the most recent `deliver_signal` call.
    pub last_signal_timeout: Option<u64>,
    fail_generate: bool,
    fail_deliver: bool,
}

impl RecordingCourier {
    /// If enabled, `generate` fails (transmit-outage simulation).
    pub fn set_fail_generate(&mut self, fail: bool) {
        self.fail_generate = fail;
    }

    /// If enabled, `deliver_signal` fails.
    pub fn set_fail_deliver(&mut self, fail: bool) {
        self.fail_deliver = fail;
    }

    /// Drains and returns all delivered signal records so far.
    pub fn take_signals(&mut self) -> Vec<(Endpoint, Vec<u8>)> {
        std::mem::take(&mut self.signals)
    }

    /// CIDs passed to `generate`, in call order.
    pub fn generated_cids(&self) -> Vec<CustodyId> {
        self.generated.iter().map(|(cid, _)| *cid).collect()
    }
}

impl BundleCourier for RecordingCourier {
    type Error = &'static str;

    fn generate(
        &mut self,
        cid: CustodyId,
        bundle: &Bytes,
        _timeout_secs: u64,
    ) -> Result<(), Self::Error> {
        if self.fail_generate {
            return Err("generate disabled");
        }
        self.generated.push((cid, bundle.clone()));
        Ok(())
    }

    fn acknowledge(&mut self, cid: CustodyId) -> Result<(), Self::Error> {
        self.acknowledged.push(cid);
        Ok(())
    }

    fn deliver_signal(
        &mut self,
        destination: &Endpoint,
        record: &[u8],
        timeout_secs: u64,
    ) -> Result<(), Self::Error> {
        self.last_signal_timeout = Some(timeout_secs);
        if self.fail_deliver {
            return Err("deliver disabled");
        }
        self.signals.push((*destination, record.to_vec()));
        Ok(())
    }
}
