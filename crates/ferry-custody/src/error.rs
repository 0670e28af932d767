use thiserror::Error;

use ferry_codec::CodecError;

/// Errors surfaced by custody-controller operations.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Malformed route, zero timing value, or claim misuse; the
    /// channel (or operation) is not created.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// Custodian endpoint does not name this channel's peer.
    #[error("custodian is not this channel's peer")]
    PeerMismatch,
    /// Wire-level failure from the signal codec.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// Config text did not parse as TOML.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}
