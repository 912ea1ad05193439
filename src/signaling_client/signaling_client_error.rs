use std::io;

use thiserror::Error;

/// Errors surfaced by [`SignalingClient`](super::SignalingClient).
///
/// Once the network threads are gone, every `send` reports `Disconnected`.
#[derive(Debug, Error)]
pub enum SignalingClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no `me` from relay within {0:?}")]
    NoIdentity(std::time::Duration),
    #[error("expected `me` from relay, got `{0}`")]
    Unexpected(&'static str),
    #[error("signaling client disconnected")]
    Disconnected,
}
