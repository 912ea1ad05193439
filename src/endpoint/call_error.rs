use thiserror::Error;

use crate::endpoint::call_state::CallPhase;
use crate::endpoint::engine::EngineError;
use crate::endpoint::media::MediaError;
use crate::signaling_client::SignalingClientError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("cannot {action} while {phase:?}")]
    InvalidState {
        action: &'static str,
        phase: CallPhase,
    },
    #[error("no identity assigned by the relay yet")]
    NoIdentity,
    #[error("no local media")]
    NoLocalMedia,
    #[error("media acquisition failed: {0}")]
    Media(#[from] MediaError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Failures of [`CallSession`](super::CallSession): either the call itself
/// or the relay connection underneath it.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("signaling: {0}")]
    Signaling(#[from] SignalingClientError),
}
