use std::fmt;
use std::time::Instant;

use crate::endpoint::engine::NegotiationEngine;
use crate::endpoint::media::RemoteMedia;
use crate::signaling::protocol::{CallFailCode, ConnectionId, DisplayName, Signal};

/// An inbound call that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    pub is_receiving_call: bool,
    pub caller: ConnectionId,
    pub caller_name: DisplayName,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LocalHangUp,
    RemoteLost,
    Timeout,
    /// The callee (or the relay) refused the call; raw wire reason.
    Rejected { reason: u16 },
    EngineFailure(String),
}

impl EndReason {
    /// The failure code behind a `Rejected`, when it is a known one.
    pub fn fail_code(&self) -> Option<CallFailCode> {
        match self {
            Self::Rejected { reason } => CallFailCode::from_u16(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalHangUp => write!(f, "hung up"),
            Self::RemoteLost => write!(f, "peer lost"),
            Self::Timeout => write!(f, "timed out"),
            Self::Rejected { reason } => match CallFailCode::from_u16(*reason) {
                Some(code) => write!(f, "rejected ({code:?})"),
                None => write!(f, "rejected (code {reason})"),
            },
            Self::EngineFailure(e) => write!(f, "engine failure: {e}"),
        }
    }
}

/// Field-less view of [`CallState`], for callers and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Placing,
    Receiving,
    Answering,
    Connected,
    Ended,
}

/// Per-party call state. Each variant holds exactly what that phase needs,
/// so an engine only exists while a call is in flight.
pub enum CallState {
    Idle,
    Placing {
        peer: ConnectionId,
        engine: Box<dyn NegotiationEngine>,
        offer_sent: bool,
        answered: bool,
        deadline: Instant,
    },
    Receiving {
        descriptor: CallDescriptor,
        deadline: Instant,
    },
    /// Accepted locally; waiting for the engine's remote media.
    Answering {
        peer: ConnectionId,
        engine: Box<dyn NegotiationEngine>,
        answer_sent: bool,
        deadline: Instant,
    },
    Connected {
        peer: ConnectionId,
        engine: Box<dyn NegotiationEngine>,
        remote: RemoteMedia,
    },
    Ended(EndReason),
}

impl CallState {
    pub fn phase(&self) -> CallPhase {
        match self {
            Self::Idle => CallPhase::Idle,
            Self::Placing { .. } => CallPhase::Placing,
            Self::Receiving { .. } => CallPhase::Receiving,
            Self::Answering { .. } => CallPhase::Answering,
            Self::Connected { .. } => CallPhase::Connected,
            Self::Ended(_) => CallPhase::Ended,
        }
    }

    /// The other party, once there is one.
    pub fn peer(&self) -> Option<&str> {
        match self {
            Self::Placing { peer, .. }
            | Self::Answering { peer, .. }
            | Self::Connected { peer, .. } => Some(peer),
            Self::Receiving { descriptor, .. } => Some(&descriptor.caller),
            Self::Idle | Self::Ended(_) => None,
        }
    }

    pub fn engine_mut(&mut self) -> Option<&mut Box<dyn NegotiationEngine>> {
        match self {
            Self::Placing { engine, .. }
            | Self::Answering { engine, .. }
            | Self::Connected { engine, .. } => Some(engine),
            Self::Idle | Self::Receiving { .. } | Self::Ended(_) => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Placing { deadline, .. }
            | Self::Receiving { deadline, .. }
            | Self::Answering { deadline, .. } => Some(*deadline),
            Self::Idle | Self::Connected { .. } | Self::Ended(_) => None,
        }
    }
}

impl fmt::Debug for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Placing {
                peer,
                offer_sent,
                answered,
                ..
            } => f
                .debug_struct("Placing")
                .field("peer", peer)
                .field("offer_sent", offer_sent)
                .field("answered", answered)
                .finish_non_exhaustive(),
            Self::Receiving { descriptor, .. } => {
                f.debug_tuple("Receiving").field(descriptor).finish()
            }
            Self::Answering {
                peer, answer_sent, ..
            } => f
                .debug_struct("Answering")
                .field("peer", peer)
                .field("answer_sent", answer_sent)
                .finish_non_exhaustive(),
            Self::Connected { peer, remote, .. } => f
                .debug_struct("Connected")
                .field("peer", peer)
                .field("remote", remote)
                .finish_non_exhaustive(),
            Self::Ended(reason) => f.debug_tuple("Ended").field(reason).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn rejected_reason_maps_to_fail_code() {
        let r = EndReason::Rejected {
            reason: CallFailCode::Busy.as_u16(),
        };
        assert_eq!(r.fail_code(), Some(CallFailCode::Busy));
        assert_eq!(EndReason::Rejected { reason: 77 }.fail_code(), None);
        assert_eq!(EndReason::Timeout.fail_code(), None);
        let unknown = EndReason::Rejected { reason: 77 };
        assert_eq!(unknown.to_string(), "rejected (code 77)");
    }

    #[test]
    fn receiving_exposes_caller_but_no_engine() {
        let mut s = CallState::Receiving {
            descriptor: CallDescriptor {
                is_receiving_call: true,
                caller: "abc".into(),
                caller_name: "Alice".into(),
                signal: vec![1],
            },
            deadline: Instant::now(),
        };
        assert_eq!(s.phase(), CallPhase::Receiving);
        assert_eq!(s.peer(), Some("abc"));
        assert!(s.engine_mut().is_none());
        assert!(format!("{s:?}").starts_with("Receiving"));
    }
}
