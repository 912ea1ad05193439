use crate::signaling::protocol::{ConnectionId, DisplayName, Signal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingMsg {
    /// relay → new connection: your routable identity.
    Me { id: ConnectionId },

    // Call setup
    /// caller → relay. `from` is what the caller believes its identity is.
    PlaceCall {
        to: ConnectionId,
        from: ConnectionId,
        name: DisplayName,
        signal: Signal,
    },
    /// relay → callee.
    CallUser {
        from: ConnectionId,
        name: DisplayName,
        signal: Signal,
    },
    /// callee → relay.
    AcceptCall { to: ConnectionId, signal: Signal },
    /// relay → caller.
    CallAccepted { signal: Signal },
    /// callee → relay: refuse a call (busy or declined). Code is a `CallFailCode`.
    DeclineCall { to: ConnectionId, reason: u16 },
    /// relay → caller: the attempt towards `peer` failed.
    CallFailed { peer: ConnectionId, reason: u16 },

    // Keepalive
    Ping { nonce: u64 },
    Pong { nonce: u64 },
}

impl SignalingMsg {
    /// Short variant name for logging; never includes payload bytes.
    pub fn kind(&self) -> &'static str {
        use SignalingMsg::*;
        match self {
            Me { .. } => "me",
            PlaceCall { .. } => "place-call",
            CallUser { .. } => "calluser",
            AcceptCall { .. } => "accept-call",
            CallAccepted { .. } => "callaccepted",
            DeclineCall { .. } => "decline-call",
            CallFailed { .. } => "call-failed",
            Ping { .. } => "ping",
            Pong { .. } => "pong",
        }
    }
}
