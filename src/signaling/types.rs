use crate::signaling::protocol::{ConnectionId, SignalingMsg};

/// A message the coordinator wants delivered to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMsg {
    pub target: ConnectionId,
    pub msg: SignalingMsg,
}

impl OutgoingMsg {
    pub fn new(target: impl Into<ConnectionId>, msg: SignalingMsg) -> Self {
        Self {
            target: target.into(),
            msg,
        }
    }
}
