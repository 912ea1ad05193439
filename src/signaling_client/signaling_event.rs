use crate::signaling::protocol::SignalingMsg;

/// What the reader thread reports back to the owner of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    Msg(SignalingMsg),
    /// The relay connection is gone; no further events follow.
    Disconnected { reason: String },
}
