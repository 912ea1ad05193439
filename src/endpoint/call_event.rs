use crate::endpoint::call_state::EndReason;
use crate::endpoint::media::RemoteMedia;
use crate::signaling::protocol::{ConnectionId, DisplayName};

/// Notifications for the presentation layer, drained from the call machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    IdentityAssigned(ConnectionId),
    IncomingCall {
        from: ConnectionId,
        name: DisplayName,
    },
    /// A second caller was turned away while a call was in progress.
    BusyDeclined { from: ConnectionId },
    RemoteMedia(RemoteMedia),
    Connected { peer: ConnectionId },
    Ended(EndReason),
}
