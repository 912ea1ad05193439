use crate::signaling::protocol::SignalingMsg;

/// Commands fed to the client's writer thread.
#[derive(Debug)]
pub enum SignalingCommand {
    Send(SignalingMsg),
    Disconnect,
}
