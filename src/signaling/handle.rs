use std::sync::mpsc::{Sender, SyncSender, TrySendError};

use crate::signaling::errors::DeliveryError;
use crate::signaling::protocol::SignalingMsg;

/// Something the coordinator can push messages into for one live connection.
///
/// Delivery only enqueues; the connection's writer does the IO. Messages
/// delivered to one handle must come out in the order they went in.
pub trait ConnectionHandle: Clone + Send + Sync + 'static {
    fn deliver(&self, msg: SignalingMsg) -> Result<(), DeliveryError>;
}

impl ConnectionHandle for Sender<SignalingMsg> {
    fn deliver(&self, msg: SignalingMsg) -> Result<(), DeliveryError> {
        self.send(msg).map_err(|_| DeliveryError::Closed)
    }
}

/// Bounded queue: never blocks the delivering thread.
impl ConnectionHandle for SyncSender<SignalingMsg> {
    fn deliver(&self, msg: SignalingMsg) -> Result<(), DeliveryError> {
        self.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Disconnected(_) => DeliveryError::Closed,
        })
    }
}
