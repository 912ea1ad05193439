use thiserror::Error;

use crate::signaling::protocol::ConnectionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("identity {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's outbound queue is gone (writer thread exited).
    #[error("connection closed")]
    Closed,
    /// The outbound queue is at capacity: the peer is not reading.
    #[error("outbound queue full")]
    Full,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not mint a free identity after {attempts} attempts")]
    IdentityExhausted { attempts: usize },
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
