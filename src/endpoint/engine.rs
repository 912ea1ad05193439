use thiserror::Error;

use crate::endpoint::media::{LocalMedia, RemoteMedia};
use crate::signaling::protocol::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// Produces the offer.
    Initiator,
    /// Consumes the offer, produces the answer.
    Responder,
}

/// Things a negotiation engine reports when polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A local payload to hand to the peer through the relay.
    Signal(Signal),
    RemoteMedia(RemoteMedia),
    /// The peer went away after the connection was up.
    ConnectionLost,
    Failed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine already destroyed")]
    Destroyed,
    #[error("remote payload rejected: {0}")]
    Rejected(String),
    #[error("could not create engine: {0}")]
    Create(String),
}

/// One peer-to-peer transport negotiation. Payloads are opaque to everything
/// but the engine itself.
pub trait NegotiationEngine: Send {
    fn feed(&mut self, signal: &[u8]) -> Result<(), EngineError>;
    fn poll(&mut self) -> Vec<EngineEvent>;
    /// Release every resource. After this, `feed` fails and `poll` is empty.
    fn destroy(&mut self);
}

pub trait EngineFactory: Send {
    fn create(
        &mut self,
        role: NegotiationRole,
        local: &LocalMedia,
    ) -> Result<Box<dyn NegotiationEngine>, EngineError>;
}
