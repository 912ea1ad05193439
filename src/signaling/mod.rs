//! The relay: session registry, signaling coordinator and the TCP plumbing
//! around them.

pub mod coordinator;
pub mod errors;
pub mod handle;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod run;
pub mod signaling_server;
pub mod transport;
pub mod types;

pub use coordinator::{Coordinator, RelayPolicy};
pub use errors::{DeliveryError, RegistryError, RelayError};
pub use handle::ConnectionHandle;
pub use registry::SessionRegistry;
pub use signaling_server::{BoundServer, ServerSettings, SignalingServer};
pub use types::OutgoingMsg;
