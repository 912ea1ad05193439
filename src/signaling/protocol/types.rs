/// Relay-assigned identity of one live connection. Opaque to endpoints.
pub type ConnectionId = String;

/// User-supplied name shown to the callee; never used for routing.
pub type DisplayName = String;

/// Opaque negotiation payload produced and consumed by the transport engine.
pub type Signal = Vec<u8>;
