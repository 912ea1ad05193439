//! peercall: two-party call setup over a small signaling relay.
//!
//! The relay ([`signaling`]) hands every connection an identity and forwards
//! call offers and answers between exactly two of them. Each party runs a
//! call-state machine ([`endpoint`]) that drives a pluggable negotiation
//! engine and talks to the relay through a [`signaling_client`].
//!
//! Binary: `signaling_server`.

/// INI-style configuration loading.
pub mod config;
/// One party's call-state machine and its collaborators.
pub mod endpoint;
/// Leveled, non-blocking logging.
pub mod log;
/// The relay: registry, coordinator, wire protocol and TCP server.
pub mod signaling;
/// Threaded TCP client for the relay.
pub mod signaling_client;
