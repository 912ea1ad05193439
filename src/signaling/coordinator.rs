use std::sync::Arc;

use crate::log::{LogSink, NoopLogSink};
use crate::signaling::errors::{DeliveryError, RegistryError, RelayError};
use crate::signaling::handle::ConnectionHandle;
use crate::signaling::identity::IdentityMinter;
use crate::signaling::protocol::{CallFailCode, ConnectionId, SignalingMsg};
use crate::signaling::registry::SessionRegistry;
use crate::signaling::types::OutgoingMsg;
use crate::{sink_debug, sink_info, sink_trace, sink_warn};

/// Give up minting after this many collisions; with 20 random alphanumerics
/// a single collision is already unheard of.
const MAX_MINT_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayPolicy {
    /// Answer a `place-call` to an unregistered identity with `call-failed`
    /// instead of dropping it silently.
    pub notify_unreachable: bool,
}

/// Relays call setup messages between two registered connections.
///
/// Holds no call state: everything it knows is who is reachable, via the
/// injected [`SessionRegistry`]. Safe to share between connection threads.
pub struct Coordinator<H> {
    registry: Arc<SessionRegistry<H>>,
    minter: IdentityMinter,
    policy: RelayPolicy,
    log: Arc<dyn LogSink>,
}

impl<H: ConnectionHandle> Coordinator<H> {
    pub fn new(registry: Arc<SessionRegistry<H>>) -> Self {
        Self::with_log(registry, Arc::new(NoopLogSink))
    }

    pub fn with_log(registry: Arc<SessionRegistry<H>>, log: Arc<dyn LogSink>) -> Self {
        Self {
            registry,
            minter: IdentityMinter::default(),
            policy: RelayPolicy::default(),
            log,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RelayPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<H>> {
        &self.registry
    }

    pub fn policy(&self) -> RelayPolicy {
        self.policy
    }

    /// A new connection is up: mint its identity, register it and tell it
    /// (and only it) who it is with `me`.
    pub fn connect(&self, handle: H) -> Result<ConnectionId, RelayError> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let id = self.minter.mint();
            match self.registry.register(id.clone(), handle.clone()) {
                Ok(()) => {
                    if let Err(e) = handle.deliver(SignalingMsg::Me { id: id.clone() }) {
                        self.registry.unregister(&id);
                        sink_warn!(self.log, "connection {} closed before `me` was queued", id);
                        return Err(e.into());
                    }
                    sink_info!(
                        self.log,
                        "registered {} ({} live connections)",
                        id,
                        self.registry.len()
                    );
                    return Ok(id);
                }
                Err(RegistryError::AlreadyRegistered(dup)) => {
                    sink_warn!(self.log, "minted identity {} collided; re-minting", dup);
                }
            }
        }
        Err(RelayError::IdentityExhausted {
            attempts: MAX_MINT_ATTEMPTS,
        })
    }

    /// The connection is gone. Idempotent; returns whether it was still registered.
    pub fn disconnect(&self, id: &str) -> bool {
        let was_live = self.registry.unregister(id).is_some();
        if was_live {
            sink_info!(
                self.log,
                "unregistered {} ({} live connections)",
                id,
                self.registry.len()
            );
        } else {
            sink_trace!(self.log, "disconnect for {} ignored (already gone)", id);
        }
        was_live
    }

    /// Decide what `msg` from `from` turns into. Reads the registry, delivers nothing.
    pub fn route(&self, from: &str, msg: SignalingMsg) -> Vec<OutgoingMsg> {
        match msg {
            SignalingMsg::PlaceCall {
                to,
                from: claimed,
                name,
                signal,
            } => {
                if claimed != from {
                    sink_warn!(
                        self.log,
                        "{} placed a call claiming to be {:?}; relaying with its real identity",
                        from,
                        claimed
                    );
                }
                if !self.registry.contains(&to) {
                    sink_warn!(self.log, "place-call from {} to unreachable {}", from, to);
                    if self.policy.notify_unreachable {
                        return vec![OutgoingMsg::new(
                            from,
                            SignalingMsg::CallFailed {
                                peer: to,
                                reason: CallFailCode::Unreachable.as_u16(),
                            },
                        )];
                    }
                    return Vec::new();
                }
                sink_debug!(self.log, "relaying place-call {} -> {}", from, to);
                vec![OutgoingMsg::new(
                    to,
                    SignalingMsg::CallUser {
                        from: from.to_owned(),
                        name,
                        signal,
                    },
                )]
            }

            SignalingMsg::AcceptCall { to, signal } => {
                if !self.registry.contains(&to) {
                    sink_warn!(self.log, "accept-call from {} to unreachable {}", from, to);
                    return Vec::new();
                }
                sink_debug!(self.log, "relaying accept-call {} -> {}", from, to);
                vec![OutgoingMsg::new(to, SignalingMsg::CallAccepted { signal })]
            }

            SignalingMsg::DeclineCall { to, reason } => {
                if !self.registry.contains(&to) {
                    sink_debug!(self.log, "decline-call from {} to unreachable {}", from, to);
                    return Vec::new();
                }
                sink_debug!(
                    self.log,
                    "relaying decline-call {} -> {} (reason {})",
                    from,
                    to,
                    reason
                );
                vec![OutgoingMsg::new(
                    to,
                    SignalingMsg::CallFailed {
                        peer: from.to_owned(),
                        reason,
                    },
                )]
            }

            SignalingMsg::Ping { nonce } => {
                vec![OutgoingMsg::new(from, SignalingMsg::Pong { nonce })]
            }

            other @ (SignalingMsg::Me { .. }
            | SignalingMsg::CallUser { .. }
            | SignalingMsg::CallAccepted { .. }
            | SignalingMsg::CallFailed { .. }
            | SignalingMsg::Pong { .. }) => {
                sink_warn!(
                    self.log,
                    "ignoring server-only `{}` from client {}",
                    other.kind(),
                    from
                );
                Vec::new()
            }
        }
    }

    /// Route `msg` and deliver the results, at most once each. Returns how
    /// many messages were handed to a live connection.
    ///
    /// A target whose outbound queue is full is not reading; it is
    /// unregistered, which ends its connection.
    pub fn dispatch(&self, from: &str, msg: SignalingMsg) -> usize {
        let mut delivered = 0;
        for OutgoingMsg { target, msg } in self.route(from, msg) {
            let kind = msg.kind();
            let Some(handle) = self.registry.lookup(&target) else {
                sink_warn!(self.log, "{} for {} lost: target gone", kind, target);
                continue;
            };
            match handle.deliver(msg) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Full) => {
                    sink_warn!(
                        self.log,
                        "{} for {} lost: queue full, dropping connection",
                        kind,
                        target
                    );
                    self.disconnect(&target);
                }
                Err(e) => sink_warn!(self.log, "{} for {} lost: {}", kind, target, e),
            }
        }
        delivered
    }
}
