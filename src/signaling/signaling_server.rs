use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use crate::config::Config;
use crate::log::{LogSink, NoopLogSink};
use crate::signaling::coordinator::{Coordinator, RelayPolicy};
use crate::signaling::protocol::MAX_BODY_LEN;
use crate::signaling::registry::SessionRegistry;
use crate::signaling::transport::{
    DEFAULT_OUTBOUND_QUEUE, RelayCoordinator, spawn_connection_threads,
};
use crate::{sink_info, sink_warn};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Relay settings, usually read from the `[Signaling]` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub policy: RelayPolicy,
    pub max_body_len: usize,
    /// Messages buffered per connection before it counts as not reading.
    pub outbound_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            policy: RelayPolicy::default(),
            max_body_len: MAX_BODY_LEN,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

impl ServerSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: config
                .get_non_empty_or_default("Signaling", "bind_addr", DEFAULT_BIND_ADDR)
                .to_string(),
            policy: RelayPolicy {
                notify_unreachable: config
                    .get_bool("Signaling", "notify_unreachable")
                    .unwrap_or(defaults.policy.notify_unreachable),
            },
            max_body_len: config
                .get_parsed("Signaling", "max_body_len")
                .unwrap_or(defaults.max_body_len),
            outbound_queue: config
                .get_parsed("Signaling", "outbound_queue")
                .unwrap_or(defaults.outbound_queue),
        }
    }
}

/// Top-level runtime object for the relay: owns the registry and knows how
/// to accept TCP clients and hand them to the coordinator.
pub struct SignalingServer {
    settings: ServerSettings,
    log: Arc<dyn LogSink>,
}

impl SignalingServer {
    pub fn new(settings: ServerSettings, log: Arc<dyn LogSink>) -> Self {
        Self { settings, log }
    }

    pub fn without_log(settings: ServerSettings) -> Self {
        Self::new(settings, Arc::new(NoopLogSink))
    }

    /// Bind the listener and build the coordinator, without accepting yet.
    pub fn bind(self) -> io::Result<BoundServer> {
        let Self { settings, log } = self;

        let listener = TcpListener::bind(&settings.bind_addr)?;
        let registry = Arc::new(SessionRegistry::new());
        let coordinator = Arc::new(
            Coordinator::with_log(registry, Arc::clone(&log)).with_policy(settings.policy),
        );

        sink_info!(
            log,
            "signaling server listening on {} (notify_unreachable={}, max_body_len={})",
            listener.local_addr().map_or_else(|_| settings.bind_addr.clone(), |a| a.to_string()),
            settings.policy.notify_unreachable,
            settings.max_body_len
        );

        Ok(BoundServer {
            listener,
            coordinator,
            log,
            max_body_len: settings.max_body_len,
            outbound_queue: settings.outbound_queue,
        })
    }

    /// Blocking: bind, then accept forever.
    pub fn run(self) -> io::Result<()> {
        self.bind()?.serve()
    }
}

/// A bound relay that has not started accepting.
pub struct BoundServer {
    listener: TcpListener,
    coordinator: Arc<RelayCoordinator>,
    log: Arc<dyn LogSink>,
    max_body_len: usize,
    outbound_queue: usize,
}

impl BoundServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn coordinator(&self) -> Arc<RelayCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Accept loop. A failed accept or thread spawn only affects that client.
    pub fn serve(self) -> io::Result<()> {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(self.log, "incoming TCP accept failed: {} (continuing)", e);
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            if let Err(e) = spawn_connection_threads(
                stream,
                Arc::clone(&self.coordinator),
                Arc::clone(&self.log),
                self.max_body_len,
                self.outbound_queue,
            ) {
                sink_warn!(self.log, "failed to set up connection: {}", e);
            }
        }
        Ok(())
    }
}
