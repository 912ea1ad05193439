use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, SyncSender};
use std::thread;
use std::time::Duration;

use crate::log::LogSink;
use crate::signaling::coordinator::Coordinator;
use crate::signaling::protocol::{ConnectionId, FrameError, SignalingMsg, read_msg, write_msg};
use crate::{sink_debug, sink_info, sink_warn};

pub type RelayCoordinator = Coordinator<SyncSender<SignalingMsg>>;

/// Default outbound queue length per connection.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// A peer that stops reading fails the writer after this long.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over a blocking stream that speaks in `SignalingMsg`.
pub struct Connection<S> {
    stream: S,
    max_body: usize,
}

impl<S> Connection<S>
where
    S: Read + Write,
{
    pub fn new(stream: S, max_body: usize) -> Self {
        Self { stream, max_body }
    }

    pub fn recv(&mut self) -> Result<SignalingMsg, FrameError> {
        read_msg(&mut self.stream, self.max_body)
    }

    pub fn send(&mut self, msg: &SignalingMsg) -> Result<(), FrameError> {
        write_msg(&mut self.stream, msg)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Register a freshly accepted client with the coordinator and spawn its
/// reader and writer threads.
///
/// - reader: socket → `Coordinator::dispatch`; any read or frame error ends
///   the connection.
/// - writer: bounded outbound queue (`queue_len`) → socket. It stops once the
///   registry drops the queue's sender (after disconnect) or on a write error,
///   and then shuts the socket down so the reader unblocks.
pub fn spawn_connection_threads(
    stream: TcpStream,
    coordinator: Arc<RelayCoordinator>,
    log: Arc<dyn LogSink>,
    max_body: usize,
    queue_len: usize,
) -> io::Result<ConnectionId> {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "?".to_string(), |a| a.to_string());
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    let read_stream = stream.try_clone()?;
    let write_stream = stream;

    let (to_client_tx, to_client_rx) = mpsc::sync_channel::<SignalingMsg>(queue_len.max(1));
    let id = coordinator.connect(to_client_tx).map_err(io::Error::other)?;
    sink_info!(log, "connection {} from {}", id, peer);

    // WRITER THREAD: outbound queue -> socket
    let writer = {
        let id = id.clone();
        let coordinator = Arc::clone(&coordinator);
        let log = Arc::clone(&log);
        thread::Builder::new()
            .name(format!("conn-writer-{id}"))
            .spawn(move || {
                let mut conn = Connection::new(write_stream, max_body);
                while let Ok(msg) = to_client_rx.recv() {
                    if let Err(e) = conn.send(&msg) {
                        sink_warn!(log, "[conn {}] error sending {}: {}", id, msg.kind(), e);
                        coordinator.disconnect(&id);
                        break;
                    }
                }
                let _ = conn.into_inner().shutdown(Shutdown::Both);
                sink_debug!(log, "[conn {}] writer finished", id);
            })
    };
    if let Err(e) = writer {
        coordinator.disconnect(&id);
        return Err(e);
    }

    // READER THREAD: socket -> coordinator
    let reader = {
        let id = id.clone();
        let coordinator = Arc::clone(&coordinator);
        let log = Arc::clone(&log);
        thread::Builder::new()
            .name(format!("conn-reader-{id}"))
            .spawn(move || {
                let mut conn = Connection::new(read_stream, max_body);
                loop {
                    match conn.recv() {
                        Ok(msg) => {
                            sink_debug!(log, "[conn {}] <- {}", id, msg.kind());
                            coordinator.dispatch(&id, msg);
                        }
                        Err(e) if e.is_disconnect() => {
                            sink_info!(log, "[conn {}] closed by peer", id);
                            break;
                        }
                        Err(e) => {
                            sink_warn!(log, "[conn {}] dropping connection: {}", id, e);
                            break;
                        }
                    }
                }
                coordinator.disconnect(&id);
            })
    };
    if let Err(e) = reader {
        coordinator.disconnect(&id);
        return Err(e);
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::signaling::protocol::MAX_BODY_LEN;
    use std::io::Cursor;

    #[test]
    fn connection_reads_back_what_it_wrote() {
        let mut conn = Connection::new(Cursor::new(Vec::new()), MAX_BODY_LEN);
        conn.send(&SignalingMsg::Ping { nonce: 5 }).unwrap();

        let mut wire = conn.into_inner();
        wire.set_position(0);
        let mut conn = Connection::new(wire, MAX_BODY_LEN);
        assert_eq!(conn.recv().unwrap(), SignalingMsg::Ping { nonce: 5 });
        assert!(conn.recv().unwrap_err().is_disconnect());
    }
}
