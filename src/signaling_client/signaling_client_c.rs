use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::log::{LogSink, NoopLogSink};
use crate::signaling::protocol::{MAX_BODY_LEN, SignalingMsg};
use crate::signaling::transport::Connection;
use crate::signaling_client::signaling_client_error::SignalingClientError;
use crate::signaling_client::signaling_command::SignalingCommand;
use crate::signaling_client::signaling_event::SignalingEvent;
use crate::{sink_debug, sink_info, sink_warn};

/// Blocking TCP client for the relay.
///
/// Owns two threads: a reader turning frames into [`SignalingEvent`]s and a
/// writer draining [`SignalingCommand`]s. The owner talks to both through
/// channels and never touches the socket.
pub struct SignalingClient {
    cmd_tx: Sender<SignalingCommand>,
    event_rx: Receiver<SignalingEvent>,
    stream: TcpStream,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    log: Arc<dyn LogSink>,
}

impl SignalingClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, SignalingClientError> {
        Self::connect_with_log(addr, Arc::new(NoopLogSink))
    }

    pub fn connect_with_log<A: ToSocketAddrs>(
        addr: A,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, SignalingClientError> {
        let stream = TcpStream::connect(addr)?;
        let _ = stream.set_nodelay(true);
        sink_info!(
            log,
            "connected to relay at {}",
            stream
                .peer_addr()
                .map_or_else(|_| "?".to_string(), |a| a.to_string())
        );

        let read_stream = stream.try_clone()?;
        let write_stream = stream.try_clone()?;
        let (cmd_tx, cmd_rx) = mpsc::channel::<SignalingCommand>();
        let (event_tx, event_rx) = mpsc::channel::<SignalingEvent>();

        let reader = {
            let log = Arc::clone(&log);
            thread::Builder::new()
                .name("signaling-reader".into())
                .spawn(move || reader_loop(read_stream, &event_tx, log.as_ref()))?
        };
        let writer = {
            let log = Arc::clone(&log);
            thread::Builder::new()
                .name("signaling-writer".into())
                .spawn(move || writer_loop(write_stream, &cmd_rx, log.as_ref()))?
        };

        Ok(Self {
            cmd_tx,
            event_rx,
            stream,
            reader: Some(reader),
            writer: Some(writer),
            log,
        })
    }

    pub fn send(&self, msg: SignalingMsg) -> Result<(), SignalingClientError> {
        self.cmd_tx
            .send(SignalingCommand::Send(msg))
            .map_err(|_| SignalingClientError::Disconnected)
    }

    /// Non-blocking. `None` when nothing is pending.
    pub fn try_recv(&self) -> Option<SignalingEvent> {
        match self.event_rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SignalingEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait for the relay's `me` and return the assigned identity.
    /// Anything else received first is an error.
    pub fn wait_for_identity(&self, timeout: Duration) -> Result<String, SignalingClientError> {
        match self.recv_timeout(timeout) {
            Some(SignalingEvent::Msg(SignalingMsg::Me { id })) => Ok(id),
            Some(SignalingEvent::Disconnected { .. }) => Err(SignalingClientError::Disconnected),
            Some(SignalingEvent::Msg(other)) => {
                sink_warn!(self.log, "expected `me`, got {}", other.kind());
                Err(SignalingClientError::Unexpected(other.kind()))
            }
            None => Err(SignalingClientError::NoIdentity(timeout)),
        }
    }

    /// Close the connection and join both threads. Safe to call twice.
    pub fn disconnect(&mut self) {
        let _ = self.cmd_tx.send(SignalingCommand::Disconnect);
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(h) = self.writer.take() {
            let _ = h.join();
        }
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
        sink_debug!(self.log, "signaling client disconnected");
    }
}

impl Drop for SignalingClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn reader_loop(stream: TcpStream, events: &Sender<SignalingEvent>, log: &dyn LogSink) {
    let mut conn = Connection::new(stream, MAX_BODY_LEN);
    let reason = loop {
        match conn.recv() {
            Ok(msg) => {
                sink_debug!(log, "<- {}", msg.kind());
                if events.send(SignalingEvent::Msg(msg)).is_err() {
                    return;
                }
            }
            Err(e) if e.is_disconnect() => break "relay closed the connection".to_string(),
            Err(e) => {
                sink_warn!(log, "signaling read failed: {}", e);
                break e.to_string();
            }
        }
    };
    let _ = events.send(SignalingEvent::Disconnected { reason });
}

fn writer_loop(stream: TcpStream, commands: &Receiver<SignalingCommand>, log: &dyn LogSink) {
    let mut conn = Connection::new(stream, MAX_BODY_LEN);
    while let Ok(cmd) = commands.recv() {
        match cmd {
            SignalingCommand::Send(msg) => {
                if let Err(e) = conn.send(&msg) {
                    sink_warn!(log, "error sending {}: {}", msg.kind(), e);
                    break;
                }
                sink_debug!(log, "-> {}", msg.kind());
            }
            SignalingCommand::Disconnect => break,
        }
    }
    let _ = conn.into_inner().shutdown(Shutdown::Both);
}
