use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::endpoint::call_error::SessionError;
use crate::endpoint::call_event::CallEvent;
use crate::endpoint::call_machine::CallMachine;
use crate::log::LogSink;
use crate::signaling_client::{SignalingClient, SignalingEvent};
use crate::{sink_debug, sink_warn};

const PUMP_INTERVAL: Duration = Duration::from_millis(5);

/// A [`CallMachine`] wired to a live relay connection.
///
/// Nothing runs in the background on the machine's behalf: the owner calls
/// [`pump`](Self::pump) regularly (e.g. once per UI frame).
pub struct CallSession {
    client: SignalingClient,
    machine: CallMachine,
    relay_open: bool,
    log: Arc<dyn LogSink>,
}

impl CallSession {
    pub fn new(client: SignalingClient, machine: CallMachine, log: Arc<dyn LogSink>) -> Self {
        Self {
            client,
            machine: machine.with_log(Arc::clone(&log)),
            relay_open: true,
            log,
        }
    }

    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        machine: CallMachine,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, SessionError> {
        let client = SignalingClient::connect_with_log(addr, Arc::clone(&log))?;
        Ok(Self::new(client, machine, log))
    }

    pub fn machine(&self) -> &CallMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut CallMachine {
        &mut self.machine
    }

    pub fn relay_open(&self) -> bool {
        self.relay_open
    }

    /// Feed relay messages into the machine, let it poll its engine and
    /// clock, send what it queued, and return its events.
    pub fn pump(&mut self, now: Instant) -> Result<Vec<CallEvent>, SessionError> {
        while let Some(ev) = self.client.try_recv() {
            match ev {
                SignalingEvent::Msg(msg) => self.machine.handle_signal(msg, now),
                SignalingEvent::Disconnected { reason } => {
                    sink_warn!(self.log, "relay connection lost: {}", reason);
                    self.relay_open = false;
                }
            }
        }
        self.machine.poll(now);
        self.flush()?;
        Ok(self.machine.drain_events())
    }

    /// Pump until an event matching `pred` shows up or `timeout` passes.
    /// Returns every event seen, matching or not.
    pub fn pump_until<F>(
        &mut self,
        timeout: Duration,
        pred: F,
    ) -> Result<Vec<CallEvent>, SessionError>
    where
        F: Fn(&CallEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut seen = Vec::new();
        loop {
            let events = self.pump(Instant::now())?;
            let hit = events.iter().any(&pred);
            seen.extend(events);
            if hit || Instant::now() >= deadline || !self.relay_open {
                return Ok(seen);
            }
            thread::sleep(PUMP_INTERVAL);
        }
    }

    pub fn place_call(&mut self, target: &str) -> Result<(), SessionError> {
        self.machine.place_call(target, Instant::now())?;
        self.flush()
    }

    pub fn accept_call(&mut self) -> Result<(), SessionError> {
        self.machine.accept_call(Instant::now())?;
        self.flush()
    }

    pub fn decline_call(&mut self) -> Result<(), SessionError> {
        self.machine.decline_call()?;
        self.flush()
    }

    pub fn hang_up(&mut self) -> Result<(), SessionError> {
        self.machine.hang_up()?;
        self.flush()
    }

    /// Send queued messages in order. A message stays queued until the
    /// client has taken it.
    fn flush(&mut self) -> Result<(), SessionError> {
        while let Some(msg) = self.machine.next_outgoing() {
            sink_debug!(self.log, "sending {}", msg.kind());
            self.client.send(msg.clone())?;
            self.machine.pop_outgoing();
        }
        Ok(())
    }

    /// Close the relay connection; the machine (and any call) is dropped too.
    pub fn close(mut self) {
        self.machine.reset();
        self.client.disconnect();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use std::net::TcpListener;

    use super::*;
    use crate::endpoint::loopback::LoopbackFactory;
    use crate::log::NoopLogSink;
    use crate::signaling::protocol::{CallFailCode, SignalingMsg};
    use crate::signaling_client::SignalingClientError;

    fn call_from(from: &str) -> SignalingMsg {
        SignalingMsg::CallUser {
            from: from.into(),
            name: from.into(),
            signal: b"offer:cam".to_vec(),
        }
    }

    #[test]
    fn unsent_messages_stay_queued_when_the_relay_is_gone() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = SignalingClient::connect(addr).unwrap();
        client.disconnect();

        let now = Instant::now();
        let mut machine = CallMachine::new("Bob", Box::new(LoopbackFactory::new()));
        machine.handle_signal(SignalingMsg::Me { id: "bob".into() }, now);
        machine.handle_signal(call_from("alice"), now);
        machine.handle_signal(call_from("carol"), now);
        machine.handle_signal(call_from("dave"), now);

        let mut session = CallSession::new(client, machine, Arc::new(NoopLogSink));
        assert!(matches!(
            session.pump(now),
            Err(SessionError::Signaling(SignalingClientError::Disconnected))
        ));
        assert!(!session.relay_open());

        let queued = session.machine_mut().drain_outgoing();
        assert_eq!(queued.len(), 2);
        let busy = |to: &str| SignalingMsg::DeclineCall {
            to: to.into(),
            reason: CallFailCode::Busy.as_u16(),
        };
        assert_eq!(queued, vec![busy("carol"), busy("dave")]);
    }
}
