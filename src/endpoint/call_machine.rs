use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::endpoint::call_error::CallError;
use crate::endpoint::call_event::CallEvent;
use crate::endpoint::call_state::{CallDescriptor, CallPhase, CallState, EndReason};
use crate::endpoint::engine::{EngineEvent, EngineFactory, NegotiationRole};
use crate::endpoint::media::{LocalMedia, MediaSource, RemoteMedia};
use crate::log::{LogSink, NoopLogSink};
use crate::signaling::protocol::{CallFailCode, ConnectionId, DisplayName, Signal, SignalingMsg};
use crate::{sink_debug, sink_info, sink_trace, sink_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    /// How long an unanswered call may ring, on either side.
    pub ring: Duration,
    /// How long an answered call may wait for remote media.
    pub negotiation: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            ring: Duration::from_secs(30),
            negotiation: Duration::from_secs(15),
        }
    }
}

/// One party's side of a call.
///
/// Single-threaded and passive: the owner feeds it relay messages
/// ([`handle_signal`](Self::handle_signal)), user actions and the clock
/// ([`poll`](Self::poll)), then drains what it wants sent and shown.
pub struct CallMachine {
    display_name: DisplayName,
    identity: Option<ConnectionId>,
    local_media: Option<LocalMedia>,
    media_source: Option<Box<dyn MediaSource>>,
    factory: Box<dyn EngineFactory>,
    state: CallState,
    timeouts: CallTimeouts,
    outgoing: VecDeque<SignalingMsg>,
    events: Vec<CallEvent>,
    log: Arc<dyn LogSink>,
}

impl CallMachine {
    pub fn new(display_name: impl Into<DisplayName>, factory: Box<dyn EngineFactory>) -> Self {
        Self {
            display_name: display_name.into(),
            identity: None,
            local_media: None,
            media_source: None,
            factory,
            state: CallState::Idle,
            timeouts: CallTimeouts::default(),
            outgoing: VecDeque::new(),
            events: Vec::new(),
            log: Arc::new(NoopLogSink),
        }
    }

    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_media_source(mut self, source: Box<dyn MediaSource>) -> Self {
        self.media_source = Some(source);
        self
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn phase(&self) -> CallPhase {
        self.state.phase()
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// The pending inbound call, while `Receiving`.
    pub fn descriptor(&self) -> Option<&CallDescriptor> {
        match &self.state {
            CallState::Receiving { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    pub fn local_media(&self) -> Option<&LocalMedia> {
        self.local_media.as_ref()
    }

    pub fn set_local_media(&mut self, media: LocalMedia) {
        self.local_media = Some(media);
    }

    /// Ask the media source for local media and keep it for later calls.
    pub fn acquire_media(&mut self) -> Result<&LocalMedia, CallError> {
        let Some(source) = self.media_source.as_mut() else {
            return Err(CallError::NoLocalMedia);
        };
        match source.acquire() {
            Ok(media) => {
                sink_info!(self.log, "local media ready: {}", media.label);
                Ok(self.local_media.insert(media))
            }
            Err(e) => {
                sink_warn!(self.log, "could not acquire local media: {}", e);
                Err(e.into())
            }
        }
    }

    fn ensure_media(&mut self) -> Result<LocalMedia, CallError> {
        if let Some(media) = &self.local_media {
            return Ok(media.clone());
        }
        self.acquire_media().cloned()
    }

    /// Apply one message received from the relay.
    pub fn handle_signal(&mut self, msg: SignalingMsg, now: Instant) {
        match msg {
            SignalingMsg::Me { id } => {
                sink_info!(self.log, "relay assigned identity {}", id);
                self.identity = Some(id.clone());
                self.events.push(CallEvent::IdentityAssigned(id));
            }
            SignalingMsg::CallUser { from, name, signal } => {
                self.on_incoming_call(from, name, signal, now);
            }
            SignalingMsg::CallAccepted { signal } => self.on_call_accepted(&signal, now),
            SignalingMsg::CallFailed { peer, reason } => self.on_call_failed(&peer, reason),
            SignalingMsg::Pong { nonce: _nonce } => sink_trace!(self.log, "pong {}", _nonce),
            other @ (SignalingMsg::PlaceCall { .. }
            | SignalingMsg::AcceptCall { .. }
            | SignalingMsg::DeclineCall { .. }
            | SignalingMsg::Ping { .. }) => {
                sink_warn!(self.log, "ignoring client-only {}", other.kind());
            }
        }
    }

    fn on_incoming_call(
        &mut self,
        from: ConnectionId,
        name: DisplayName,
        signal: Signal,
        now: Instant,
    ) {
        match self.phase() {
            CallPhase::Idle | CallPhase::Ended => {
                sink_info!(self.log, "incoming call from {} ({})", from, name);
                self.state = CallState::Receiving {
                    descriptor: CallDescriptor {
                        is_receiving_call: true,
                        caller: from.clone(),
                        caller_name: name.clone(),
                        signal,
                    },
                    deadline: now + self.timeouts.ring,
                };
                self.events.push(CallEvent::IncomingCall { from, name });
            }
            phase => {
                sink_info!(self.log, "declining call from {}: busy ({:?})", from, phase);
                self.outgoing.push_back(SignalingMsg::DeclineCall {
                    to: from.clone(),
                    reason: CallFailCode::Busy.as_u16(),
                });
                self.events.push(CallEvent::BusyDeclined { from });
            }
        }
    }

    fn on_call_accepted(&mut self, signal: &[u8], now: Instant) {
        let CallState::Placing {
            engine,
            answered,
            deadline,
            ..
        } = &mut self.state
        else {
            sink_warn!(
                self.log,
                "callaccepted while {:?}; dropping",
                self.state.phase()
            );
            return;
        };
        if *answered {
            sink_warn!(self.log, "duplicate callaccepted; dropping");
            return;
        }
        if let Err(e) = engine.feed(signal) {
            self.end(EndReason::EngineFailure(e.to_string()));
            return;
        }
        *answered = true;
        *deadline = now + self.timeouts.negotiation;
        self.drive_engine();
    }

    fn on_call_failed(&mut self, peer: &str, reason: u16) {
        let ours = matches!(&self.state, CallState::Placing { peer: p, .. } if p == peer);
        if ours {
            self.end(EndReason::Rejected { reason });
        } else {
            sink_debug!(self.log, "call-failed for {} is not about our call", peer);
        }
    }

    /// Start a call to `target`. Needs an identity and local media (acquired
    /// on demand when a media source is set).
    pub fn place_call(&mut self, target: &str, now: Instant) -> Result<(), CallError> {
        let phase = self.phase();
        if !matches!(phase, CallPhase::Idle | CallPhase::Ended) {
            return Err(CallError::InvalidState {
                action: "place a call",
                phase,
            });
        }
        if self.identity.is_none() {
            return Err(CallError::NoIdentity);
        }
        let media = self.ensure_media()?;

        let engine = match self.factory.create(NegotiationRole::Initiator, &media) {
            Ok(engine) => engine,
            Err(e) => {
                self.end(EndReason::EngineFailure(e.to_string()));
                return Err(e.into());
            }
        };
        sink_info!(self.log, "calling {}", target);
        self.state = CallState::Placing {
            peer: target.to_owned(),
            engine,
            offer_sent: false,
            answered: false,
            deadline: now + self.timeouts.ring,
        };
        self.drive_engine();
        Ok(())
    }

    /// Answer the pending inbound call.
    pub fn accept_call(&mut self, now: Instant) -> Result<(), CallError> {
        let phase = self.phase();
        if phase != CallPhase::Receiving {
            return Err(CallError::InvalidState {
                action: "accept a call",
                phase,
            });
        }
        let media = self.ensure_media()?;

        let descriptor = match mem::replace(&mut self.state, CallState::Idle) {
            CallState::Receiving { descriptor, .. } => descriptor,
            other => {
                self.state = other;
                return Err(CallError::InvalidState {
                    action: "accept a call",
                    phase,
                });
            }
        };

        let mut engine = match self.factory.create(NegotiationRole::Responder, &media) {
            Ok(engine) => engine,
            Err(e) => {
                self.end(EndReason::EngineFailure(e.to_string()));
                return Err(e.into());
            }
        };
        if let Err(e) = engine.feed(&descriptor.signal) {
            engine.destroy();
            self.end(EndReason::EngineFailure(e.to_string()));
            return Err(e.into());
        }

        sink_info!(self.log, "accepted call from {}", descriptor.caller);
        self.state = CallState::Answering {
            peer: descriptor.caller,
            engine,
            answer_sent: false,
            deadline: now + self.timeouts.negotiation,
        };
        self.drive_engine();
        Ok(())
    }

    /// Refuse the pending inbound call and go back to `Idle`.
    pub fn decline_call(&mut self) -> Result<(), CallError> {
        match mem::replace(&mut self.state, CallState::Idle) {
            CallState::Receiving { descriptor, .. } => {
                sink_info!(self.log, "declined call from {}", descriptor.caller);
                self.outgoing.push_back(SignalingMsg::DeclineCall {
                    to: descriptor.caller,
                    reason: CallFailCode::Declined.as_u16(),
                });
                Ok(())
            }
            other => {
                let phase = other.phase();
                self.state = other;
                Err(CallError::InvalidState {
                    action: "decline a call",
                    phase,
                })
            }
        }
    }

    /// End the current call; the engine is destroyed before this returns.
    pub fn hang_up(&mut self) -> Result<(), CallError> {
        match self.phase() {
            CallPhase::Placing | CallPhase::Answering | CallPhase::Connected => {
                self.end(EndReason::LocalHangUp);
                Ok(())
            }
            phase => Err(CallError::InvalidState {
                action: "hang up",
                phase,
            }),
        }
    }

    /// Drop all call state and return to `Idle`. Identity and local media
    /// are kept.
    pub fn reset(&mut self) {
        if let Some(engine) = self.state.engine_mut() {
            engine.destroy();
        }
        self.state = CallState::Idle;
    }

    /// Pull engine events and enforce deadlines.
    pub fn poll(&mut self, now: Instant) {
        self.drive_engine();
        if let Some(deadline) = self.state.deadline()
            && now >= deadline
        {
            sink_warn!(
                self.log,
                "call with {} timed out while {:?}",
                self.state.peer().unwrap_or("?"),
                self.state.phase()
            );
            self.end(EndReason::Timeout);
        }
    }

    pub fn drain_outgoing(&mut self) -> Vec<SignalingMsg> {
        self.outgoing.drain(..).collect()
    }

    /// Oldest queued message, left in place until [`pop_outgoing`](Self::pop_outgoing).
    pub fn next_outgoing(&self) -> Option<&SignalingMsg> {
        self.outgoing.front()
    }

    pub fn pop_outgoing(&mut self) -> Option<SignalingMsg> {
        self.outgoing.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<CallEvent> {
        mem::take(&mut self.events)
    }

    fn drive_engine(&mut self) {
        let events = match self.state.engine_mut() {
            Some(engine) => engine.poll(),
            None => return,
        };
        for ev in events {
            if self.state.engine_mut().is_none() {
                break;
            }
            match ev {
                EngineEvent::Signal(signal) => self.on_local_signal(signal),
                EngineEvent::RemoteMedia(remote) => self.on_remote_media(remote),
                EngineEvent::ConnectionLost => {
                    sink_info!(self.log, "peer connection lost");
                    self.end(EndReason::RemoteLost);
                }
                EngineEvent::Failed(why) => {
                    sink_warn!(self.log, "engine failed: {}", why);
                    self.end(EndReason::EngineFailure(why));
                }
            }
        }
    }

    fn on_local_signal(&mut self, signal: Signal) {
        match &mut self.state {
            CallState::Placing {
                peer, offer_sent, ..
            } if !*offer_sent => {
                *offer_sent = true;
                self.outgoing.push_back(SignalingMsg::PlaceCall {
                    to: peer.clone(),
                    from: self.identity.clone().unwrap_or_default(),
                    name: self.display_name.clone(),
                    signal,
                });
            }
            CallState::Answering {
                peer, answer_sent, ..
            } if !*answer_sent => {
                *answer_sent = true;
                self.outgoing.push_back(SignalingMsg::AcceptCall {
                    to: peer.clone(),
                    signal,
                });
            }
            _ => sink_debug!(self.log, "dropping extra payload ({} bytes)", signal.len()),
        }
    }

    fn on_remote_media(&mut self, remote: RemoteMedia) {
        match mem::replace(&mut self.state, CallState::Idle) {
            CallState::Placing { peer, engine, .. } | CallState::Answering { peer, engine, .. } => {
                sink_info!(self.log, "connected to {} ({})", peer, remote.label);
                self.events.push(CallEvent::RemoteMedia(remote.clone()));
                self.events.push(CallEvent::Connected { peer: peer.clone() });
                self.state = CallState::Connected {
                    peer,
                    engine,
                    remote,
                };
            }
            other => {
                sink_debug!(self.log, "remote media while {:?}; ignoring", other.phase());
                self.state = other;
            }
        }
    }

    fn end(&mut self, reason: EndReason) {
        let mut prev = mem::replace(&mut self.state, CallState::Ended(reason.clone()));
        if let Some(engine) = prev.engine_mut() {
            engine.destroy();
        }
        sink_info!(self.log, "call ended: {}", reason);
        self.events.push(CallEvent::Ended(reason));
    }
}

impl Drop for CallMachine {
    fn drop(&mut self) {
        if let Some(engine) = self.state.engine_mut() {
            engine.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::endpoint::loopback::{LoopbackFactory, StaticMediaSource};
    use crate::endpoint::media::MediaError;

    fn machine(name: &str, id: &str) -> (CallMachine, LoopbackFactory) {
        let factory = LoopbackFactory::new();
        let mut m = CallMachine::new(name, Box::new(factory.clone()))
            .with_media_source(Box::new(StaticMediaSource::new(format!("{id}-cam"))));
        m.handle_signal(SignalingMsg::Me { id: id.into() }, Instant::now());
        m.drain_events();
        (m, factory)
    }

    fn incoming(from: &str, signal: &[u8]) -> SignalingMsg {
        SignalingMsg::CallUser {
            from: from.into(),
            name: "Alice".into(),
            signal: signal.to_vec(),
        }
    }

    #[test]
    fn identity_comes_from_me() {
        let mut m = CallMachine::new("Bob", Box::new(LoopbackFactory::new()));
        assert_eq!(m.identity(), None);
        m.handle_signal(SignalingMsg::Me { id: "bob".into() }, Instant::now());
        assert_eq!(m.identity(), Some("bob"));
        assert_eq!(
            m.drain_events(),
            vec![CallEvent::IdentityAssigned("bob".into())]
        );
    }

    #[test]
    fn incoming_call_descriptor_matches_message_and_touches_no_engine() {
        let (mut m, factory) = machine("Bob", "bob");
        m.handle_signal(incoming("alice", b"offer:alice-cam"), Instant::now());

        assert_eq!(m.phase(), CallPhase::Receiving);
        assert_eq!(
            m.descriptor(),
            Some(&CallDescriptor {
                is_receiving_call: true,
                caller: "alice".into(),
                caller_name: "Alice".into(),
                signal: b"offer:alice-cam".to_vec(),
            })
        );
        assert!(factory.probes().is_empty());
        assert_eq!(
            m.drain_events(),
            vec![CallEvent::IncomingCall {
                from: "alice".into(),
                name: "Alice".into()
            }]
        );
        assert!(m.drain_outgoing().is_empty());
    }

    #[test]
    fn place_call_needs_identity_and_media() {
        let mut m = CallMachine::new("Alice", Box::new(LoopbackFactory::new()));
        assert_eq!(
            m.place_call("bob", Instant::now()),
            Err(CallError::NoIdentity)
        );

        m.handle_signal(SignalingMsg::Me { id: "alice".into() }, Instant::now());
        assert_eq!(
            m.place_call("bob", Instant::now()),
            Err(CallError::NoLocalMedia)
        );

        let mut m = CallMachine::new("Alice", Box::new(LoopbackFactory::new()))
            .with_media_source(Box::new(StaticMediaSource::failing(MediaError::Denied)));
        m.handle_signal(SignalingMsg::Me { id: "alice".into() }, Instant::now());
        assert_eq!(
            m.place_call("bob", Instant::now()),
            Err(CallError::Media(MediaError::Denied))
        );
        assert_eq!(m.phase(), CallPhase::Idle);
    }

    #[test]
    fn offer_is_sent_exactly_once() {
        let (mut m, factory) = machine("Alice", "alice");
        let now = Instant::now();
        m.place_call("bob", now).unwrap();

        assert_eq!(m.phase(), CallPhase::Placing);
        assert_eq!(
            m.drain_outgoing(),
            vec![SignalingMsg::PlaceCall {
                to: "bob".into(),
                from: "alice".into(),
                name: "Alice".into(),
                signal: b"offer:alice-cam".to_vec(),
            }]
        );

        factory
            .last_probe()
            .unwrap()
            .inject(EngineEvent::Signal(b"offer:again".to_vec()));
        m.poll(now);
        assert!(m.drain_outgoing().is_empty());
    }

    #[test]
    fn caller_connects_only_once_remote_media_arrives() {
        let (mut m, factory) = machine("Alice", "alice");
        factory.withhold_media(true);
        let now = Instant::now();
        m.place_call("bob", now).unwrap();
        m.drain_outgoing();

        m.handle_signal(
            SignalingMsg::CallAccepted {
                signal: b"answer:bob-cam".to_vec(),
            },
            now,
        );
        assert_eq!(m.phase(), CallPhase::Placing);

        let remote = RemoteMedia {
            label: "bob-cam".into(),
        };
        factory
            .last_probe()
            .unwrap()
            .inject(EngineEvent::RemoteMedia(remote.clone()));
        m.poll(now);

        assert_eq!(m.phase(), CallPhase::Connected);
        assert_eq!(
            m.drain_events(),
            vec![
                CallEvent::RemoteMedia(remote),
                CallEvent::Connected { peer: "bob".into() }
            ]
        );
    }

    #[test]
    fn callee_answers_and_connects_on_remote_media() {
        let (mut m, factory) = machine("Bob", "bob");
        let now = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), now);
        m.drain_events();

        m.accept_call(now).unwrap();

        let probe = factory.last_probe().unwrap();
        assert_eq!(probe.role(), NegotiationRole::Responder);
        assert_eq!(probe.fed(), 1);
        assert_eq!(
            m.drain_outgoing(),
            vec![SignalingMsg::AcceptCall {
                to: "alice".into(),
                signal: b"answer:bob-cam".to_vec(),
            }]
        );
        assert_eq!(m.phase(), CallPhase::Connected);
        assert!(m.drain_events().contains(&CallEvent::RemoteMedia(RemoteMedia {
            label: "alice-cam".into()
        })));
        assert!(m.descriptor().is_none());
    }

    #[test]
    fn callee_waits_in_answering_without_media() {
        let (mut m, factory) = machine("Bob", "bob");
        factory.withhold_media(true);
        let now = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), now);
        m.accept_call(now).unwrap();

        assert_eq!(m.phase(), CallPhase::Answering);
        assert!(
            !m.drain_events()
                .iter()
                .any(|e| matches!(e, CallEvent::Connected { .. }))
        );
    }

    #[test]
    fn hang_up_destroys_engine_and_it_is_never_fed_again() {
        let (mut m, factory) = machine("Alice", "alice");
        let now = Instant::now();
        m.place_call("bob", now).unwrap();
        let probe = factory.last_probe().unwrap();

        m.hang_up().unwrap();
        assert!(probe.is_destroyed());
        assert_eq!(m.phase(), CallPhase::Ended);

        m.handle_signal(
            SignalingMsg::CallAccepted {
                signal: b"answer:bob-cam".to_vec(),
            },
            now,
        );
        m.poll(now);
        assert_eq!(probe.fed_after_destroy(), 0);
        assert_eq!(probe.fed(), 0);
        assert_eq!(m.state().phase(), CallPhase::Ended);
    }

    #[test]
    fn second_caller_gets_busy() {
        let (mut m, _factory) = machine("Alice", "alice");
        let now = Instant::now();
        m.place_call("bob", now).unwrap();
        m.drain_outgoing();
        m.drain_events();

        m.handle_signal(incoming("carol", b"offer:carol-cam"), now);

        assert_eq!(m.phase(), CallPhase::Placing);
        assert_eq!(
            m.drain_outgoing(),
            vec![SignalingMsg::DeclineCall {
                to: "carol".into(),
                reason: CallFailCode::Busy.as_u16(),
            }]
        );
        assert_eq!(
            m.drain_events(),
            vec![CallEvent::BusyDeclined {
                from: "carol".into()
            }]
        );
    }

    #[test]
    fn decline_sends_declined_and_returns_to_idle() {
        let (mut m, factory) = machine("Bob", "bob");
        m.handle_signal(incoming("alice", b"offer:alice-cam"), Instant::now());
        m.decline_call().unwrap();

        assert_eq!(m.phase(), CallPhase::Idle);
        assert!(factory.probes().is_empty());
        assert_eq!(
            m.drain_outgoing(),
            vec![SignalingMsg::DeclineCall {
                to: "alice".into(),
                reason: CallFailCode::Declined.as_u16(),
            }]
        );
        assert!(matches!(
            m.decline_call(),
            Err(CallError::InvalidState { .. })
        ));
    }

    #[test]
    fn rejection_from_callee_ends_call() {
        let (mut m, factory) = machine("Alice", "alice");
        m.place_call("bob", Instant::now()).unwrap();

        m.handle_signal(
            SignalingMsg::CallFailed {
                peer: "someone-else".into(),
                reason: CallFailCode::Busy.as_u16(),
            },
            Instant::now(),
        );
        assert_eq!(m.phase(), CallPhase::Placing);

        m.handle_signal(
            SignalingMsg::CallFailed {
                peer: "bob".into(),
                reason: CallFailCode::Busy.as_u16(),
            },
            Instant::now(),
        );
        match m.state() {
            CallState::Ended(reason) => assert_eq!(reason.fail_code(), Some(CallFailCode::Busy)),
            other => panic!("expected Ended, got {other:?}"),
        }
        assert!(factory.last_probe().unwrap().is_destroyed());
    }

    #[test]
    fn unanswered_call_times_out() {
        let (mut m, factory) = machine("Alice", "alice");
        let t0 = Instant::now();
        m.place_call("bob", t0).unwrap();

        m.poll(t0 + Duration::from_secs(29));
        assert_eq!(m.phase(), CallPhase::Placing);

        m.poll(t0 + Duration::from_secs(30));
        assert_eq!(m.phase(), CallPhase::Ended);
        let events = m.drain_events();
        assert!(events.contains(&CallEvent::Ended(EndReason::Timeout)));
        assert!(factory.last_probe().unwrap().is_destroyed());
    }

    #[test]
    fn answered_call_without_media_times_out_on_negotiation() {
        let (mut m, factory) = machine("Bob", "bob");
        factory.withhold_media(true);
        let m_timeouts = CallTimeouts {
            ring: Duration::from_secs(60),
            negotiation: Duration::from_secs(5),
        };
        m = m.with_timeouts(m_timeouts);
        let t0 = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), t0);
        m.accept_call(t0).unwrap();

        m.poll(t0 + Duration::from_secs(4));
        assert_eq!(m.phase(), CallPhase::Answering);
        m.poll(t0 + Duration::from_secs(5));
        assert_eq!(m.phase(), CallPhase::Ended);
    }

    #[test]
    fn unanswered_ring_on_callee_side_expires() {
        let (mut m, _factory) = machine("Bob", "bob");
        let t0 = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), t0);
        m.poll(t0 + CallTimeouts::default().ring);
        assert_eq!(m.phase(), CallPhase::Ended);
        assert!(m.descriptor().is_none());
    }

    #[test]
    fn lost_connection_and_engine_failure_end_the_call() {
        let (mut m, factory) = machine("Bob", "bob");
        let now = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), now);
        m.accept_call(now).unwrap();
        factory
            .last_probe()
            .unwrap()
            .inject(EngineEvent::ConnectionLost);
        m.poll(now);
        assert!(matches!(m.state(), CallState::Ended(EndReason::RemoteLost)));

        m.handle_signal(incoming("alice", b"offer:alice-cam"), now);
        assert_eq!(m.phase(), CallPhase::Receiving);
        m.accept_call(now).unwrap();
        factory
            .last_probe()
            .unwrap()
            .inject(EngineEvent::Failed("ice gave up".into()));
        m.poll(now);
        assert!(matches!(
            m.state(),
            CallState::Ended(EndReason::EngineFailure(_))
        ));
        assert!(factory.probes().iter().all(|p| p.is_destroyed()));
    }

    #[test]
    fn bad_offer_is_an_engine_failure() {
        let (mut m, factory) = machine("Bob", "bob");
        m.handle_signal(incoming("alice", b"not a payload"), Instant::now());
        assert!(matches!(
            m.accept_call(Instant::now()),
            Err(CallError::Engine(_))
        ));
        assert_eq!(m.phase(), CallPhase::Ended);
        assert!(factory.last_probe().unwrap().is_destroyed());
    }

    #[test]
    fn engine_create_failure_ends_call() {
        let (mut m, factory) = machine("Alice", "alice");
        factory.fail_next_create("no codecs");
        assert!(matches!(
            m.place_call("bob", Instant::now()),
            Err(CallError::Engine(_))
        ));
        assert_eq!(m.phase(), CallPhase::Ended);

        m.place_call("bob", Instant::now()).unwrap();
        assert_eq!(m.phase(), CallPhase::Placing);
    }

    #[test]
    fn invalid_transitions_are_refused() {
        let (mut m, _factory) = machine("Alice", "alice");
        assert!(matches!(
            m.accept_call(Instant::now()),
            Err(CallError::InvalidState {
                phase: CallPhase::Idle,
                ..
            })
        ));
        assert!(m.hang_up().is_err());

        m.place_call("bob", Instant::now()).unwrap();
        assert!(matches!(
            m.place_call("carol", Instant::now()),
            Err(CallError::InvalidState { .. })
        ));
    }

    #[test]
    fn reset_returns_to_idle_and_keeps_identity() {
        let (mut m, factory) = machine("Bob", "bob");
        let now = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), now);
        m.accept_call(now).unwrap();
        assert_eq!(m.phase(), CallPhase::Connected);

        m.reset();
        assert_eq!(m.phase(), CallPhase::Idle);
        assert_eq!(m.identity(), Some("bob"));
        assert!(m.local_media().is_some());
        assert!(factory.last_probe().unwrap().is_destroyed());
    }

    #[test]
    fn pong_from_relay_changes_nothing() {
        let (mut m, factory) = machine("Bob", "bob");
        m.handle_signal(SignalingMsg::Pong { nonce: 7 }, Instant::now());
        assert_eq!(m.phase(), CallPhase::Idle);
        assert!(m.drain_events().is_empty());
        assert!(m.next_outgoing().is_none());
        assert!(factory.probes().is_empty());
    }

    #[test]
    fn queued_messages_leave_oldest_first() {
        let (mut m, _factory) = machine("Bob", "bob");
        let now = Instant::now();
        m.handle_signal(incoming("alice", b"offer:alice-cam"), now);
        m.handle_signal(incoming("carol", b"offer:carol-cam"), now);
        m.handle_signal(incoming("dave", b"offer:dave-cam"), now);

        let first = m.next_outgoing().cloned();
        assert_eq!(
            first,
            Some(SignalingMsg::DeclineCall {
                to: "carol".into(),
                reason: CallFailCode::Busy.as_u16(),
            })
        );
        assert_eq!(m.pop_outgoing(), first);
        assert_eq!(m.drain_outgoing().len(), 1);
        assert!(m.next_outgoing().is_none());
    }
}
