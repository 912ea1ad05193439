//! Deterministic in-process engine and media source.
//!
//! Payloads are `offer:<label>` / `answer:<label>`, where `label` is the
//! sender's local media label; the receiving engine reports that label as
//! its remote media. Every engine shares its state with an [`EngineProbe`]
//! so a test (or a demo) can look inside after the machine owns the engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::endpoint::engine::{
    EngineError, EngineEvent, EngineFactory, NegotiationEngine, NegotiationRole,
};
use crate::endpoint::media::{LocalMedia, MediaError, MediaSource, RemoteMedia};

const OFFER: &str = "offer";
const ANSWER: &str = "answer";

#[derive(Debug, Default)]
struct ProbeState {
    destroyed: bool,
    fed: usize,
    fed_after_destroy: usize,
    withhold_media: bool,
    pending: VecDeque<EngineEvent>,
}

/// Shared view of one loopback engine.
#[derive(Debug, Clone)]
pub struct EngineProbe {
    role: NegotiationRole,
    state: Arc<Mutex<ProbeState>>,
}

impl EngineProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Payloads accepted while alive.
    pub fn fed(&self) -> usize {
        self.lock().fed
    }

    /// Payloads offered after `destroy`; anything but zero means reuse.
    pub fn fed_after_destroy(&self) -> usize {
        self.lock().fed_after_destroy
    }

    /// Queue an event for the engine's next `poll`, e.g. `ConnectionLost`.
    pub fn inject(&self, ev: EngineEvent) {
        let mut st = self.lock();
        if !st.destroyed {
            st.pending.push_back(ev);
        }
    }
}

pub struct LoopbackEngine {
    probe: EngineProbe,
    local: LocalMedia,
}

impl LoopbackEngine {
    fn new(role: NegotiationRole, local: &LocalMedia, withhold_media: bool) -> Self {
        let probe = EngineProbe {
            role,
            state: Arc::new(Mutex::new(ProbeState {
                withhold_media,
                ..ProbeState::default()
            })),
        };
        if role == NegotiationRole::Initiator {
            probe
                .lock()
                .pending
                .push_back(EngineEvent::Signal(payload(OFFER, &local.label)));
        }
        Self {
            probe,
            local: local.clone(),
        }
    }

    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }
}

fn payload(kind: &str, label: &str) -> Vec<u8> {
    format!("{kind}:{label}").into_bytes()
}

impl NegotiationEngine for LoopbackEngine {
    fn feed(&mut self, signal: &[u8]) -> Result<(), EngineError> {
        let mut st = self.probe.lock();
        if st.destroyed {
            st.fed_after_destroy += 1;
            return Err(EngineError::Destroyed);
        }

        let text = std::str::from_utf8(signal)
            .map_err(|_| EngineError::Rejected("payload is not UTF-8".into()))?;
        let (kind, remote_label) = text
            .split_once(':')
            .ok_or_else(|| EngineError::Rejected(format!("malformed payload {text:?}")))?;

        let expected = match self.probe.role {
            NegotiationRole::Initiator => ANSWER,
            NegotiationRole::Responder => OFFER,
        };
        if kind != expected {
            return Err(EngineError::Rejected(format!(
                "expected {expected}, got {kind}"
            )));
        }

        st.fed += 1;
        if self.probe.role == NegotiationRole::Responder {
            st.pending
                .push_back(EngineEvent::Signal(payload(ANSWER, &self.local.label)));
        }
        if !st.withhold_media {
            st.pending.push_back(EngineEvent::RemoteMedia(RemoteMedia {
                label: remote_label.to_string(),
            }));
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        self.probe.lock().pending.drain(..).collect()
    }

    fn destroy(&mut self) {
        let mut st = self.probe.lock();
        st.destroyed = true;
        st.pending.clear();
    }
}

/// Builds [`LoopbackEngine`]s and remembers their probes. Clones share the
/// probe list, so keep one clone after handing the factory to a machine.
#[derive(Debug, Clone, Default)]
pub struct LoopbackFactory {
    probes: Arc<Mutex<Vec<EngineProbe>>>,
    settings: Arc<Mutex<FactorySettings>>,
}

#[derive(Debug, Default)]
struct FactorySettings {
    withhold_media: bool,
    fail_next_create: Option<String>,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines created from now on never report remote media.
    pub fn withhold_media(&self, on: bool) {
        self.settings_mut().withhold_media = on;
    }

    pub fn fail_next_create(&self, why: impl Into<String>) {
        self.settings_mut().fail_next_create = Some(why.into());
    }

    /// Probes of every engine created so far, oldest first.
    pub fn probes(&self) -> Vec<EngineProbe> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_probe(&self) -> Option<EngineProbe> {
        self.probes().pop()
    }

    fn settings_mut(&self) -> MutexGuard<'_, FactorySettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EngineFactory for LoopbackFactory {
    fn create(
        &mut self,
        role: NegotiationRole,
        local: &LocalMedia,
    ) -> Result<Box<dyn NegotiationEngine>, EngineError> {
        let withhold = {
            let mut s = self.settings_mut();
            if let Some(why) = s.fail_next_create.take() {
                return Err(EngineError::Create(why));
            }
            s.withhold_media
        };
        let engine = LoopbackEngine::new(role, local, withhold);
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(engine.probe());
        Ok(Box::new(engine))
    }
}

/// Always hands out the same media, or always fails.
#[derive(Debug, Clone)]
pub struct StaticMediaSource {
    result: Result<LocalMedia, MediaError>,
}

impl StaticMediaSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            result: Ok(LocalMedia {
                label: label.into(),
            }),
        }
    }

    pub fn failing(err: MediaError) -> Self {
        Self { result: Err(err) }
    }
}

impl MediaSource for StaticMediaSource {
    fn acquire(&mut self) -> Result<LocalMedia, MediaError> {
        self.result.clone()
    }
}
