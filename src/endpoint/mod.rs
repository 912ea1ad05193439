//! One party's view of a call: the call-state machine, the collaborators it
//! drives (media source, negotiation engine) and the glue to the relay.

pub mod call_error;
pub mod call_event;
pub mod call_machine;
pub mod call_session;
pub mod call_state;
pub mod engine;
pub mod loopback;
pub mod media;

pub use call_error::{CallError, SessionError};
pub use call_event::CallEvent;
pub use call_machine::{CallMachine, CallTimeouts};
pub use call_session::CallSession;
pub use call_state::{CallDescriptor, CallPhase, CallState, EndReason};
pub use engine::{EngineError, EngineEvent, EngineFactory, NegotiationEngine, NegotiationRole};
pub use media::{LocalMedia, MediaError, MediaSource, RemoteMedia};
