pub mod signaling_client_c;
pub mod signaling_client_error;
pub mod signaling_command;
pub mod signaling_event;

pub use signaling_client_c::SignalingClient;
pub use signaling_client_error::SignalingClientError;
pub use signaling_event::SignalingEvent;
