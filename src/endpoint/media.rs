use thiserror::Error;

/// Handle to locally captured media, bound into an engine at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMedia {
    pub label: String,
}

/// Handle to the peer's media, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMedia {
    pub label: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("media device unavailable: {0}")]
    Unavailable(String),
    #[error("media access denied")]
    Denied,
}

/// Local capture (camera, microphone, a test pattern).
pub trait MediaSource: Send {
    fn acquire(&mut self) -> Result<LocalMedia, MediaError>;
}
