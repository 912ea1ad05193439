/// Why a call attempt did not go through, carried by `decline-call` and
/// `call-failed`.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallFailCode {
    /// The relay has no live connection for the target identity.
    Unreachable = 1,
    /// The callee already has a call in progress.
    Busy = 2,
    /// The callee refused the call.
    Declined = 3,
}

impl CallFailCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Unreachable),
            2 => Some(Self::Busy),
            3 => Some(Self::Declined),
            _ => None,
        }
    }
}
