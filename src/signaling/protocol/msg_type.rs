use crate::signaling::protocol::ProtoError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MsgType {
    Me = 0x01,

    PlaceCall = 0x10,
    CallUser = 0x11,
    AcceptCall = 0x12,
    CallAccepted = 0x13,
    DeclineCall = 0x14,
    CallFailed = 0x15,

    Ping = 0x30,
    Pong = 0x31,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Result<MsgType, ProtoError> {
        use MsgType::*;
        match v {
            0x01 => Ok(Me),
            0x10 => Ok(PlaceCall),
            0x11 => Ok(CallUser),
            0x12 => Ok(AcceptCall),
            0x13 => Ok(CallAccepted),
            0x14 => Ok(DeclineCall),
            0x15 => Ok(CallFailed),
            0x30 => Ok(Ping),
            0x31 => Ok(Pong),
            other => Err(ProtoError::UnknownType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
