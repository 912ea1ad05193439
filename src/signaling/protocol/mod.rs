//! Wire protocol between endpoints and the relay.
//!
//! Frame header:
//!   [ver: u8][msg_type: u8][flags: u16][body_len: u32]
//! followed by `body_len` bytes of message body (see [`codec`]).

pub mod codec;
pub mod constants;
pub mod errors;
pub mod fail_code;
pub mod framing;
pub mod msg;
pub mod msg_type;
pub mod types;

pub use codec::{decode_msg, encode_msg};
pub use constants::{MAX_BODY_LEN, PROTO_VERSION};
pub use errors::{FrameError, ProtoError};
pub use fail_code::CallFailCode;
pub use framing::{read_frame, write_frame};
pub use msg::SignalingMsg;
pub use msg_type::MsgType;
pub use types::{ConnectionId, DisplayName, Signal};

use std::io::{Read, Write};

/// Encode `msg` and write it as a single frame.
pub fn write_msg<W: Write>(w: &mut W, msg: &SignalingMsg) -> Result<(), FrameError> {
    let (msg_type, body) = encode_msg(msg)?;
    write_frame(w, msg_type, &body)?;
    Ok(())
}

/// Read one frame (bounded by `max_body`) and decode it.
pub fn read_msg<R: Read>(r: &mut R, max_body: usize) -> Result<SignalingMsg, FrameError> {
    let (msg_type, body) = read_frame(r, max_body)?;
    Ok(decode_msg(msg_type, &body)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Cursor;

    #[test]
    fn several_messages_share_one_stream_in_order() {
        let mut wire = Vec::new();
        write_msg(&mut wire, &SignalingMsg::Me { id: "A1".into() }).unwrap();
        write_msg(
            &mut wire,
            &SignalingMsg::CallAccepted {
                signal: vec![0, 1, 2, 255],
            },
        )
        .unwrap();

        let mut r = Cursor::new(wire);
        assert_eq!(
            read_msg(&mut r, MAX_BODY_LEN).unwrap(),
            SignalingMsg::Me { id: "A1".into() }
        );
        assert_eq!(
            read_msg(&mut r, MAX_BODY_LEN).unwrap(),
            SignalingMsg::CallAccepted {
                signal: vec![0, 1, 2, 255]
            }
        );
        let eof = read_msg(&mut r, MAX_BODY_LEN);
        assert!(matches!(eof, Err(FrameError::Io(_))));
    }
}
