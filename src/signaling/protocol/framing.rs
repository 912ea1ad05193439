use std::io::{self, Read, Write};

use super::constants::HEADER_LEN;
use super::{FrameError, MsgType, PROTO_VERSION, ProtoError};

/// Write a single frame: [ver][type][flags u16=0][len u32][body...]
pub fn write_frame<W: Write>(w: &mut W, msg_type: MsgType, body: &[u8]) -> io::Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "body too large"))?;

    let mut header = [0u8; HEADER_LEN];
    header[0] = PROTO_VERSION;
    header[1] = msg_type.as_u8();
    header[4..8].copy_from_slice(&len.to_be_bytes());

    w.write_all(&header)?;
    w.write_all(body)?;
    w.flush()
}

/// Read a single frame, enforcing `max_body`.
pub fn read_frame<R: Read>(r: &mut R, max_body: usize) -> Result<(MsgType, Vec<u8>), FrameError> {
    let mut header = [0u8; HEADER_LEN];
    r.read_exact(&mut header)?;

    if header[0] != PROTO_VERSION {
        return Err(ProtoError::InvalidFormat("bad proto version").into());
    }
    let msg_type = MsgType::from_u8(header[1])?;

    // flags (header[2..4]) are reserved
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > max_body {
        return Err(ProtoError::TooLarge { len, max: max_body }.into());
    }

    let mut body = vec![0u8; len];
    r.read_exact(&mut body)?;

    Ok((msg_type, body))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_layout() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MsgType::Ping, &[9; 8]).unwrap();
        assert_eq!(&buf[..8], &[PROTO_VERSION, 0x30, 0, 0, 0, 0, 0, 8]);
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn oversized_body_rejected_before_allocation() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MsgType::CallAccepted, &[0u8; 64]).unwrap();
        match read_frame(&mut Cursor::new(buf), 32) {
            Err(FrameError::Proto(ProtoError::TooLarge { len: 64, max: 32 })) => {}
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn wrong_version_rejected() {
        let raw = vec![7u8, 0x30, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            read_frame(&mut Cursor::new(raw), 16),
            Err(FrameError::Proto(ProtoError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        let raw = vec![PROTO_VERSION, 0x7f, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            read_frame(&mut Cursor::new(raw), 16),
            Err(FrameError::Proto(ProtoError::UnknownType(0x7f)))
        ));
    }

    #[test]
    fn short_header_is_eof() {
        let err = read_frame(&mut Cursor::new(vec![PROTO_VERSION, 0x30]), 16).unwrap_err();
        assert!(err.is_disconnect());
    }
}
