use std::str;

use super::{MsgType, ProtoError, SignalingMsg};

// ---- Encode to body bytes -------------------------------------------------

pub fn encode_msg(msg: &SignalingMsg) -> Result<(MsgType, Vec<u8>), ProtoError> {
    use SignalingMsg::*;
    let mut body = Vec::new();

    let msg_type = match msg {
        Me { id } => {
            put_str16(&mut body, id)?;
            MsgType::Me
        }
        PlaceCall {
            to,
            from,
            name,
            signal,
        } => {
            put_str16(&mut body, to)?;
            put_str16(&mut body, from)?;
            put_str16(&mut body, name)?;
            put_bytes32(&mut body, signal)?;
            MsgType::PlaceCall
        }
        CallUser { from, name, signal } => {
            put_str16(&mut body, from)?;
            put_str16(&mut body, name)?;
            put_bytes32(&mut body, signal)?;
            MsgType::CallUser
        }
        AcceptCall { to, signal } => {
            put_str16(&mut body, to)?;
            put_bytes32(&mut body, signal)?;
            MsgType::AcceptCall
        }
        CallAccepted { signal } => {
            put_bytes32(&mut body, signal)?;
            MsgType::CallAccepted
        }
        DeclineCall { to, reason } => {
            put_str16(&mut body, to)?;
            put_u16(&mut body, *reason);
            MsgType::DeclineCall
        }
        CallFailed { peer, reason } => {
            put_str16(&mut body, peer)?;
            put_u16(&mut body, *reason);
            MsgType::CallFailed
        }
        Ping { nonce } => {
            put_u64(&mut body, *nonce);
            MsgType::Ping
        }
        Pong { nonce } => {
            put_u64(&mut body, *nonce);
            MsgType::Pong
        }
    };

    Ok((msg_type, body))
}

// ---- Decode from body bytes ----------------------------------------------

pub fn decode_msg(msg_type: MsgType, body: &[u8]) -> Result<SignalingMsg, ProtoError> {
    use SignalingMsg::*;
    let mut cursor = Cursor::new(body);

    let msg = match msg_type {
        MsgType::Me => Me {
            id: cursor.get_str16()?.to_owned(),
        },
        MsgType::PlaceCall => {
            let to = cursor.get_str16()?.to_owned();
            let from = cursor.get_str16()?.to_owned();
            let name = cursor.get_str16()?.to_owned();
            let signal = cursor.get_bytes32()?.to_vec();
            PlaceCall {
                to,
                from,
                name,
                signal,
            }
        }
        MsgType::CallUser => {
            let from = cursor.get_str16()?.to_owned();
            let name = cursor.get_str16()?.to_owned();
            let signal = cursor.get_bytes32()?.to_vec();
            CallUser { from, name, signal }
        }
        MsgType::AcceptCall => {
            let to = cursor.get_str16()?.to_owned();
            let signal = cursor.get_bytes32()?.to_vec();
            AcceptCall { to, signal }
        }
        MsgType::CallAccepted => CallAccepted {
            signal: cursor.get_bytes32()?.to_vec(),
        },
        MsgType::DeclineCall => {
            let to = cursor.get_str16()?.to_owned();
            let reason = cursor.get_u16()?;
            DeclineCall { to, reason }
        }
        MsgType::CallFailed => {
            let peer = cursor.get_str16()?.to_owned();
            let reason = cursor.get_u16()?;
            CallFailed { peer, reason }
        }
        MsgType::Ping => Ping {
            nonce: cursor.get_u64()?,
        },
        MsgType::Pong => Pong {
            nonce: cursor.get_u64()?,
        },
    };

    cursor.finish()?;
    Ok(msg)
}

// ---- Primitive write helpers ---------------------------------------------

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// str16 = u16 length + UTF-8 bytes
fn put_str16(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtoError> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| ProtoError::StringTooLong {
        max: u16::MAX as usize,
        actual: bytes.len(),
    })?;
    put_u16(buf, len);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// bytes32 = u32 length + raw bytes, copied verbatim
fn put_bytes32(buf: &mut Vec<u8>, b: &[u8]) -> Result<(), ProtoError> {
    let len = u32::try_from(b.len()).map_err(|_| ProtoError::PayloadTooLong { actual: b.len() })?;
    put_u32(buf, len);
    buf.extend_from_slice(b);
    Ok(())
}

// ---- Cursor for decoding --------------------------------------------------

#[derive(Debug)]
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtoError> {
        let head = self.get_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }

    fn get_u16(&mut self) -> Result<u16, ProtoError> {
        Ok(u16::from_be_bytes(self.take::<2>()?))
    }

    fn get_u32(&mut self) -> Result<u32, ProtoError> {
        Ok(u32::from_be_bytes(self.take::<4>()?))
    }

    fn get_u64(&mut self) -> Result<u64, ProtoError> {
        Ok(u64::from_be_bytes(self.take::<8>()?))
    }

    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtoError> {
        if self.buf.len() < len {
            return Err(ProtoError::Truncated);
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    fn get_str16(&mut self) -> Result<&'a str, ProtoError> {
        let len = self.get_u16()? as usize;
        let bytes = self.get_bytes(len)?;
        str::from_utf8(bytes).map_err(|_| ProtoError::InvalidUtf8)
    }

    fn get_bytes32(&mut self) -> Result<&'a [u8], ProtoError> {
        let len = self.get_u32()? as usize;
        self.get_bytes(len)
    }

    /// The whole body must be consumed.
    fn finish(self) -> Result<(), ProtoError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(ProtoError::InvalidFormat("trailing bytes in message body"))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn place_call_body_layout() {
        let msg = SignalingMsg::PlaceCall {
            to: "B1".into(),
            from: "A1".into(),
            name: "Al".into(),
            signal: vec![0xde, 0xad],
        };
        let (ty, body) = encode_msg(&msg).unwrap();
        assert_eq!(ty, MsgType::PlaceCall);
        assert_eq!(
            body,
            vec![
                0, 2, b'B', b'1', // to
                0, 2, b'A', b'1', // from
                0, 2, b'A', b'l', // name
                0, 0, 0, 2, 0xde, 0xad, // signal
            ]
        );
        assert_eq!(decode_msg(ty, &body).unwrap(), msg);
    }

    #[test]
    fn payload_bytes_survive_untouched() {
        // Not UTF-8, contains zeros and the frame version byte.
        let signal: Vec<u8> = (0..=255u8).rev().collect();
        let msg = SignalingMsg::CallUser {
            from: "A1".into(),
            name: "Alice".into(),
            signal: signal.clone(),
        };
        let (ty, body) = encode_msg(&msg).unwrap();
        match decode_msg(ty, &body).unwrap() {
            SignalingMsg::CallUser { signal: got, .. } => assert_eq!(got, signal),
            other => panic!("expected CallUser, got {other:?}"),
        }
    }

    #[test]
    fn empty_payload_and_name_are_legal() {
        let msg = SignalingMsg::CallUser {
            from: "A1".into(),
            name: String::new(),
            signal: Vec::new(),
        };
        let (ty, body) = encode_msg(&msg).unwrap();
        assert_eq!(decode_msg(ty, &body).unwrap(), msg);
    }

    #[test]
    fn truncated_body_is_rejected() {
        let (ty, body) = encode_msg(&SignalingMsg::AcceptCall {
            to: "A1".into(),
            signal: vec![1, 2, 3],
        })
        .unwrap();
        assert!(matches!(
            decode_msg(ty, &body[..body.len() - 1]),
            Err(ProtoError::Truncated)
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let (ty, mut body) = encode_msg(&SignalingMsg::Ping { nonce: 7 }).unwrap();
        body.push(0);
        assert!(matches!(
            decode_msg(ty, &body),
            Err(ProtoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn invalid_utf8_identity_is_rejected() {
        let body = vec![0, 2, 0xff, 0xfe];
        assert!(matches!(
            decode_msg(MsgType::Me, &body),
            Err(ProtoError::InvalidUtf8)
        ));
    }

    #[test]
    fn overlong_name_cannot_be_encoded() {
        let msg = SignalingMsg::CallUser {
            from: "A1".into(),
            name: "x".repeat(u16::MAX as usize + 1),
            signal: Vec::new(),
        };
        assert!(matches!(
            encode_msg(&msg),
            Err(ProtoError::StringTooLong { .. })
        ));
    }
}
