use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::trace;

use crate::value::Value;

use super::{
    Cursor, Encoder, MalformedCause, ProtocolError, decode, decompress,
    header::{
        ERROR_SENTINEL, HEADER_COMPRESSED, HEADER_ENDIAN, HEADER_KIND, HEADER_LENGTH, HEADER_SIZE,
        MAX_ERROR_LENGTH,
    },
    size_of,
};

/// Byte order of every multi-byte number in a message, declared by header byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big = 0,
    Little = 1,
}

impl Endian {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub(crate) fn write_u32(self, buf: &mut [u8], n: u32) {
        match self {
            Endian::Big => BigEndian::write_u32(buf, n),
            Endian::Little => LittleEndian::write_u32(buf, n),
        }
    }
}

impl TryFrom<u8> for Endian {
    type Error = MalformedCause;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Endian::Big),
            1 => Ok(Endian::Little),
            _ => Err(MalformedCause::Header("byte order must be 0 or 1")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Async = 0,
    Sync = 1,
    Response = 2,
}

impl TryFrom<u8> for MessageKind {
    type Error = MalformedCause;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(MessageKind::Async),
            1 => Ok(MessageKind::Sync),
            2 => Ok(MessageKind::Response),
            _ => Err(MalformedCause::Header("message kind must be 0, 1 or 2")),
        }
    }
}

/// The fixed 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub endian: Endian,
    pub kind: MessageKind,
    pub compressed: bool,
    /// Total message length, header included.
    pub length: u32,
}

impl MessageHeader {
    pub const SIZE: usize = HEADER_SIZE;

    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let at = |offset: usize, cause| ProtocolError::Malformed { offset, cause };
        if bytes.len() < HEADER_SIZE {
            return Err(at(
                0,
                MalformedCause::Truncated {
                    needed: HEADER_SIZE,
                    remaining: bytes.len(),
                },
            ));
        }

        let endian = Endian::try_from(bytes[HEADER_ENDIAN]).map_err(|c| at(HEADER_ENDIAN, c))?;
        let kind = MessageKind::try_from(bytes[HEADER_KIND]).map_err(|c| at(HEADER_KIND, c))?;
        let compressed = match bytes[HEADER_COMPRESSED] {
            0 => false,
            1 => true,
            _ => {
                return Err(at(
                    HEADER_COMPRESSED,
                    MalformedCause::Header("compression flag must be 0 or 1"),
                ));
            }
        };
        let length = match endian {
            Endian::Big => BigEndian::read_u32(&bytes[HEADER_LENGTH..HEADER_SIZE]),
            Endian::Little => LittleEndian::read_u32(&bytes[HEADER_LENGTH..HEADER_SIZE]),
        };
        if (length as usize) < HEADER_SIZE {
            return Err(at(
                HEADER_LENGTH,
                MalformedCause::Header("length shorter than the header"),
            ));
        }

        Ok(Self {
            endian,
            kind,
            compressed,
            length,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[HEADER_ENDIAN] = self.endian as u8;
        bytes[HEADER_KIND] = self.kind as u8;
        bytes[HEADER_COMPRESSED] = self.compressed as u8;
        self.endian
            .write_u32(&mut bytes[HEADER_LENGTH..HEADER_SIZE], self.length);
        bytes
    }
}

/// Frames `value` as a complete uncompressed message.
pub fn encode_message(
    value: &Value,
    kind: MessageKind,
    encoder: &Encoder,
) -> Result<Vec<u8>, ProtocolError> {
    let total = HEADER_SIZE + size_of(value)?;
    let length = u32::try_from(total).map_err(|_| ProtocolError::MessageTooLarge(total))?;
    let header = MessageHeader {
        endian: encoder.endian(),
        kind,
        compressed: false,
        length,
    };

    let mut message = Vec::with_capacity(total);
    message.extend_from_slice(&header.to_bytes());
    encoder.encode(value, &mut message)?;
    debug_assert_eq!(message.len(), total);
    trace!("encoded {kind:?} message of {total} bytes");
    Ok(message)
}

/// Parses a complete message, decompressing it when flagged.
///
/// A payload starting with the error sentinel yields [`ProtocolError::RemoteQuery`].
pub fn decode_message(message: &[u8]) -> Result<Value, ProtocolError> {
    let header = MessageHeader::parse(message)?;
    if header.length as usize != message.len() {
        return Err(ProtocolError::Malformed {
            offset: HEADER_LENGTH,
            cause: MalformedCause::Length {
                declared: header.length as usize,
                actual: message.len(),
            },
        });
    }

    let message = if header.compressed {
        Cow::Owned(decompress(message)?)
    } else {
        Cow::Borrowed(message)
    };

    if message.get(HEADER_SIZE) == Some(&ERROR_SENTINEL) {
        return Err(remote_error(&message[HEADER_SIZE + 1..]));
    }

    let mut cursor = Cursor::at(&message, HEADER_SIZE, header.endian);
    let value = decode(&mut cursor)?;
    if cursor.remaining() > 0 {
        return Err(cursor.malformed(MalformedCause::Trailing(cursor.remaining())));
    }
    Ok(value)
}

fn remote_error(payload: &[u8]) -> ProtocolError {
    let text = payload.split(|&b| b == 0).next().unwrap_or_default();
    let text = String::from_utf8_lossy(text);
    let text = if text.chars().count() > MAX_ERROR_LENGTH {
        let mut short: String = text.chars().take(MAX_ERROR_LENGTH).collect();
        short.push_str("...");
        short
    } else {
        text.into_owned()
    };
    ProtocolError::RemoteQuery(text)
}

#[cfg(test)]
mod tests {
    use crate::value::{Atom, Vector};

    use super::*;

    fn error_response(text: &[u8]) -> Vec<u8> {
        let length = (HEADER_SIZE + 2 + text.len()) as u8;
        let mut message = vec![1, 2, 0, 0, length, 0, 0, 0, ERROR_SENTINEL];
        message.extend_from_slice(text);
        message.push(0);
        message
    }

    #[test]
    fn header_layout() {
        let header = MessageHeader {
            endian: Endian::Little,
            kind: MessageKind::Sync,
            compressed: false,
            length: 17,
        };
        assert_eq!(header.to_bytes(), [1, 1, 0, 0, 17, 0, 0, 0]);
        assert_eq!(MessageHeader::parse(&header.to_bytes()).unwrap(), header);

        let big = MessageHeader {
            endian: Endian::Big,
            ..header
        };
        assert_eq!(big.to_bytes(), [0, 1, 0, 0, 0, 0, 0, 17]);
    }

    #[test]
    fn bad_headers() {
        assert!(MessageHeader::parse(&[1, 2, 0]).is_err());
        assert!(MessageHeader::parse(&[2, 2, 0, 0, 9, 0, 0, 0]).is_err());
        assert!(MessageHeader::parse(&[1, 3, 0, 0, 9, 0, 0, 0]).is_err());
        assert!(MessageHeader::parse(&[1, 2, 7, 0, 9, 0, 0, 0]).is_err());
        assert!(MessageHeader::parse(&[1, 2, 0, 0, 4, 0, 0, 0]).is_err());
    }

    #[test]
    fn framed_int_vector() {
        let value = Value::from(vec![1i32, 2, 3]);
        let message = encode_message(&value, MessageKind::Sync, &Encoder::new(3)).unwrap();
        assert_eq!(&message[..8], &[0, 1, 0, 0, 0, 0, 0, 26]);
        assert_eq!(decode_message(&message).unwrap(), value);
    }

    #[test]
    fn little_endian_frame() {
        let encoder = Encoder::new(3).with_endian(Endian::Little);
        let value = Value::symbols(["a", "b"]);
        let message = encode_message(&value, MessageKind::Async, &encoder).unwrap();
        assert_eq!(&message[..8], &[1, 0, 0, 0, 18, 0, 0, 0]);
        assert_eq!(decode_message(&message).unwrap(), value);
    }

    #[test]
    fn remote_error_surfaces() {
        let err = decode_message(&error_response(b"type")).unwrap_err();
        assert!(matches!(err, ProtocolError::RemoteQuery(ref text) if text == "type"));
    }

    #[test]
    fn remote_error_with_spaces() {
        let err = decode_message(&error_response(b"bad syntax")).unwrap_err();
        assert_eq!(err.to_string(), "remote error: bad syntax");
    }

    #[test]
    fn long_remote_errors_are_summarized() {
        let text = "x".repeat(MAX_ERROR_LENGTH + 10);
        let length = (HEADER_SIZE + 2 + text.len()) as u32;
        let mut message = vec![1, 2, 0, 0];
        message.extend_from_slice(&length.to_le_bytes());
        message.push(ERROR_SENTINEL);
        message.extend_from_slice(text.as_bytes());
        message.push(0);

        match decode_message(&message).unwrap_err() {
            ProtocolError::RemoteQuery(short) => {
                assert_eq!(short.len(), MAX_ERROR_LENGTH + 3);
                assert!(short.ends_with("..."));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn length_mismatch() {
        let mut message =
            encode_message(&Value::from(1i64), MessageKind::Response, &Encoder::new(3)).unwrap();
        message.push(0);
        let err = decode_message(&message).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                cause: MalformedCause::Length {
                    declared: 17,
                    actual: 18
                },
                ..
            }
        ));
    }

    #[test]
    fn unread_bytes_rejected() {
        let message = [1, 2, 0, 0, 16, 0, 0, 0, 250, 7, 0, 0, 0, 0xaa, 0xbb, 0xcc];
        let err = decode_message(&message).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                offset: 13,
                cause: MalformedCause::Trailing(3)
            }
        ));
    }

    #[test]
    fn opaque_function_fills_message() {
        let message = [1, 2, 0, 0, 12, 0, 0, 0, 104, 1, 2, 3];
        assert_eq!(decode_message(&message).unwrap(), Value::Function(104));
    }

    #[test]
    fn boolean_response() {
        let message = [1, 2, 0, 0, 10, 0, 0, 0, 255, 1];
        assert_eq!(
            decode_message(&message).unwrap(),
            Value::Atom(Atom::Boolean(true))
        );
    }

    #[test]
    fn char_vector_response() {
        let message = [1, 2, 0, 0, 16, 0, 0, 0, 10, 0, 2, 0, 0, 0, b'o', b'k'];
        assert_eq!(
            decode_message(&message).unwrap(),
            Value::Vector(Vector::Char(b"ok".to_vec()))
        );
    }
}
