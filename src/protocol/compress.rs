//! Block compression used by kdb+ for large IPC messages.
//!
//! The scheme is a byte-oriented LZ variant. Output is a sequence of groups, each led
//! by a control byte whose bits (least significant first) flag the following eight
//! tokens as either a literal byte or a back-reference. A back-reference is two bytes:
//! a slot in a 256-entry table keyed by the XOR of two adjacent bytes, and the number of
//! bytes beyond the first two to copy from the position held in that slot. Both sides
//! rebuild the same table as they go, so it never travels on the wire.
//!
//! A compressed message keeps the first four header bytes (with the compression flag
//! set), stores its own length at offset 4, the uncompressed length at offset 8 and
//! the control/token stream from offset 12.
use std::borrow::Cow;

use log::trace;

use super::{
    Cursor, Endian, MessageHeader, ProtocolError,
    header::{COMPRESSED_BODY, COMPRESSED_LENGTH, HEADER_COMPRESSED, HEADER_LENGTH, HEADER_SIZE},
};

/// Room kept for one more group: a control byte and eight two-byte tokens.
const GROUP_RESERVE: usize = 17;

/// Largest number of bytes a single token can reproduce.
const MAX_TOKEN_EXPANSION: usize = 257;

/// Compresses a complete message.
///
/// The input is returned unchanged when it is too short, carries an unreadable byte
/// order, or does not shrink to half its size.
pub fn compress(message: &[u8]) -> Cow<'_, [u8]> {
    let total = message.len();
    let limit = total / 2;
    if limit < COMPRESSED_BODY + GROUP_RESERVE {
        return Cow::Borrowed(message);
    }
    let (Ok(endian), Ok(original)) = (Endian::try_from(message[0]), u32::try_from(total)) else {
        return Cow::Borrowed(message);
    };

    let mut out = vec![0u8; limit];
    out[..4].copy_from_slice(&message[..4]);
    out[HEADER_COMPRESSED] = 1;
    endian.write_u32(&mut out[COMPRESSED_LENGTH..COMPRESSED_BODY], original);

    let mut table = [0usize; 256];
    let mut control = COMPRESSED_BODY;
    let mut d = COMPRESSED_BODY;
    let mut s = HEADER_SIZE;
    let mut bit: u8 = 0;
    let mut flags: u8 = 0;
    let (mut h, mut h0, mut s0) = (0usize, 0usize, 0usize);

    while s < total {
        if bit == 0 {
            if d + GROUP_RESERVE > limit {
                trace!("message of {total} bytes does not compress");
                return Cow::Borrowed(message);
            }
            bit = 1;
            out[control] = flags;
            control = d;
            d += 1;
            flags = 0;
        }

        let mut p = 0;
        let mut literal = s > total - 3;
        if !literal {
            h = (message[s] ^ message[s + 1]) as usize;
            p = table[h];
            literal = p == 0 || message[s] != message[p];
        }

        if s0 > 0 {
            table[h0] = s0;
            s0 = 0;
        }

        if literal {
            h0 = h;
            s0 = s;
            out[d] = message[s];
            d += 1;
            s += 1;
        } else {
            table[h] = s;
            flags |= bit;
            p += 2;
            s += 2;
            let run_start = s;
            let run_end = (s + 255).min(total);
            while message[p] == message[s] {
                s += 1;
                if s >= run_end {
                    break;
                }
                p += 1;
            }
            out[d] = h as u8;
            out[d + 1] = (s - run_start) as u8;
            d += 2;
        }

        bit = bit.wrapping_mul(2);
    }

    out[control] = flags;
    // d < limit <= u32::MAX
    endian.write_u32(&mut out[HEADER_LENGTH..HEADER_SIZE], d as u32);
    out.truncate(d);
    trace!("compressed {total} bytes to {d}");
    Cow::Owned(out)
}

/// Reverses [`compress`], restoring the original header with the flag cleared.
pub fn decompress(message: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let header = MessageHeader::parse(message)?;
    let declared = Cursor::at(message, COMPRESSED_LENGTH, header.endian).read_i32()?;

    let available = message.len().saturating_sub(COMPRESSED_BODY);
    let bound = HEADER_SIZE + available.saturating_mul(MAX_TOKEN_EXPANSION);
    let size = match usize::try_from(declared) {
        Ok(size) if (HEADER_SIZE..=bound).contains(&size) => size,
        _ => {
            return Err(ProtocolError::CompressionIntegrity {
                declared: declared.max(0) as usize,
                actual: message.len(),
            });
        }
    };

    let mut dst = vec![0u8; size];
    dst[..HEADER_SIZE].copy_from_slice(&message[..HEADER_SIZE]);
    dst[HEADER_COMPRESSED] = 0;
    header
        .endian
        .write_u32(&mut dst[HEADER_LENGTH..HEADER_SIZE], size as u32);

    let integrity = |actual| ProtocolError::CompressionIntegrity {
        declared: size,
        actual,
    };
    let mut d = COMPRESSED_BODY;
    let mut next = |at: usize| -> Result<u8, ProtocolError> {
        let byte = message.get(d).copied().ok_or_else(|| integrity(at))?;
        d += 1;
        Ok(byte)
    };

    let mut table = [0usize; 256];
    let mut s = HEADER_SIZE;
    let mut p = HEADER_SIZE;
    let mut bit: u8 = 0;
    let mut flags: u8 = 0;

    while s < size {
        if bit == 0 {
            flags = next(s)?;
            bit = 1;
        }

        let reference = flags & bit != 0;
        let mut extra = 0;
        if reference {
            let r = table[next(s)? as usize];
            extra = next(s)? as usize;
            if r < HEADER_SIZE || r >= s || s + 2 + extra > size {
                return Err(integrity(s));
            }
            for m in 0..extra + 2 {
                dst[s + m] = dst[r + m];
            }
            s += 2;
        } else {
            dst[s] = next(s)?;
            s += 1;
        }

        while p + 1 < s {
            table[(dst[p] ^ dst[p + 1]) as usize] = p;
            p += 1;
        }

        if reference {
            s += extra;
            p = s;
        }
        bit = bit.wrapping_mul(2);
    }

    if d != message.len() {
        // compressed stream longer than the tokens it carries
        return Err(ProtocolError::CompressionIntegrity {
            declared: message.len(),
            actual: d,
        });
    }

    trace!("decompressed {} bytes to {size}", message.len());
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::protocol::{Encoder, MessageKind, decode_message, encode_message};
    use crate::value::Value;

    use super::*;

    fn framed(endian: Endian, body: &[u8]) -> Vec<u8> {
        let mut message = vec![endian as u8, 1, 0, 0, 0, 0, 0, 0];
        message.extend_from_slice(body);
        let length = message.len() as u32;
        endian.write_u32(&mut message[HEADER_LENGTH..HEADER_SIZE], length);
        message
    }

    #[test]
    fn short_messages_are_untouched() {
        let message = framed(Endian::Little, &[0; 40]);
        assert!(matches!(compress(&message), Cow::Borrowed(_)));
    }

    #[test]
    fn repetitive_message_shrinks() {
        let body: Vec<u8> = (0..4000u32).map(|i| (i % 7) as u8).collect();
        let message = framed(Endian::Little, &body);

        let compressed = compress(&message);
        let Cow::Owned(compressed) = compressed else {
            panic!("repetitive input should compress");
        };
        assert!(compressed.len() < message.len() / 2);
        assert_eq!(compressed[HEADER_COMPRESSED], 1);
        assert_eq!(
            u32::from_le_bytes(compressed[4..8].try_into().unwrap()) as usize,
            compressed.len()
        );
        assert_eq!(
            u32::from_le_bytes(compressed[8..12].try_into().unwrap()) as usize,
            message.len()
        );
        assert_eq!(decompress(&compressed).unwrap(), message);
    }

    #[test]
    fn big_endian_lengths() {
        let message = framed(Endian::Big, &[b'a'; 3000]);
        let compressed = compress(&message).into_owned();
        assert_eq!(
            u32::from_be_bytes(compressed[8..12].try_into().unwrap()) as usize,
            message.len()
        );
        assert_eq!(decompress(&compressed).unwrap(), message);
    }

    #[test]
    fn noise_is_not_compressed() {
        let mut state = 0x2545_f491_u32;
        let body: Vec<u8> = (0..3000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let message = framed(Endian::Little, &body);
        assert!(matches!(compress(&message), Cow::Borrowed(_)));
    }

    #[test]
    fn truncated_stream_fails_integrity() {
        let message = framed(Endian::Little, &[1, 2, 3, 4].repeat(1000));
        let mut compressed = compress(&message).into_owned();
        compressed.truncate(compressed.len() - 3);
        let length = compressed.len() as u32;
        Endian::Little.write_u32(&mut compressed[HEADER_LENGTH..HEADER_SIZE], length);
        assert!(matches!(
            decompress(&compressed),
            Err(ProtocolError::CompressionIntegrity { .. })
        ));
    }

    #[test]
    fn unread_compressed_bytes_fail_integrity() {
        let message = framed(Endian::Little, &[5, 6, 7].repeat(1000));
        let mut compressed = compress(&message).into_owned();
        let used = compressed.len();
        compressed.extend_from_slice(&[0xaa, 0xbb]);
        let length = compressed.len() as u32;
        Endian::Little.write_u32(&mut compressed[HEADER_LENGTH..HEADER_SIZE], length);

        match decompress(&compressed) {
            Err(ProtocolError::CompressionIntegrity { declared, actual }) => {
                assert_eq!(declared, used + 2);
                assert_eq!(actual, used);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn absurd_declared_length_rejected() {
        let mut message = vec![1, 2, 1, 0, 20, 0, 0, 0];
        message.extend_from_slice(&i32::MAX.to_le_bytes());
        message.extend_from_slice(&[0; 8]);
        assert!(matches!(
            decompress(&message),
            Err(ProtocolError::CompressionIntegrity { .. })
        ));
    }

    #[test]
    fn compressed_value_decodes() {
        let value = Value::symbols(std::iter::repeat_n("AAPL", 1000));
        let message = encode_message(&value, MessageKind::Response, &Encoder::new(3)).unwrap();
        let compressed = compress(&message);
        assert!(matches!(compressed, Cow::Owned(_)));
        assert_eq!(decode_message(&compressed).unwrap(), value);
    }

    proptest! {
        #[test]
        fn round_trip_low_entropy(body in prop::collection::vec(0u8..4, 0..5000), little in any::<bool>()) {
            let endian = if little { Endian::Little } else { Endian::Big };
            let message = framed(endian, &body);
            match compress(&message) {
                Cow::Owned(compressed) => {
                    prop_assert_eq!(compressed[HEADER_COMPRESSED], 1);
                    prop_assert_eq!(decompress(&compressed).unwrap(), message);
                }
                Cow::Borrowed(same) => prop_assert_eq!(same, &message[..]),
            }
        }

        #[test]
        fn round_trip_any_bytes(body in prop::collection::vec(any::<u8>(), 0..3000)) {
            let message = framed(Endian::Little, &body);
            if let Cow::Owned(compressed) = compress(&message) {
                prop_assert_eq!(decompress(&compressed).unwrap(), message);
            }
        }

        #[test]
        fn garbage_never_panics(body in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut message = vec![1, 2, 1, 0];
            message.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
            message.extend_from_slice(&body);
            let _ = decompress(&message);
        }
    }
}
