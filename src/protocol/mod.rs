//! kdb+ IPC wire protocol.
//!
//! This module implements the client side of the binary protocol spoken by kdb+
//! processes: the type registry, the recursive encoder and decoder, exact size
//! estimation, the block compression codec, message framing and a thin transport
//! over any bidirectional byte stream.
//!
//! # Overview
//!
//! An outgoing request flows through:
//!
//! 1. [`size_of`]: exact encoded length, needed up front for the header.
//! 2. [`Encoder`]: writes the type tag and payload of a [`Value`](crate::Value).
//! 3. [`compress`]: optional, for large messages to non-local peers.
//!
//! and a response flows back through the header parser, [`decompress`] when flagged,
//! the error sentinel check and [`decode`].
//!
//! # Key Components
//!
//! - [`TypeCode`] / [`Kind`]: classification of wire type bytes and element widths.
//! - [`Cursor`]: explicit read position and byte order for one message.
//! - [`MessageHeader`]: the 8-byte frame header.
//! - [`Session`]: negotiated version, locality and UTC offset of a connection.
//! - [`ProtocolTransport`]: handshake plus sync/async requests over a `Read + Write`.
//!
//! # Binary Format
//!
//! - 8-byte header: byte order, message kind, compression flag, reserved, total length.
//! - One encoded value as payload: a signed type byte, then the type-specific body.
//! - Multi-byte numbers use the byte order declared in the header.
//!
//! # See Also
//!
//! - [`value`](crate::value): the value model this module serializes.
mod compress;
pub mod decode;
mod encode;
mod message;
mod session;
mod size;
mod transport;
mod types;

pub use compress::{compress, decompress};
pub use decode::{Cursor, decode};
pub use encode::Encoder;
pub use error::{MalformedCause, ProtocolError};
pub use message::{Endian, MessageHeader, MessageKind, decode_message, encode_message};
pub use session::Session;
pub use size::size_of;
pub use transport::{ProtocolTransport, TransportError, connect};
pub use types::{Kind, TypeCode, width_of};

pub mod header {
    pub(crate) const HEADER_SIZE: usize = 8;

    pub(crate) const HEADER_ENDIAN: usize = 0;
    pub(crate) const HEADER_KIND: usize = 1;
    pub(crate) const HEADER_COMPRESSED: usize = 2;
    pub(crate) const HEADER_LENGTH: usize = 4;

    /// Offset of the uncompressed length inside a compressed message.
    pub(crate) const COMPRESSED_LENGTH: usize = HEADER_SIZE;
    /// Offset of the first control byte inside a compressed message.
    pub(crate) const COMPRESSED_BODY: usize = COMPRESSED_LENGTH + 4;

    /// Type byte, attribute byte and 4-byte count preceding vector elements.
    pub(crate) const VECTOR_HEADER_SIZE: usize = 6;

    /// First payload byte of a response carrying a remote error.
    pub const ERROR_SENTINEL: u8 = 0x80;
    /// Messages at or below this size are never compressed.
    pub const COMPRESSION_THRESHOLD: usize = 2000;
    /// Capability byte sent during the handshake.
    pub const CAPABILITY: u8 = 3;
    /// Remote version needed for guids, symbol vectors, timestamps and timespans.
    pub const FEATURE_VERSION: u8 = 3;
    /// Longest remote error text kept before it is summarized.
    pub const MAX_ERROR_LENGTH: usize = 1024;
    /// Deepest nesting of lists, dictionaries, tables and lambdas the decoder accepts.
    pub const MAX_DEPTH: usize = 256;
}

pub mod error {
    use std::io;

    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum MalformedCause {
        #[error("unknown type code {0}")]
        UnknownType(i8),

        #[error("needed {needed} bytes, {remaining} remaining")]
        Truncated { needed: usize, remaining: usize },

        #[error("negative element count {0}")]
        NegativeCount(i32),

        #[error("bad header, {0}")]
        Header(&'static str),

        #[error("header declares {declared} bytes, message has {actual}")]
        Length { declared: usize, actual: usize },

        #[error("symbol is not valid UTF-8")]
        InvalidSymbol,

        #[error("invalid container, {0}")]
        Container(String),

        #[error("values nested deeper than {0} levels")]
        Depth(usize),

        #[error("{0} unread bytes after the value")]
        Trailing(usize),
    }

    #[derive(Debug, Error)]
    pub enum ProtocolError {
        #[error("unsupported type: {0}")]
        UnsupportedType(String),

        #[error("{feature} requires remote version {required}, negotiated {remote}")]
        Version {
            feature: &'static str,
            required: u8,
            remote: u8,
        },

        #[error("[malformed message][offset {offset}]: {cause}")]
        Malformed { offset: usize, cause: MalformedCause },

        #[error("remote error: {0}")]
        RemoteQuery(String),

        #[error("[compression]: declared {declared} bytes, reconstructed {actual}")]
        CompressionIntegrity { declared: usize, actual: usize },

        #[error("message of {0} bytes does not fit the length field")]
        MessageTooLarge(usize),

        #[error("codec IO error: {0}")]
        Io(#[from] io::Error),
    }
}
