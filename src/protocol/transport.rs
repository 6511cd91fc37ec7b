use std::{
    borrow::Cow,
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{config::ClientConfig, value::Value};

use super::{
    MessageHeader, MessageKind, ProtocolError, Session, compress, decode_message, encode_message,
    header::{CAPABILITY, HEADER_SIZE},
};

/// Initial buffer reserved for an incoming message.
const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("access denied for user '{0}'")]
    AccessDenied(String),
}

/// A client connection to a kdb+ process over any byte stream.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    session: Session,
    config: ClientConfig,
}

impl<T: Read + Write> ProtocolTransport<T> {
    /// Wraps a stream whose handshake already happened.
    pub fn new(stream: T, session: Session, config: ClientConfig) -> Self {
        Self {
            stream,
            session,
            config,
        }
    }

    /// Logs in and records the version byte the remote process answers with.
    ///
    /// A peer that closes the stream instead of answering rejected the credentials.
    pub fn handshake(
        stream: T,
        config: ClientConfig,
        local: bool,
    ) -> Result<Self, TransportError> {
        Self::login(stream, config, local, Some(CAPABILITY))
    }

    /// Login without the capability byte, for servers that predate it.
    pub fn handshake_legacy(
        stream: T,
        config: ClientConfig,
        local: bool,
    ) -> Result<Self, TransportError> {
        Self::login(stream, config, local, None)
    }

    fn login(
        mut stream: T,
        config: ClientConfig,
        local: bool,
        capability: Option<u8>,
    ) -> Result<Self, TransportError> {
        let mut login = config.credentials().into_bytes();
        login.extend(capability);
        login.push(0);
        stream.write_all(&login)?;
        stream.flush()?;

        let mut version = [0u8; 1];
        if stream.read(&mut version)? == 0 {
            warn!(
                "handshake rejected for user '{}', capability {capability:?}",
                config.user
            );
            return Err(TransportError::AccessDenied(config.user));
        }

        info!("connected with remote version {}, local: {local}", version[0]);
        let session = Session::new(version[0], local, config.utc_offset);
        Ok(Self::new(stream, session, config))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `value` synchronously and waits for the reply.
    pub fn query(&mut self, value: &Value) -> Result<Value, TransportError> {
        self.write_message(MessageKind::Sync, value)?;
        self.read_response()
    }

    /// Evaluates `text` applied to `args` on the remote process.
    pub fn query_with<I>(&mut self, text: &str, args: I) -> Result<Value, TransportError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut items = vec![Value::string(text)];
        items.extend(args);
        self.query(&Value::List(items))
    }

    /// Sends `value` without waiting for a reply.
    pub fn send_async(&mut self, value: &Value) -> Result<(), TransportError> {
        self.write_message(MessageKind::Async, value)
    }

    /// Reads one framed message and decodes it.
    pub fn read_response(&mut self) -> Result<Value, TransportError> {
        let mut header = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut header)?;
        let parsed = MessageHeader::parse(&header)?;
        if parsed.kind != MessageKind::Response {
            warn!("expected a response, received {:?}", parsed.kind);
        }

        // grows with the bytes actually received, not the declared length
        let length = parsed.length as usize;
        let mut message = Vec::with_capacity(length.min(READ_CHUNK));
        message.extend_from_slice(&header);
        let body = (length - HEADER_SIZE) as u64;
        let read = Read::take(&mut self.stream, body).read_to_end(&mut message)?;
        if (read as u64) < body {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "message declares {length} bytes, stream ended after {}",
                    message.len()
                ),
            )
            .into());
        }
        debug!(
            "received {} bytes, compressed: {}",
            parsed.length, parsed.compressed
        );

        Ok(decode_message(&message)?)
    }

    pub fn into_inner(self) -> T {
        self.stream
    }

    fn write_message(&mut self, kind: MessageKind, value: &Value) -> Result<(), TransportError> {
        let encoder = self.session.encoder(self.config.endian);
        let message = encode_message(value, kind, &encoder)?;
        let message = if self.session.should_compress(self.config.compress, message.len()) {
            compress(&message)
        } else {
            Cow::Borrowed(message.as_slice())
        };

        debug!("sending {kind:?} message of {} bytes", message.len());
        self.stream.write_all(&message)?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Opens a TCP connection and performs the handshake.
///
/// A server that drops the connection on the capability byte is dialed again and
/// sent a legacy login; only if that also fails is access denied.
pub fn connect<A: ToSocketAddrs>(
    address: A,
    config: ClientConfig,
) -> Result<ProtocolTransport<TcpStream>, TransportError> {
    let stream = TcpStream::connect(address)?;
    let peer = stream.peer_addr()?;
    let local = is_local(&stream)?;

    match ProtocolTransport::handshake(stream, config.clone(), local) {
        Err(TransportError::AccessDenied(_)) => {
            info!("retrying login to {peer} without capability byte");
            ProtocolTransport::handshake_legacy(TcpStream::connect(peer)?, config, local)
        }
        result => result,
    }
}

fn is_local(stream: &TcpStream) -> io::Result<bool> {
    let (ours, theirs) = (stream.local_addr()?.ip(), stream.peer_addr()?.ip());
    Ok(ours == theirs || theirs.is_loopback())
}
