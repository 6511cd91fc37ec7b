use chrono::{FixedOffset, NaiveDateTime};

use crate::value::{Datetime, Timestamp, ValueError};

use super::{Encoder, Endian, header::COMPRESSION_THRESHOLD};

/// What a connection learned during the handshake, plus the UTC offset used for local
/// time conversions. Immutable for the life of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    version: u8,
    local: bool,
    utc_offset: FixedOffset,
}

impl Session {
    pub fn new(version: u8, local: bool, utc_offset: FixedOffset) -> Self {
        Self {
            version,
            local,
            utc_offset,
        }
    }

    /// Protocol version byte returned by the remote process.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Whether the peer runs on this host.
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn encoder(&self, endian: Endian) -> Encoder {
        Encoder::new(self.version).with_endian(endian)
    }

    /// Compression pays off only for large messages crossing the network.
    pub fn should_compress(&self, enabled: bool, length: usize) -> bool {
        enabled && !self.local && length > COMPRESSION_THRESHOLD
    }

    /// Timestamp for a wall-clock time on this host.
    pub fn timestamp(&self, local: NaiveDateTime) -> Result<Timestamp, ValueError> {
        Timestamp::from_local(local, self.utc_offset)
    }

    pub fn datetime(&self, local: NaiveDateTime) -> Result<Datetime, ValueError> {
        Datetime::from_local(local, self.utc_offset)
    }

    /// Wall-clock time on this host for a timestamp received from the peer.
    pub fn local_time(&self, timestamp: Timestamp) -> Option<NaiveDateTime> {
        timestamp.to_local(self.utc_offset)
    }
}
