//! Client configuration.
use chrono::{FixedOffset, Local};

use crate::protocol::Endian;

/// Settings for one connection.
///
/// The UTC offset used for local time conversions is resolved from the host clock once,
/// when the configuration is built, and stays fixed for every session created from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub user: String,
    pub password: Option<String>,
    /// Compress large messages sent to remote hosts.
    pub compress: bool,
    /// Byte order of outgoing messages.
    pub endian: Endian,
    pub utc_offset: FixedOffset,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user: String::default(),
            password: None,
            compress: false,
            endian: Endian::Big,
            utc_offset: *Local::now().offset(),
        }
    }
}

impl ClientConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// `user` or `user:password`, as sent in the handshake.
    pub fn credentials(&self) -> String {
        match &self.password {
            Some(password) => format!("{}:{}", self.user, password),
            None => self.user.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials() {
        assert_eq!(ClientConfig::new("alice").credentials(), "alice");
        assert_eq!(
            ClientConfig::new("alice").with_password("s3cret").credentials(),
            "alice:s3cret"
        );
        assert_eq!(ClientConfig::default().credentials(), "");
    }

    #[test]
    fn builder() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let config = ClientConfig::new("u")
            .with_compression(true)
            .with_endian(Endian::Little)
            .with_utc_offset(offset);
        assert!(config.compress);
        assert_eq!(config.endian, Endian::Little);
        assert_eq!(config.utc_offset, offset);
    }
}
