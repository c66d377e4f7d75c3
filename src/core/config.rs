//! Session configuration.

use std::time::Duration;

use super::constants::{
    DEFAULT_INCOMING_HIGH_WATER_MARK, DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_OUTGOING_HIGH_WATER_MARK,
};
use super::error::ConfigError;

/// Datagram queue configuration for one session.
///
/// Both high-water marks can be changed after the session is opened; the
/// rest is fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pending outgoing datagrams allowed before `proceed()` waits.
    pub outgoing_high_water_mark: usize,

    /// Received datagrams held before further arrivals are dropped.
    pub incoming_high_water_mark: usize,

    /// Largest datagram payload accepted for sending.
    pub max_datagram_size: usize,

    /// Outgoing datagrams older than this are discarded instead of sent.
    pub outgoing_max_age: Option<Duration>,

    /// Incoming datagrams older than this are discarded instead of read.
    pub incoming_max_age: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outgoing_high_water_mark: DEFAULT_OUTGOING_HIGH_WATER_MARK,
            incoming_high_water_mark: DEFAULT_INCOMING_HIGH_WATER_MARK,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            outgoing_max_age: None,
            incoming_max_age: None,
        }
    }
}

impl SessionConfig {
    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_high_water_mark("outgoing", self.outgoing_high_water_mark)?;
        validate_high_water_mark("incoming", self.incoming_high_water_mark)?;
        if self.max_datagram_size == 0 {
            return Err(ConfigError::ZeroMaxDatagramSize);
        }
        Ok(())
    }
}

pub(crate) fn validate_high_water_mark(
    queue: &'static str,
    mark: usize,
) -> Result<(), ConfigError> {
    if mark == 0 {
        Err(ConfigError::ZeroHighWaterMark { queue })
    } else {
        Ok(())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder starting from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outgoing high-water mark.
    pub fn outgoing_high_water_mark(mut self, mark: usize) -> Self {
        self.config.outgoing_high_water_mark = mark;
        self
    }

    /// Set the incoming high-water mark.
    pub fn incoming_high_water_mark(mut self, mark: usize) -> Self {
        self.config.incoming_high_water_mark = mark;
        self
    }

    /// Set the maximum datagram size.
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.config.max_datagram_size = size;
        self
    }

    /// Discard outgoing datagrams that wait longer than `age`.
    pub fn outgoing_max_age(mut self, age: Duration) -> Self {
        self.config.outgoing_max_age = Some(age);
        self
    }

    /// Discard incoming datagrams that wait longer than `age`.
    pub fn incoming_max_age(mut self, age: Duration) -> Self {
        self.config.incoming_max_age = Some(age);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
