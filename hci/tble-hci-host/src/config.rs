//! Configuration of the host

use core::time::Duration;
use tble_hci_util::opcodes::{ControllerAndBaseband, HciCommand};

/// Configuration of a [`Host`](crate::Host)
///
/// ```
/// # use std::time::Duration;
/// # use tble_hci_host::Config;
/// let config = Config::default()
///     .with_command_timeout(Duration::from_millis(500))
///     .with_max_queued_commands(4);
///
/// assert_eq!(27, config.max_acl_data_length);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// The default timeout of a command
    pub command_timeout: Duration,
    /// The default timeout of *Reset* and the radio test commands
    pub long_command_timeout: Duration,
    /// The number of commands that can wait behind the command sent to the controller
    pub max_queued_commands: usize,
    /// The maximum payload size of a HCI ACL data packet sent to the controller
    ///
    /// This is replaced by the controller's value when the host is initialized. A value of zero is
    /// treated as one.
    pub max_acl_data_length: usize,
    /// The number of events buffered for each event subscriber
    ///
    /// A subscriber that falls behind by more than this number of events misses the oldest ones.
    /// A value of zero is treated as one.
    pub event_capacity: usize,
}

impl Config {
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_long_command_timeout(mut self, timeout: Duration) -> Self {
        self.long_command_timeout = timeout;
        self
    }

    pub fn with_max_queued_commands(mut self, max: usize) -> Self {
        self.max_queued_commands = max;
        self
    }

    pub fn with_max_acl_data_length(mut self, len: usize) -> Self {
        self.max_acl_data_length = len;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Get the default timeout for a command
    pub fn timeout_for(&self, command: HciCommand) -> Duration {
        if command.is_radio_test() || command == HciCommand::ControllerAndBaseband(ControllerAndBaseband::Reset) {
            self.long_command_timeout
        } else {
            self.command_timeout
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            command_timeout: Duration::from_secs(2),
            long_command_timeout: Duration::from_secs(10),
            max_queued_commands: 16,
            max_acl_data_length: 27,
            event_capacity: 64,
        }
    }
}
