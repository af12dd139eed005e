//! Machine configuration and validation
//!
//! # Example
//!
//! ```
//! use flipflop::{MachineConfig, OverflowPolicy};
//!
//! let config = MachineConfig::default()
//!     .with_channel_capacity(256)
//!     .with_overflow(OverflowPolicy::DropNewest);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::FlipFlopError;
use serde::{Deserialize, Serialize};

/// Events buffered between mutators and the dispatch loop
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// What a mutator does when the event channel is full
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for a free slot. No timeout: a stalled consumer stalls producers.
    #[default]
    Block,
    /// Discard the event and count it in the metrics
    DropNewest,
}

/// What happens to running handler tasks when the dispatch loop exits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Leave handlers running on their own; they are neither awaited nor aborted
    #[default]
    Detach,
    /// Await every outstanding handler before the loop task completes
    Drain,
}

/// Dispatch machine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Event channel capacity (must be >= 1)
    pub channel_capacity: usize,
    /// Behaviour when the channel is full
    pub overflow: OverflowPolicy,
    /// Behaviour for outstanding handlers on loop exit
    pub shutdown: ShutdownPolicy,
    /// Start with every condition CLOSED instead of OPEN
    pub all_closed: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            overflow: OverflowPolicy::Block,
            shutdown: ShutdownPolicy::Detach,
            all_closed: false,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), FlipFlopError> {
        if self.channel_capacity == 0 {
            return Err(FlipFlopError::ZeroChannelCapacity);
        }
        Ok(())
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_all_closed(mut self, all_closed: bool) -> Self {
        self.all_closed = all_closed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MachineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.overflow, OverflowPolicy::Block);
        assert_eq!(config.shutdown, ShutdownPolicy::Detach);
        assert!(!config.all_closed);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = MachineConfig::default().with_channel_capacity(0);
        assert_eq!(config.validate(), Err(FlipFlopError::ZeroChannelCapacity));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: MachineConfig =
            serde_json::from_str(r#"{"overflow":"drop_newest","all_closed":true}"#)
                .expect("config should parse");

        assert_eq!(config.overflow, OverflowPolicy::DropNewest);
        assert!(config.all_closed);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.shutdown, ShutdownPolicy::Detach);
    }
}
