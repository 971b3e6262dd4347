//! Tunables for an [`EventBus`](crate::bus::EventBus).
//!
//! The bus has no behavioral switches; these settings only affect allocation
//! and diagnostics. [`BusConfig`] deserializes from the `bus` section of a
//! host's configuration file.

use serde::Deserialize;

/// Event bus tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Initial capacity of the fire queue, re-applied after every drain.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Log a warning when a tick starts with more queued names than this.
    /// `0` disables the warning.
    #[serde(default = "default_backlog_warn_threshold")]
    pub backlog_warn_threshold: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            backlog_warn_threshold: default_backlog_warn_threshold(),
        }
    }
}

impl BusConfig {
    /// Whether a tick that starts with `queued` names should warn.
    pub const fn is_backlogged(&self, queued: usize) -> bool {
        self.backlog_warn_threshold > 0 && queued > self.backlog_warn_threshold
    }
}

const fn default_queue_capacity() -> usize {
    64
}

const fn default_backlog_warn_threshold() -> usize {
    1_024
}
