// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime configuration knobs.
//!
//! Kept deliberately small: this toolkit has no QoS catalogue or discovery
//! subsystem to configure, just the reactor's polling behaviour and the
//! RPC layer's timeouts and buffer sizing.

use std::time::Duration;

/// Tuning knobs for a [`crate::reactor::Reactor`].
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Upper bound placed on any single `poll` call even when no timer or
    /// caller-supplied deadline is sooner. Keeps a reactor with no timers
    /// responsive to `wake()` calls that race the syscall.
    pub max_poll_interval: Duration,
    /// Initial capacity reserved in the poll-entry vector, avoiding a
    /// reallocation for the common case of a handful of registered devices.
    pub initial_poll_capacity: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            max_poll_interval: Duration::from_secs(1),
            initial_poll_capacity: 16,
        }
    }
}

/// Tuning knobs for the RPC client/server layer.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Default deadline used by `RemoteProcedure::call` when the caller does
    /// not supply an explicit timeout.
    pub default_timeout: Duration,
    /// Initial capacity of a connection's binary-codec string dictionary.
    pub dictionary_initial_capacity: usize,
    /// Largest binary frame body this implementation will decode before
    /// reporting `Error::Serialization`; guards against a corrupt or
    /// malicious length/marker sequence exhausting memory.
    pub max_frame_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            dictionary_initial_capacity: 64,
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}
