//! # xdma-core
//!
//! Core types and trait boundaries for the XDMA transfer engine.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The default implementations (shared region, arena, completion tokens,
//! channel registry, transfer engine, simulated hardware) live in
//! `xdma-module`.
//!
//! ## Modules
//!
//! - `channel` - Direction, device/channel/completion identifiers, ChannelPair
//! - `descriptor` - Cookies, prep flags, transfer descriptors and results
//! - `config` - Per-channel slave configuration
//! - `backend` - The `DmaBackend` hardware trait
//! - `control` - Command/response surface and the `Controller` trait
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod channel;
pub mod descriptor;
pub mod config;
pub mod backend;
pub mod control;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use channel::{ChannelId, ChannelInfo, ChannelMatch, ChannelPair, CompletionId, DeviceId, Direction, HwChannel};
pub use descriptor::{Cookie, DmaStatus, TransferDescriptor, TransferResult};
pub use config::ChannelConfig;
pub use backend::{CompletionCallback, DmaBackend, PreparedTx};
pub use control::{BufferRequest, Command, Controller, Response, SelfTestReport, TransferRequest};
pub use error::{ErrorKind, Result, XdmaError};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

/// Bus geometry and engine defaults
pub mod constants {
    use std::time::Duration;

    /// Width of the AXI stream data bus in bytes (32-bit bus)
    pub const BUS_WIDTH_BYTES: usize = 4;

    /// Maximum burst length in beats
    pub const BURST_LENGTH: usize = 16;

    /// Allocation granularity: every arena offset and size is a multiple of this
    pub const BLOCK_SIZE: usize = BUS_WIDTH_BYTES * BURST_LENGTH;

    /// Default arena capacity (32 MiB)
    pub const DEFAULT_ARENA_SIZE: usize = 32 * 1024 * 1024;

    /// Default cap on probed channel pairs
    pub const MAX_DEVICES: usize = 4;

    /// Default bound on `start(wait = true)`
    pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Default length of each self-test buffer (1 MiB)
    pub const DEFAULT_SELFTEST_LEN: usize = 1024 * 1024;

    /// Largest coalescing threshold / delay count the channel registers hold
    pub const MAX_IRQ_PARAM: u32 = 255;

    /// Page size assumed for the shared region
    pub const PAGE_SIZE: usize = 4096;
}

/// Round `length * element_size` up to the arena block granularity.
///
/// Returns `None` if the byte count overflows `usize`.
///
/// This is the shared-memory compatibility rule: a controller and the engine
/// that disagree on it disagree on buffer boundaries.
#[inline]
pub fn calc_size(length: usize, element_size: usize) -> Option<usize> {
    let bytes = length.checked_mul(element_size)?;
    let rem = bytes % constants::BLOCK_SIZE;
    if rem == 0 {
        Some(bytes)
    } else {
        bytes.checked_add(constants::BLOCK_SIZE - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::constants::BLOCK_SIZE;

    #[test]
    fn test_block_size() {
        assert_eq!(BLOCK_SIZE, 64);
    }

    #[test]
    fn test_calc_size_rounds_up() {
        // 1025 u32 words = 4100 bytes -> next multiple of 64
        assert_eq!(calc_size(1025, 4), Some(4160));
        assert_eq!(calc_size(1, 1), Some(64));
        assert_eq!(calc_size(16, 4), Some(64));
        assert_eq!(calc_size(17, 4), Some(128));
    }

    #[test]
    fn test_calc_size_zero() {
        assert_eq!(calc_size(0, 4), Some(0));
        assert_eq!(calc_size(100, 0), Some(0));
    }

    #[test]
    fn test_calc_size_overflow() {
        assert_eq!(calc_size(usize::MAX, 2), None);
        assert_eq!(calc_size(usize::MAX, 1), None);
    }
}
