//! # xdma - Zero-copy DMA transactions
//!
//! Client library over the XDMA transfer engine. Buffers are carved out
//! of one shared arena; a transaction moves a source buffer to the
//! device (tx) and/or a device stream into a destination buffer (rx)
//! on one channel pair.
//!
//! ## Quick Start
//!
//! ```ignore
//! use xdma::{DeviceId, WaitMode, Xdma};
//! use xdma::module::{DeviceConfig, SimConfig};
//!
//! let xdma = Xdma::open_simulated(SimConfig::pairs(1), DeviceConfig::from_env())?;
//!
//! let dst = xdma.alloc(1025, 4)?;
//! let src = xdma.alloc(1025, 4)?;
//! xdma.arena()?.fill(src.offset() as usize, src.requested_len(), b'B')?;
//!
//! let outcome = xdma.perform_transaction(DeviceId(0), WaitMode::Dst, Some(&src), Some(&dst))?;
//! assert!(!outcome.needs_recovery());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Xdma (this crate)                         │
//! │      alloc, perform_transaction, stop_transaction           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Command / Response
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   XdmaDevice (xdma-module)                  │
//! │   registry · transfer engine · completion tokens · arena    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  DmaBackend
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │          AXI DMA channel pairs (simulated or real)      │
//!    └─────────────────────────────────────────────────────────┘
//! ```

mod session;

pub use session::{TransactionOutcome, WaitMode, Xdma};

pub use xdma_core::{
    calc_size, constants, BufferRequest, ChannelConfig, ChannelId, ChannelPair, Command,
    CompletionId, Controller, Cookie, DeviceId, Direction, DmaStatus, ErrorKind, Response,
    Result, SelfTestReport, TransferRequest, TransferResult, XdmaError,
};
pub use xdma_core::{kdebug, kerror, kinfo, kprintln, ktrace, kwarn};
pub use xdma_core::kprint;
pub use xdma_core::{env_get, env_get_bool};

/// Engine implementations (device, arena, simulated hardware).
pub mod module {
    pub use xdma_module::*;
}

pub use xdma_module::{Arena, ArenaBuf, ArenaHost, XdmaDevice};
