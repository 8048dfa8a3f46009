//! Hardware DMA engine abstraction.
//!
//! A `DmaBackend` is the dmaengine-style provider the transfer engine
//! drives: channel request/release, slave configuration, single-buffer
//! descriptor preparation, submit, issue-pending, status and terminate.
//!
//! # Implementors
//!
//! - `SimulatedDma` (xdma-module): in-process AXI-DMA model with a
//!   loopback stream between each tx/rx pair. Used by tests, the smoke
//!   runner and the demo app.
//!
//! - A platform driver binding would implement the same trait over the
//!   kernel dmaengine; the engine does not change.
//!
//! **Contract:**
//! - Nothing here may block except `terminate_all`, which may wait for the
//!   channel to quiesce.
//! - Descriptors on one channel execute in submit order.
//! - `prep_slave_single` only builds; `tx_submit` only queues;
//!   `issue_pending` is what makes the hardware move data.

use crate::channel::{ChannelMatch, Direction, HwChannel};
use crate::config::ChannelConfig;
use crate::descriptor::{Cookie, DmaStatus};
use crate::error::Result;

/// Completion callback attached to a descriptor.
///
/// Runs in the hardware's completion context (an interrupt in a real
/// driver, a worker thread in the simulation). Must not block.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A descriptor built by `prep_slave_single`, not yet submitted.
#[derive(Debug)]
pub struct PreparedTx {
    pub chan: HwChannel,
    /// Backend-private descriptor id.
    pub id: u64,
}

pub trait DmaBackend: Send + Sync {
    /// Claim the first free channel satisfying `matcher`.
    ///
    /// Returns `None` when no unclaimed channel matches.
    fn request_channel(&self, matcher: &ChannelMatch) -> Option<HwChannel>;

    /// Return a claimed channel. Terminates anything still queued on it.
    fn release_channel(&self, chan: HwChannel);

    /// Apply a slave configuration. Affects descriptors prepared afterwards.
    fn slave_config(&self, chan: HwChannel, config: &ChannelConfig) -> Result<()>;

    /// Build a single-buffer descriptor for `len` bytes at `bus_addr`.
    ///
    /// Returns `None` if the channel cannot take a descriptor right now
    /// (busy, unconfigured or released).
    fn prep_slave_single(
        &self,
        chan: HwChannel,
        bus_addr: u64,
        len: usize,
        direction: Direction,
        flags: u32,
    ) -> Option<PreparedTx>;

    /// Attach `callback` and append the descriptor to the channel's
    /// pending queue. A negative cookie means the submit was rejected.
    fn tx_submit(&self, tx: PreparedTx, callback: CompletionCallback) -> Cookie;

    /// Start executing every submitted-but-not-started descriptor.
    fn issue_pending(&self, chan: HwChannel);

    /// Status of a previously submitted cookie.
    fn tx_status(&self, chan: HwChannel, cookie: Cookie) -> DmaStatus;

    /// Abandon every descriptor queued or running on the channel.
    fn terminate_all(&self, chan: HwChannel) -> Result<()>;
}
