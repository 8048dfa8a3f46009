//! Transfer descriptor types.
//!
//! A descriptor is created by `prepare`, gets its cookie from the
//! hardware's submit step, and is consumed by `start`. Descriptors are
//! never reused: every transfer builds a fresh one.

use crate::channel::{ChannelId, CompletionId, Direction};
use std::fmt;

/// Correlation token returned by descriptor submission.
///
/// Follows dmaengine conventions: valid cookies are `>= 1`, negative
/// values are submit errors, `0` means "not submitted yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Cookie(pub i32);

impl Cookie {
    /// Sentinel for a descriptor that has not been submitted.
    pub const UNSET: Self = Self(0);

    /// First cookie a channel hands out.
    pub const MIN: Self = Self(1);

    /// Whether the hardware rejected the submission.
    #[inline]
    pub fn is_error(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 >= Self::MIN.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cookie#{}", self.0)
    }
}

/// Descriptor control flags passed to `prep_slave_single`.
pub mod prep_flags {
    /// Descriptor is acked up front: single-shot, never re-submitted.
    pub const CTRL_ACK: u32 = 1 << 0;
    /// Do not unmap the destination after completion (arena stays mapped).
    pub const SKIP_DEST_UNMAP: u32 = 1 << 1;
    /// Raise a completion interrupt (run the callback) when done.
    pub const PREP_INTERRUPT: u32 = 1 << 2;

    /// Flags the engine uses for every transfer.
    pub const SINGLE_SHOT: u32 = CTRL_ACK | SKIP_DEST_UNMAP | PREP_INTERRUPT;
}

/// One prepared transfer against an arena slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub channel: ChannelId,
    pub completion: CompletionId,
    pub direction: Direction,
    /// Byte offset into the shared arena.
    pub offset: u32,
    /// Byte length of the transfer.
    pub len: u32,
    /// `Cookie::UNSET` until submission succeeds.
    pub cookie: Cookie,
    pub flags: u32,
}

impl TransferDescriptor {
    pub fn new(
        channel: ChannelId,
        completion: CompletionId,
        direction: Direction,
        offset: u32,
        len: u32,
    ) -> Self {
        Self {
            channel,
            completion,
            direction,
            offset,
            len,
            cookie: Cookie::UNSET,
            flags: prep_flags::SINGLE_SHOT,
        }
    }

    /// Exclusive end offset in the arena.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.len as u64
    }

    #[inline]
    pub fn is_submitted(&self) -> bool {
        self.cookie.is_valid()
    }
}

/// Hardware-reported status of a submitted cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaStatus {
    Complete,
    InProgress,
    Paused,
    Error,
}

impl fmt::Display for DmaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmaStatus::Complete => write!(f, "complete"),
            DmaStatus::InProgress => write!(f, "in progress"),
            DmaStatus::Paused => write!(f, "paused"),
            DmaStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    /// Issued without waiting; no completion guarantee.
    Started,
    /// Completion signaled and the hardware reports success.
    Completed,
    /// The timeout elapsed first. The descriptor is still outstanding.
    TimedOut,
    /// Completion signaled but the hardware did not report success.
    CompletedWithError(DmaStatus),
}

impl TransferResult {
    /// Whether the caller should `stop` the channel before reusing it.
    pub fn needs_recovery(self) -> bool {
        matches!(self, TransferResult::TimedOut | TransferResult::CompletedWithError(_))
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferResult::Started => write!(f, "started"),
            TransferResult::Completed => write!(f, "completed"),
            TransferResult::TimedOut => write!(f, "timed out"),
            TransferResult::CompletedWithError(s) => write!(f, "completed with status '{}'", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeviceId;

    #[test]
    fn test_cookie_classes() {
        assert!(!Cookie::UNSET.is_valid());
        assert!(!Cookie::UNSET.is_error());
        assert!(Cookie(7).is_valid());
        assert!(Cookie(-16).is_error());
    }

    #[test]
    fn test_new_descriptor_is_unsubmitted() {
        let ch = ChannelId::rx(DeviceId(0));
        let d = TransferDescriptor::new(ch, ch.completion(), Direction::DevToMem, 4160, 4100);
        assert_eq!(d.cookie, Cookie::UNSET);
        assert!(!d.is_submitted());
        assert_eq!(d.end(), 8260);
        assert_eq!(d.flags, prep_flags::SINGLE_SHOT);
    }

    #[test]
    fn test_needs_recovery() {
        assert!(!TransferResult::Started.needs_recovery());
        assert!(!TransferResult::Completed.needs_recovery());
        assert!(TransferResult::TimedOut.needs_recovery());
        assert!(TransferResult::CompletedWithError(DmaStatus::Error).needs_recovery());
    }
}
