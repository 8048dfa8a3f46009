//! XDMA error types.

use crate::channel::{ChannelId, CompletionId, Direction};
use crate::descriptor::Cookie;
use std::fmt;

/// Error class, used to decide whether a caller can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad device/channel/token or a channel used before configuration.
    /// Not retryable without caller intervention.
    Configuration,
    /// Arena exhausted or a range outside the arena.
    Capacity,
    /// Hardware refused a descriptor. Retry after reconfiguring.
    Submission,
    /// No channel pairs were found.
    Discovery,
    /// OS-level failure (mapping, locking).
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdmaError {
    /// Device index outside `[0, count)`.
    UnknownDevice(u32),
    /// Channel handle not present in the registry.
    UnknownChannel(ChannelId),
    /// Completion token does not belong to the channel it was paired with.
    TokenMismatch {
        channel: ChannelId,
        completion: CompletionId,
    },
    /// Channel has not been configured for this direction.
    NotConfigured {
        channel: ChannelId,
        direction: Direction,
    },
    /// Channel configuration values out of range.
    InvalidConfig(&'static str),
    /// Cookie was never prepared on this channel (or already consumed).
    UnknownCookie {
        channel: ChannelId,
        cookie: Cookie,
    },

    /// Arena allocation larger than the remaining space.
    CapacityExceeded {
        requested: usize,
        remaining: usize,
    },
    /// Byte range not inside the arena.
    OutOfBounds {
        offset: u64,
        len: u64,
        capacity: usize,
    },
    /// Pointer does not lie within the arena.
    OutOfArena,
    /// Buffer was allocated before the last arena reset.
    StaleBuffer {
        buffer_generation: u64,
        arena_generation: u64,
    },
    /// Arena reset refused while descriptors still reference it.
    ArenaBusy(usize),

    /// Descriptor construction failed (channel busy or unavailable).
    SubmissionFailed(ChannelId),
    /// Hardware returned an invalid cookie on submit.
    SubmitRejected {
        channel: ChannelId,
        cookie: Cookie,
    },

    /// Probing found zero channel pairs.
    NoDevicesFound,
    /// Engine used before `init` or after `shutdown`.
    NotInitialized,
    /// Controller answered a command with the wrong response type.
    Protocol(&'static str),

    /// Mapping the shared region failed.
    MapFailed(i32),
    /// OS error with errno.
    Os(i32),
}

impl XdmaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownDevice(_)
            | Self::UnknownChannel(_)
            | Self::TokenMismatch { .. }
            | Self::NotConfigured { .. }
            | Self::InvalidConfig(_)
            | Self::UnknownCookie { .. }
            | Self::NotInitialized
            | Self::Protocol(_) => ErrorKind::Configuration,
            Self::CapacityExceeded { .. }
            | Self::OutOfBounds { .. }
            | Self::OutOfArena
            | Self::StaleBuffer { .. }
            | Self::ArenaBusy(_) => ErrorKind::Capacity,
            Self::SubmissionFailed(_) | Self::SubmitRejected { .. } => ErrorKind::Submission,
            Self::NoDevicesFound => ErrorKind::Discovery,
            Self::MapFailed(_) | Self::Os(_) => ErrorKind::System,
        }
    }

    /// Submission errors may succeed after reconfiguring the channel.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Submission
    }
}

impl fmt::Display for XdmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDevice(id) => write!(f, "unknown device {}", id),
            Self::UnknownChannel(ch) => write!(f, "unknown channel {}", ch),
            Self::TokenMismatch { channel, completion } => {
                write!(f, "completion {} does not belong to channel {}", completion, channel)
            }
            Self::NotConfigured { channel, direction } => {
                write!(f, "channel {} not configured for {}", channel, direction)
            }
            Self::InvalidConfig(why) => write!(f, "invalid channel config: {}", why),
            Self::UnknownCookie { channel, cookie } => {
                write!(f, "{} was not prepared on channel {}", cookie, channel)
            }
            Self::CapacityExceeded { requested, remaining } => write!(
                f,
                "arena capacity exceeded: requested {} bytes, {} remaining",
                requested, remaining
            ),
            Self::OutOfBounds { offset, len, capacity } => write!(
                f,
                "range [{}, {}) outside arena of {} bytes",
                offset,
                offset + len,
                capacity
            ),
            Self::OutOfArena => write!(f, "pointer outside arena"),
            Self::StaleBuffer { buffer_generation, arena_generation } => write!(
                f,
                "stale buffer: allocated in generation {}, arena is at {}",
                buffer_generation, arena_generation
            ),
            Self::ArenaBusy(n) => write!(f, "arena busy: {} descriptors outstanding", n),
            Self::SubmissionFailed(ch) => write!(f, "descriptor preparation failed on {}", ch),
            Self::SubmitRejected { channel, cookie } => {
                write!(f, "submit rejected on {}: {}", channel, cookie)
            }
            Self::NoDevicesFound => write!(f, "no DMA devices found"),
            Self::NotInitialized => write!(f, "XDMA device not initialized"),
            Self::Protocol(cmd) => write!(f, "unexpected response to {}", cmd),
            Self::MapFailed(e) => write!(f, "mapping shared region failed: errno {}", e),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for XdmaError {}

pub type Result<T> = std::result::Result<T, XdmaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeviceId;

    #[test]
    fn test_error_display() {
        let e = XdmaError::CapacityExceeded { requested: 4160, remaining: 64 };
        assert_eq!(
            format!("{}", e),
            "arena capacity exceeded: requested 4160 bytes, 64 remaining"
        );

        let e = XdmaError::UnknownChannel(ChannelId::rx(DeviceId(1)));
        assert_eq!(format!("{}", e), "unknown channel dev1/rx");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(XdmaError::UnknownDevice(9).kind(), ErrorKind::Configuration);
        assert_eq!(XdmaError::OutOfArena.kind(), ErrorKind::Capacity);
        assert_eq!(XdmaError::NoDevicesFound.kind(), ErrorKind::Discovery);
        assert!(XdmaError::SubmissionFailed(ChannelId::tx(DeviceId(0))).is_retryable());
        assert!(!XdmaError::ArenaBusy(2).is_retryable());
    }
}
