//! Channel identity types.
//!
//! A *device* is one DMA IP instance with up to two channels: transmit
//! (memory → device) and receive (device → memory). Handles handed to
//! callers are typed identifiers, never raw hardware pointers; the
//! registry resolves them with a checked lookup.

use std::fmt;

/// Transfer direction of a channel or descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Transmit: arena → device (AXI MM2S).
    MemToDev = 0,
    /// Receive: device → arena (AXI S2MM).
    DevToMem = 1,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::MemToDev, Direction::DevToMem];

    /// Short tag used in log lines ("tx" / "rx").
    pub fn tag(self) -> &'static str {
        match self {
            Direction::MemToDev => "tx",
            Direction::DevToMem => "rx",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::MemToDev => write!(f, "mem-to-dev"),
            Direction::DevToMem => write!(f, "dev-to-mem"),
        }
    }
}

/// Zero-based device index, dense in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DeviceId(pub u32);

impl DeviceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Handle to one directional channel of a probed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub device: DeviceId,
    pub direction: Direction,
}

impl ChannelId {
    pub const fn new(device: DeviceId, direction: Direction) -> Self {
        Self { device, direction }
    }

    pub const fn tx(device: DeviceId) -> Self {
        Self::new(device, Direction::MemToDev)
    }

    pub const fn rx(device: DeviceId) -> Self {
        Self::new(device, Direction::DevToMem)
    }

    /// The completion token owned by this channel.
    pub const fn completion(self) -> CompletionId {
        CompletionId { device: self.device, direction: self.direction }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.direction.tag())
    }
}

/// Handle to the completion token of one channel.
///
/// Kept distinct from `ChannelId` so a token cannot be passed where a
/// channel is expected; `CompletionId::channel()` names its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionId {
    pub device: DeviceId,
    pub direction: Direction,
}

impl CompletionId {
    pub const fn channel(self) -> ChannelId {
        ChannelId { device: self.device, direction: self.direction }
    }
}

impl fmt::Display for CompletionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-cmp", self.device, self.direction.tag())
    }
}

/// One probed device: a tx/rx channel pair and their completion tokens.
///
/// Either direction may be absent on a device that only exposes one
/// channel; configure/stop treat an absent channel as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPair {
    pub device_id: DeviceId,
    pub tx_chan: Option<ChannelId>,
    pub tx_cmp: Option<CompletionId>,
    pub rx_chan: Option<ChannelId>,
    pub rx_cmp: Option<CompletionId>,
}

impl ChannelPair {
    /// Build the pair for `device_id` given which directions were found.
    pub fn new(device_id: DeviceId, has_tx: bool, has_rx: bool) -> Self {
        let tx = has_tx.then(|| ChannelId::tx(device_id));
        let rx = has_rx.then(|| ChannelId::rx(device_id));
        Self {
            device_id,
            tx_chan: tx,
            tx_cmp: tx.map(ChannelId::completion),
            rx_chan: rx,
            rx_cmp: rx.map(ChannelId::completion),
        }
    }

    pub fn channel(&self, direction: Direction) -> Option<ChannelId> {
        match direction {
            Direction::MemToDev => self.tx_chan,
            Direction::DevToMem => self.rx_chan,
        }
    }

    pub fn completion(&self, direction: Direction) -> Option<CompletionId> {
        match direction {
            Direction::MemToDev => self.tx_cmp,
            Direction::DevToMem => self.rx_cmp,
        }
    }
}

/// Opaque hardware channel token issued by a `DmaBackend`.
///
/// Only meaningful to the backend that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HwChannel(pub u32);

/// What a hardware channel reports about itself during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub direction: Direction,
    /// Position of the owning IP instance among identical instances.
    pub ordinal: u32,
}

/// Structured probe predicate: "a channel of this direction belonging to
/// the `ordinal`-th IP instance".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMatch {
    pub direction: Direction,
    pub ordinal: u32,
}

impl ChannelMatch {
    pub const fn new(direction: Direction, ordinal: u32) -> Self {
        Self { direction, ordinal }
    }

    #[inline]
    pub fn matches(&self, info: &ChannelInfo) -> bool {
        info.direction == self.direction && info.ordinal == self.ordinal
    }
}
