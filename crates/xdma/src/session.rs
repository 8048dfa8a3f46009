//! Client session over a controller

use xdma_core::error::{Result, XdmaError};
use xdma_core::{
    kerror, kinfo, BufferRequest, ChannelConfig, ChannelId, ChannelPair, Controller, Cookie,
    DeviceId, Direction, SelfTestReport, TransferRequest, TransferResult,
};
use xdma_module::{Arena, ArenaBuf, ArenaHost, DeviceConfig, SimConfig, XdmaDevice};

/// Which directions of a transaction block until completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    #[default]
    None,
    /// Wait for the source (tx) leg.
    Src,
    /// Wait for the destination (rx) leg.
    Dst,
    Both,
}

impl WaitMode {
    const SRC: u32 = 1 << 0;
    const DST: u32 = 1 << 1;

    pub fn from_bits(bits: u32) -> Self {
        match (bits & Self::SRC != 0, bits & Self::DST != 0) {
            (false, false) => WaitMode::None,
            (true, false) => WaitMode::Src,
            (false, true) => WaitMode::Dst,
            (true, true) => WaitMode::Both,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            WaitMode::None => 0,
            WaitMode::Src => Self::SRC,
            WaitMode::Dst => Self::DST,
            WaitMode::Both => Self::SRC | Self::DST,
        }
    }

    #[inline]
    pub fn src(self) -> bool {
        self.bits() & Self::SRC != 0
    }

    #[inline]
    pub fn dst(self) -> bool {
        self.bits() & Self::DST != 0
    }
}

/// Per-leg results of `perform_transaction`. `None` for a skipped leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOutcome {
    pub src: Option<TransferResult>,
    pub dst: Option<TransferResult>,
}

impl TransactionOutcome {
    /// Any leg timed out or ended in error; `stop_transaction` it.
    pub fn needs_recovery(&self) -> bool {
        [self.src, self.dst].into_iter().flatten().any(TransferResult::needs_recovery)
    }
}

/// An initialized client.
///
/// `init` discovers every channel pair and configures both directions
/// with coalescing 1 and no delay.
pub struct Xdma<C: Controller + ArenaHost = XdmaDevice> {
    ctl: C,
    devices: Vec<ChannelPair>,
}

impl Xdma<XdmaDevice> {
    /// Client over simulated hardware.
    pub fn open_simulated(sim: SimConfig, config: DeviceConfig) -> Result<Self> {
        Self::init(XdmaDevice::simulated(sim, config)?)
    }
}

impl<C: Controller + ArenaHost> Xdma<C> {
    pub fn init(ctl: C) -> Result<Self> {
        let count = ctl.device_count()?;
        if count == 0 {
            kerror!("xdma: no DMA devices found");
            return Err(XdmaError::NoDevicesFound);
        }

        let mut devices = Vec::with_capacity(count as usize);
        for i in 0..count {
            let pair = ctl.device_info(DeviceId(i))?;
            for direction in [Direction::DevToMem, Direction::MemToDev] {
                let config = ChannelConfig::new(direction).coalesce(1).delay(0).reset(false);
                ctl.configure(pair.channel(direction), config)?;
            }
            devices.push(pair);
        }

        kinfo!("xdma: client ready, {} device(s)", devices.len());
        Ok(Self { ctl, devices })
    }

    /// Devices discovered at `init`.
    #[inline]
    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Ask the engine again.
    pub fn query_num_devices(&self) -> Result<u32> {
        self.ctl.device_count()
    }

    pub fn device(&self, device: DeviceId) -> Result<&ChannelPair> {
        self.devices
            .get(device.index())
            .ok_or(XdmaError::UnknownDevice(device.0))
    }

    pub fn arena(&self) -> Result<&Arena> {
        self.ctl.arena()
    }

    /// `length` elements of `element_size` bytes from the shared arena.
    pub fn alloc(&self, length: usize, element_size: usize) -> Result<ArenaBuf> {
        self.ctl.arena()?.allocate(length, element_size)
    }

    /// Reclaim the whole arena. Earlier buffers become stale.
    pub fn alloc_reset(&self) -> Result<()> {
        self.ctl.reset_arena()
    }

    /// Offset of `ptr` inside the arena.
    pub fn offset_of(&self, ptr: *const u8) -> Result<u32> {
        self.ctl.arena()?.offset_of(ptr)
    }

    /// Move `src` to the device and/or fill `dst` from it.
    ///
    /// Absent or empty buffers skip their leg. Both legs are prepared
    /// before either starts; src starts first. Waiting follows `wait`.
    pub fn perform_transaction(
        &self,
        device: DeviceId,
        wait: WaitMode,
        src: Option<&ArenaBuf>,
        dst: Option<&ArenaBuf>,
    ) -> Result<TransactionOutcome> {
        let pair = *self.device(device)?;
        let arena = self.ctl.arena()?;
        let src = src.filter(|b| !b.is_empty());
        let dst = dst.filter(|b| !b.is_empty());

        let src_leg = src
            .map(|b| self.prepare_leg(arena, &pair, Direction::MemToDev, b))
            .transpose()?;
        let dst_leg = dst
            .map(|b| self.prepare_leg(arena, &pair, Direction::DevToMem, b))
            .transpose()?;

        Ok(TransactionOutcome {
            src: src_leg.map(|leg| self.start_leg(leg, wait.src())).transpose()?,
            dst: dst_leg.map(|leg| self.start_leg(leg, wait.dst())).transpose()?,
        })
    }

    /// Abort the legs `src`/`dst` would use on `device`.
    pub fn stop_transaction(
        &self,
        device: DeviceId,
        src: Option<&ArenaBuf>,
        dst: Option<&ArenaBuf>,
    ) -> Result<()> {
        let pair = *self.device(device)?;
        if src.is_some_and(|b| !b.is_empty()) {
            self.ctl.stop(pair.tx_chan)?;
        }
        if dst.is_some_and(|b| !b.is_empty()) {
            self.ctl.stop(pair.rx_chan)?;
        }
        Ok(())
    }

    pub fn self_test(&self) -> Result<SelfTestReport> {
        self.ctl.self_test()
    }

    #[inline]
    pub fn controller(&self) -> &C {
        &self.ctl
    }

    /// Tear down the client, handing back the controller.
    pub fn exit(self) -> C {
        self.ctl
    }

    fn prepare_leg(
        &self,
        arena: &Arena,
        pair: &ChannelPair,
        direction: Direction,
        buf: &ArenaBuf,
    ) -> Result<(ChannelId, Cookie)> {
        arena.check(buf)?;
        let missing = || XdmaError::UnknownChannel(ChannelId::new(pair.device_id, direction));
        let channel = pair.channel(direction).ok_or_else(missing)?;
        let completion = pair.completion(direction).ok_or_else(missing)?;
        let size = u32::try_from(buf.requested_len()).map_err(|_| XdmaError::OutOfBounds {
            offset: buf.offset() as u64,
            len: buf.requested_len() as u64,
            capacity: arena.capacity(),
        })?;

        let cookie = self.ctl.prepare(BufferRequest {
            channel,
            completion,
            offset: buf.offset(),
            size,
            direction,
        })?;
        Ok((channel, cookie))
    }

    fn start_leg(&self, (channel, cookie): (ChannelId, Cookie), wait: bool) -> Result<TransferResult> {
        self.ctl.start(TransferRequest {
            channel,
            completion: channel.completion(),
            cookie,
            wait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use xdma_core::kprint::{set_log_level, LogLevel};
    use xdma_module::{SimBehavior, SimulatedDma};

    fn config(capacity: usize) -> DeviceConfig {
        DeviceConfig::new()
            .arena_capacity(capacity)
            .lock_arena(false)
            .transfer_timeout(Duration::from_millis(500))
    }

    #[test]
    fn test_wait_mode_bits() {
        assert_eq!(WaitMode::from_bits(0), WaitMode::None);
        assert_eq!(WaitMode::from_bits(3), WaitMode::Both);
        assert!(WaitMode::Both.src() && WaitMode::Both.dst());
        assert!(WaitMode::Dst.dst() && !WaitMode::Dst.src());
        assert_eq!(WaitMode::Src.bits(), 1);
    }

    #[test]
    fn test_end_to_end_loopback() {
        let xdma = Xdma::open_simulated(SimConfig::pairs(1), config(12288)).unwrap();
        assert_eq!(xdma.num_devices(), 1);

        let dst = xdma.alloc(1025, 4).unwrap();
        let src = xdma.alloc(1025, 4).unwrap();
        assert_eq!(dst.offset(), 0);
        assert_eq!(src.offset(), 4160);
        assert_eq!(xdma.offset_of(src.as_ptr()).unwrap(), 4160);

        let arena = xdma.arena().unwrap();
        arena.fill(src.offset() as usize, 4100, b'B').unwrap();
        arena.fill(dst.offset() as usize, 4100, b'A').unwrap();

        let outcome = xdma
            .perform_transaction(DeviceId(0), WaitMode::Dst, Some(&src), Some(&dst))
            .unwrap();
        assert_eq!(outcome.src, Some(TransferResult::Started));
        assert_eq!(outcome.dst, Some(TransferResult::Completed));
        assert!(!outcome.needs_recovery());

        let mut head = [0u8; 10];
        arena.read_at(dst.offset() as usize, &mut head).unwrap();
        assert_eq!(head, [b'B'; 10]);
    }

    #[test]
    fn test_one_way_transaction() {
        let xdma = Xdma::open_simulated(
            SimConfig::pairs(1).behavior(SimBehavior::Immediate),
            config(8192),
        )
        .unwrap();
        let src = xdma.alloc(256, 4).unwrap();
        let empty = xdma.alloc(0, 4).unwrap();

        let outcome = xdma
            .perform_transaction(DeviceId(0), WaitMode::Both, Some(&src), Some(&empty))
            .unwrap();
        assert_eq!(outcome.src, Some(TransferResult::Completed));
        assert_eq!(outcome.dst, None);
    }

    #[test]
    fn test_timeout_then_stop_then_retry() {
        set_log_level(LogLevel::Off);
        let mut dev = XdmaDevice::new(
            SimulatedDma::new(SimConfig::pairs(1).behavior(SimBehavior::Stall)).unwrap(),
            config(8192).transfer_timeout(Duration::from_millis(30)),
        );
        dev.init().unwrap();
        let xdma = Xdma::init(dev).unwrap();
        let dst = xdma.alloc(64, 1).unwrap();

        let outcome = xdma
            .perform_transaction(DeviceId(0), WaitMode::Dst, None, Some(&dst))
            .unwrap();
        assert_eq!(outcome.dst, Some(TransferResult::TimedOut));
        assert!(outcome.needs_recovery());
        assert!(matches!(xdma.alloc_reset(), Err(XdmaError::ArenaBusy(1))));

        xdma.stop_transaction(DeviceId(0), None, Some(&dst)).unwrap();
        xdma.alloc_reset().unwrap();

        let dst = xdma.alloc(64, 1).unwrap();
        let outcome = xdma
            .perform_transaction(DeviceId(0), WaitMode::None, None, Some(&dst))
            .unwrap();
        assert_eq!(outcome.dst, Some(TransferResult::Started));
    }

    #[test]
    fn test_stale_buffer_rejected() {
        let xdma = Xdma::open_simulated(SimConfig::pairs(1), config(8192)).unwrap();
        let old = xdma.alloc(16, 4).unwrap();
        xdma.alloc_reset().unwrap();
        assert!(matches!(
            xdma.perform_transaction(DeviceId(0), WaitMode::None, Some(&old), None),
            Err(XdmaError::StaleBuffer { .. })
        ));
    }

    #[test]
    fn test_unknown_device_and_zero_pairs() {
        set_log_level(LogLevel::Off);
        let xdma = Xdma::open_simulated(SimConfig::pairs(1), config(4096)).unwrap();
        assert_eq!(
            xdma.perform_transaction(DeviceId(1), WaitMode::None, None, None),
            Err(XdmaError::UnknownDevice(1))
        );

        let mut dev = XdmaDevice::new(SimulatedDma::new(SimConfig::pairs(0)).unwrap(), config(4096));
        assert_eq!(dev.init(), Err(XdmaError::NoDevicesFound));
        assert!(matches!(Xdma::init(dev), Err(XdmaError::NoDevicesFound)));
    }

    #[test]
    fn test_alloc_capacity() {
        let xdma = Xdma::open_simulated(SimConfig::pairs(1), config(4096)).unwrap();
        xdma.alloc(1000, 4).unwrap();
        assert!(matches!(xdma.alloc(1000, 4), Err(XdmaError::CapacityExceeded { .. })));
    }
}
