//! `XdmaDevice`: engine lifecycle and command dispatch.
//!
//! Owns the backend, the arena and the transfer engine. `init` maps and
//! resets the arena, then probes channel pairs; `shutdown` releases the
//! channels before the arena is unmapped so no descriptor outlives the
//! memory it points into.
//!
//! ```text
//! XdmaDevice<B: DmaBackend = SimulatedDma>
//!   ├── TransferEngine<B>   (registry, per-channel state)
//!   │     └── Arc<Arena>    (shared region)
//!   └── Arc<B>              (hardware)
//! ```

use crate::arena::{Arena, ArenaHost};
use crate::config::DeviceConfig;
use crate::engine::TransferEngine;
use crate::selftest;
use crate::sim::{SimConfig, SimulatedDma};
use std::sync::Arc;
use xdma_core::error::{Result, XdmaError};
use xdma_core::{kdebug, kerror, kinfo, Command, Controller, DmaBackend, Response};

pub struct XdmaDevice<B: DmaBackend = SimulatedDma> {
    config: DeviceConfig,
    backend: Arc<B>,
    engine: Option<TransferEngine<B>>,
}

impl XdmaDevice<SimulatedDma> {
    /// Initialized device over simulated hardware.
    ///
    /// A simulator without channels still yields `NoDevicesFound`.
    pub fn simulated(sim: SimConfig, config: DeviceConfig) -> Result<Self> {
        let mut device = Self::new(SimulatedDma::new(sim)?, config);
        device.init()?;
        Ok(device)
    }
}

impl<B: DmaBackend> XdmaDevice<B> {
    /// An uninitialized device.
    pub fn new(backend: B, config: DeviceConfig) -> Self {
        Self {
            config,
            backend: Arc::new(backend),
            engine: None,
        }
    }

    /// Map and reset the arena, then probe channel pairs.
    ///
    /// Re-initializing shuts the previous state down first. With zero
    /// pairs the arena stays mapped and `NoDevicesFound` is returned;
    /// commands then see a device count of 0.
    pub fn init(&mut self) -> Result<()> {
        self.shutdown();
        self.config.validate()?;

        let arena = Arena::new(self.config.arena_capacity, self.config.lock_arena).map_err(|e| {
            kerror!("xdma: could not map {} byte arena: {}", self.config.arena_capacity, e);
            e
        })?;
        arena.reset();
        kdebug!(
            "xdma: arena {} bytes at bus {:#x}{}",
            arena.capacity(),
            arena.region().bus_addr(),
            if arena.region().is_locked() { " (pinned)" } else { "" }
        );

        let mut engine = TransferEngine::new(
            Arc::clone(&self.backend),
            Arc::new(arena),
            self.config.transfer_timeout,
        );
        let found = engine.probe(self.config.max_devices);
        self.engine = Some(engine);

        if found == 0 {
            kerror!("xdma: no DMA devices found");
            return Err(XdmaError::NoDevicesFound);
        }
        kinfo!("xdma: initialized with {} device(s)", found);
        Ok(())
    }

    /// Release channels, then the arena. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.release();
            kinfo!("xdma: shut down");
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Result<&TransferEngine<B>> {
        self.engine.as_ref().ok_or(XdmaError::NotInitialized)
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

impl<B: DmaBackend> Drop for XdmaDevice<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: DmaBackend> ArenaHost for XdmaDevice<B> {
    fn arena(&self) -> Result<&Arena> {
        Ok(self.engine()?.arena())
    }

    fn reset_arena(&self) -> Result<()> {
        let engine = self.engine()?;
        let outstanding = engine.outstanding();
        if outstanding > 0 {
            kerror!("xdma: arena reset refused, {} descriptors outstanding", outstanding);
            return Err(XdmaError::ArenaBusy(outstanding));
        }
        engine.arena().reset();
        kdebug!("xdma: arena reset, generation {}", engine.arena().generation());
        Ok(())
    }
}

impl<B: DmaBackend> Controller for XdmaDevice<B> {
    fn execute(&self, command: Command) -> Result<Response> {
        kdebug!("xdma: ioctl {}", command.name());
        let engine = self.engine()?;

        match command {
            Command::GetDeviceCount => Ok(Response::DeviceCount(engine.registry().count() as u32)),
            Command::GetDeviceInfo(device) => engine.registry().get(device).map(Response::DeviceInfo),
            Command::ConfigureChannel { channel, config } => {
                engine.configure(channel, config).map(|()| Response::Done)
            }
            Command::PrepareBuffer(request) => engine.prepare(&request).map(Response::Cookie),
            Command::StartTransfer(request) => engine.start(&request).map(Response::Transfer),
            Command::StopTransfer(channel) => engine.stop(channel).map(|()| Response::Done),
            Command::RunBuiltinTest => {
                selftest::run(engine, self.config.selftest_len).map(Response::SelfTest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBehavior;
    use std::time::Duration;
    use xdma_core::kprint::{set_log_level, LogLevel};
    use xdma_core::*;

    fn config(capacity: usize) -> DeviceConfig {
        DeviceConfig::new()
            .arena_capacity(capacity)
            .lock_arena(false)
            .transfer_timeout(Duration::from_millis(500))
    }

    #[test]
    fn test_zero_pairs() {
        set_log_level(LogLevel::Off);
        let mut dev = XdmaDevice::new(SimulatedDma::new(SimConfig::pairs(0)).unwrap(), config(4096));
        assert_eq!(dev.init(), Err(XdmaError::NoDevicesFound));
        assert_eq!(dev.device_count().unwrap(), 0);
        assert!(dev.arena().is_ok());
        assert_eq!(dev.device_info(DeviceId(0)), Err(XdmaError::UnknownDevice(0)));
    }

    #[test]
    fn test_not_initialized() {
        set_log_level(LogLevel::Off);
        let dev = XdmaDevice::new(SimulatedDma::new(SimConfig::pairs(1)).unwrap(), config(4096));
        assert_eq!(dev.device_count(), Err(XdmaError::NotInitialized));
        assert!(dev.arena().is_err());
    }

    #[test]
    fn test_device_info_indices() {
        let dev = XdmaDevice::simulated(SimConfig::pairs(3), config(4096)).unwrap();
        assert_eq!(dev.device_count().unwrap(), 3);
        for i in 0..3 {
            let pair = dev.device_info(DeviceId(i)).unwrap();
            assert_eq!(pair.device_id, DeviceId(i));
            assert_eq!(pair.tx_cmp, Some(ChannelId::tx(DeviceId(i)).completion()));
        }
    }

    #[test]
    fn test_invalid_config_fails_init() {
        let sim = SimulatedDma::new(SimConfig::pairs(1)).unwrap();
        let mut dev = XdmaDevice::new(sim, config(4096).max_devices(0));
        assert!(matches!(dev.init(), Err(XdmaError::InvalidConfig(_))));
        assert!(!dev.is_initialized());
    }

    #[test]
    fn test_shutdown_releases_channels() {
        let mut dev = XdmaDevice::simulated(SimConfig::pairs(2), config(4096)).unwrap();
        assert_eq!(dev.backend().claimed(), 4);
        dev.shutdown();
        assert_eq!(dev.backend().claimed(), 0);
        dev.shutdown();
        assert_eq!(dev.stop(None), Err(XdmaError::NotInitialized));

        dev.init().unwrap();
        assert_eq!(dev.device_count().unwrap(), 2);
    }

    #[test]
    fn test_reset_arena_refused_while_busy() {
        set_log_level(LogLevel::Off);
        let dev = XdmaDevice::simulated(
            SimConfig::pairs(1).behavior(SimBehavior::Stall),
            config(8192),
        )
        .unwrap();
        let rx = ChannelId::rx(DeviceId(0));
        dev.configure(Some(rx), ChannelConfig::new(Direction::DevToMem)).unwrap();

        let buf = dev.arena().unwrap().allocate(16, 4).unwrap();
        dev.prepare(BufferRequest {
            channel: rx,
            completion: rx.completion(),
            offset: buf.offset(),
            size: 64,
            direction: Direction::DevToMem,
        })
        .unwrap();

        assert_eq!(dev.reset_arena(), Err(XdmaError::ArenaBusy(1)));
        dev.stop(Some(rx)).unwrap();
        dev.reset_arena().unwrap();
        assert!(matches!(dev.arena().unwrap().check(&buf), Err(XdmaError::StaleBuffer { .. })));
    }

    #[test]
    fn test_command_dispatch() {
        let dev = XdmaDevice::simulated(SimConfig::pairs(1), config(4096)).unwrap();
        assert_eq!(dev.execute(Command::GetDeviceCount).unwrap(), Response::DeviceCount(1));
        assert_eq!(dev.execute(Command::StopTransfer(None)).unwrap(), Response::Done);
        assert_eq!(
            dev.execute(Command::ConfigureChannel {
                channel: None,
                config: ChannelConfig::new(Direction::MemToDev),
            })
            .unwrap(),
            Response::Done
        );
    }

    #[test]
    fn test_builtin_self_test() {
        let dev = XdmaDevice::simulated(
            SimConfig::pairs(1),
            config(64 * 1024).selftest_len(16 * 1024),
        )
        .unwrap();
        let report = dev.self_test().unwrap();
        assert_eq!(report.bytes, 16 * 1024);
        assert_eq!(report.tx, TransferResult::Completed);
        assert_eq!(report.rx, TransferResult::Completed);
        assert_eq!(report.rx_before, vec![b'Y'; 10]);
        assert_eq!(report.rx_after, vec![b'Z'; 10]);
        dev.reset_arena().unwrap();
    }

    #[test]
    fn test_self_test_clamps_to_half_arena() {
        let dev = XdmaDevice::simulated(SimConfig::pairs(1), config(4096)).unwrap();
        let report = dev.self_test().unwrap();
        assert_eq!(report.bytes, 2048);
    }

    #[test]
    fn test_self_test_leaves_live_buffers_alone() {
        let dev = XdmaDevice::simulated(
            SimConfig::pairs(1),
            config(16 * 1024).selftest_len(64 * 1024),
        )
        .unwrap();
        let arena = dev.arena().unwrap();
        let live = arena.allocate(1000, 4).unwrap();
        arena.fill(live.offset() as usize, live.size(), b'L').unwrap();
        let cursor = arena.cursor();

        let report = dev.self_test().unwrap();
        // Half of the 12352 bytes past the cursor, block-rounded.
        assert_eq!(report.bytes, 6144);
        assert_eq!(report.rx, TransferResult::Completed);
        assert_eq!(report.rx_after, vec![b'Z'; 10]);

        let mut out = vec![0u8; live.size()];
        arena.read_at(live.offset() as usize, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == b'L'));
        assert_eq!(arena.cursor(), cursor);
    }

    #[test]
    fn test_self_test_refused_while_busy() {
        set_log_level(LogLevel::Off);
        let dev = XdmaDevice::simulated(
            SimConfig::pairs(1).behavior(SimBehavior::Stall),
            config(8192),
        )
        .unwrap();
        let tx = ChannelId::tx(DeviceId(0));
        dev.configure(Some(tx), ChannelConfig::new(Direction::MemToDev)).unwrap();
        dev.prepare(BufferRequest {
            channel: tx,
            completion: tx.completion(),
            offset: 0,
            size: 64,
            direction: Direction::MemToDev,
        })
        .unwrap();

        assert_eq!(dev.self_test(), Err(XdmaError::ArenaBusy(1)));
        dev.stop(Some(tx)).unwrap();
        assert_eq!(dev.self_test().map(|r| r.bytes), Ok(4096));
    }
}
