//! Transfer engine
//!
//! Drives a `DmaBackend` on behalf of the command surface: channel
//! configuration (`configure`), descriptor preparation and submission
//! (`transfer::prepare`), issue and bounded wait (`transfer::start`),
//! and cancellation (`cancel::stop`).
//!
//! Per-channel bookkeeping records the last applied configuration and
//! every descriptor the engine has submitted but not yet seen complete:
//!
//! ```text
//!   prepare ──► prepared ──start──► in_flight ──(Complete/Error)──► reaped
//!                   │                    │
//!                   └──── stop / reset ──┴──► dropped
//! ```

mod configure;
mod transfer;
mod cancel;

use crate::arena::Arena;
use crate::registry::ChannelRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use xdma_core::{ChannelConfig, ChannelId, Cookie, DmaBackend, DmaStatus, HwChannel, TransferDescriptor};

#[derive(Debug, Default)]
struct ChannelState {
    config: Option<ChannelConfig>,
    /// Submitted, not yet issued.
    prepared: Vec<TransferDescriptor>,
    /// Issued, completion not yet observed.
    in_flight: Vec<TransferDescriptor>,
    /// Highest cookie ever issued on the channel.
    issued: Option<Cookie>,
}

impl ChannelState {
    /// Prepared, in flight, or issued earlier and already reaped.
    fn knows(&self, cookie: Cookie) -> bool {
        self.prepared.iter().chain(self.in_flight.iter()).any(|d| d.cookie == cookie)
            || self.was_issued(cookie)
    }

    fn was_issued(&self, cookie: Cookie) -> bool {
        cookie.is_valid() && self.issued.is_some_and(|hi| cookie <= hi)
    }

    /// Move every prepared descriptor to in-flight.
    fn issue(&mut self) {
        if let Some(hi) = self.prepared.iter().map(|d| d.cookie).max() {
            self.issued = self.issued.max(Some(hi));
        }
        self.in_flight.append(&mut self.prepared);
    }

    fn outstanding(&self) -> usize {
        self.prepared.len() + self.in_flight.len()
    }

    /// Forget every descriptor, including ones issued and already reaped.
    fn drop_all(&mut self) -> usize {
        let n = self.outstanding();
        self.prepared.clear();
        self.in_flight.clear();
        self.issued = None;
        n
    }

    /// Forget in-flight descriptors the hardware has finished with.
    fn reap<B: DmaBackend + ?Sized>(&mut self, backend: &B, hw: HwChannel) {
        self.in_flight.retain(|d| {
            matches!(backend.tx_status(hw, d.cookie), DmaStatus::InProgress | DmaStatus::Paused)
        });
    }
}

pub struct TransferEngine<B: DmaBackend> {
    backend: Arc<B>,
    arena: Arc<Arena>,
    registry: ChannelRegistry,
    timeout: Duration,
    channels: Mutex<HashMap<ChannelId, ChannelState>>,
}

impl<B: DmaBackend> TransferEngine<B> {
    /// An engine with no channels; call `probe` to discover them.
    pub fn new(backend: Arc<B>, arena: Arc<Arena>, timeout: Duration) -> Self {
        Self {
            backend,
            arena,
            registry: ChannelRegistry::empty(),
            timeout,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Release anything held and probe afresh. Returns the pair count.
    pub fn probe(&mut self, max_devices: usize) -> usize {
        self.release();
        self.registry = ChannelRegistry::probe(&*self.backend, max_devices);
        self.registry.count()
    }

    #[inline]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    #[inline]
    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn states(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelState>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last configuration applied to `channel`.
    pub fn config_of(&self, channel: ChannelId) -> Option<ChannelConfig> {
        self.states().get(&channel).and_then(|s| s.config)
    }

    /// Descriptors still referencing the arena, across all channels.
    pub fn outstanding(&self) -> usize {
        let mut states = self.states();
        states
            .iter_mut()
            .map(|(channel, state)| {
                if let Ok(slot) = self.registry.slot(*channel) {
                    state.reap(&*self.backend, slot.hw);
                }
                state.outstanding()
            })
            .sum()
    }

    /// Terminate and release every channel. Idempotent.
    pub fn release(&mut self) {
        for channel in self.registry.channels().collect::<Vec<_>>() {
            let _ = self.stop(Some(channel));
        }
        self.registry.release_all(&*self.backend);
        self.states().clear();
    }
}

impl<B: DmaBackend> Drop for TransferEngine<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::sim::{SimConfig, SimulatedDma};
    use xdma_core::{ChannelConfig, DeviceId, Direction};

    /// Probed engine over a simulator, both channels of every pair configured.
    pub fn engine(sim: SimConfig, capacity: usize, timeout: Duration) -> TransferEngine<SimulatedDma> {
        xdma_core::kprint::set_log_level(xdma_core::kprint::LogLevel::Off);
        let backend = Arc::new(SimulatedDma::new(sim).unwrap());
        let arena = Arc::new(Arena::new(capacity, false).unwrap());
        let mut engine = TransferEngine::new(backend, arena, timeout);
        let n = engine.probe(4);
        for i in 0..n as u32 {
            for dir in Direction::ALL {
                engine
                    .configure(Some(ChannelId::new(DeviceId(i), dir)), ChannelConfig::new(dir))
                    .unwrap();
            }
        }
        engine
    }
}
