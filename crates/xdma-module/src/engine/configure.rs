//! Channel configuration

use super::TransferEngine;
use xdma_core::error::{Result, XdmaError};
use xdma_core::{kdebug, kerror, ChannelConfig, ChannelId, DmaBackend};

impl<B: DmaBackend> TransferEngine<B> {
    /// Apply a slave configuration to `channel`.
    ///
    /// `None` is the handle of a direction the device does not have and
    /// is accepted as a no-op. With `reset` set, descriptors the channel
    /// still holds are discarded.
    pub fn configure(&self, channel: Option<ChannelId>, config: ChannelConfig) -> Result<()> {
        let Some(channel) = channel else {
            return Ok(());
        };
        let config = config.normalized()?;
        let slot = self.registry.slot(channel)?;
        if config.direction != channel.direction {
            return Err(XdmaError::InvalidConfig("direction does not match channel"));
        }

        self.backend.slave_config(slot.hw, &config).map_err(|e| {
            kerror!("xdma: slave config on {} failed: {}", channel, e);
            e
        })?;

        let mut states = self.states();
        let state = states.entry(channel).or_default();
        if config.reset {
            let dropped = state.drop_all();
            if dropped > 0 {
                kdebug!("xdma: {} reset, {} descriptors discarded", channel, dropped);
            }
        }
        state.config = Some(config);

        kdebug!(
            "xdma: {} configured: coalesce {} delay {}",
            channel,
            config.coalesce,
            config.delay
        );
        Ok(())
    }
}
