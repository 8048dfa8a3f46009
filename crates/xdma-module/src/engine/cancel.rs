//! Transfer cancellation

use super::TransferEngine;
use xdma_core::error::Result;
use xdma_core::{kerror, kinfo, ChannelId, DmaBackend};

impl<B: DmaBackend> TransferEngine<B> {
    /// Abort everything queued or running on `channel`.
    ///
    /// Used after a `TimedOut` or errored transfer to make the channel
    /// usable again. `None` is a no-op.
    pub fn stop(&self, channel: Option<ChannelId>) -> Result<()> {
        let Some(channel) = channel else {
            return Ok(());
        };
        let slot = self.registry.slot(channel)?;

        self.backend.terminate_all(slot.hw).map_err(|e| {
            kerror!("xdma: terminate_all on {} failed: {}", channel, e);
            e
        })?;

        let dropped = self
            .states()
            .get_mut(&channel)
            .map_or(0, |state| state.drop_all());
        if dropped > 0 {
            kinfo!("xdma: {} stopped, {} descriptors abandoned", channel, dropped);
        }
        Ok(())
    }
}
