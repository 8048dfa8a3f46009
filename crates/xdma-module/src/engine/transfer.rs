//! Descriptor preparation and transfer start

use super::TransferEngine;
use crate::registry::ChannelSlot;
use std::sync::Arc;
use std::time::{Duration, Instant};
use xdma_core::error::{Result, XdmaError};
use xdma_core::{
    kerror, ktrace, kwarn, BufferRequest, ChannelId, CompletionId, Cookie, DmaBackend,
    DmaStatus, TransferDescriptor, TransferRequest, TransferResult,
};

/// Sleep granularity when the timeout has no representable deadline.
const UNBOUNDED_SLICE: Duration = Duration::from_secs(3600);

impl<B: DmaBackend> TransferEngine<B> {
    /// Build and submit a single-buffer descriptor.
    ///
    /// Nothing moves until `start`. The descriptor's completion signals
    /// the channel's token.
    pub fn prepare(&self, request: &BufferRequest) -> Result<Cookie> {
        let BufferRequest { channel, completion, offset, size, direction } = *request;
        let slot = self.registry.slot_with_token(channel, completion)?;

        let mut states = self.states();
        let state = states.entry(channel).or_default();
        state.reap(&*self.backend, slot.hw);
        match state.config {
            Some(cfg) if cfg.direction == direction => {}
            _ => {
                kerror!("xdma: {} not configured for {}", channel, direction);
                return Err(XdmaError::NotConfigured { channel, direction });
            }
        }
        self.arena.check_range(offset as u64, size as u64)?;

        let mut desc = TransferDescriptor::new(channel, completion, direction, offset, size);
        let tx = self
            .backend
            .prep_slave_single(
                slot.hw,
                self.arena.bus_addr(offset),
                size as usize,
                direction,
                desc.flags,
            )
            .ok_or_else(|| {
                kerror!("xdma: prep_slave_single failed on {} ({} bytes @ {})", channel, size, offset);
                XdmaError::SubmissionFailed(channel)
            })?;

        let token = Arc::clone(&slot.token);
        let cookie = self.backend.tx_submit(tx, Box::new(move || token.complete()));
        if !cookie.is_valid() {
            kerror!("xdma: tx_submit rejected on {}: {}", channel, cookie);
            return Err(XdmaError::SubmitRejected { channel, cookie });
        }

        desc.cookie = cookie;
        state.prepared.push(desc);
        ktrace!("xdma: {} prepared {} bytes @ {} as {}", channel, size, offset, cookie);
        Ok(cookie)
    }

    /// Issue everything pending on the channel and optionally wait for
    /// `cookie`, bounded by the engine timeout.
    pub fn start(&self, request: &TransferRequest) -> Result<TransferResult> {
        let TransferRequest { channel, completion, cookie, wait } = *request;
        let slot = self.registry.slot_with_token(channel, completion)?;

        {
            let mut states = self.states();
            let state = states
                .get_mut(&channel)
                .filter(|s| s.knows(cookie))
                .ok_or(XdmaError::UnknownCookie { channel, cookie })?;
            state.reap(&*self.backend, slot.hw);
            state.issue();

            slot.token.reinit();
            self.backend.issue_pending(slot.hw);
        }

        if !wait {
            return Ok(TransferResult::Started);
        }
        let result = self.await_cookie(channel, slot, cookie);
        self.reap(channel);
        Ok(result)
    }

    /// Wait for a cookie already started without waiting.
    ///
    /// A transfer that finished in the meantime reports its outcome at
    /// once, even if the token has been re-armed since.
    pub fn wait(
        &self,
        channel: ChannelId,
        completion: CompletionId,
        cookie: Cookie,
    ) -> Result<TransferResult> {
        let slot = self.registry.slot_with_token(channel, completion)?;
        let started = self
            .states()
            .get(&channel)
            .is_some_and(|s| s.in_flight.iter().any(|d| d.cookie == cookie) || s.was_issued(cookie));
        if !started {
            return Err(XdmaError::UnknownCookie { channel, cookie });
        }
        let result = self.await_cookie(channel, slot, cookie);
        self.reap(channel);
        Ok(result)
    }

    /// Block until `cookie` settles or the engine timeout passes.
    ///
    /// Status is read before every sleep: the token only says that some
    /// descriptor on the channel finished, and a cookie that finished
    /// before the token was last re-armed will never signal again.
    fn await_cookie(&self, channel: ChannelId, slot: &ChannelSlot, cookie: Cookie) -> TransferResult {
        // A timeout too large to represent waits without a deadline.
        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            let status = self.backend.tx_status(slot.hw, cookie);
            if let Some(result) = self.settled(channel, cookie, status) {
                return result;
            }

            let remaining = deadline.map_or(UNBOUNDED_SLICE, |d| d.saturating_duration_since(Instant::now()));
            if slot.token.wait_timeout(remaining) {
                slot.token.reinit();
                continue;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                let status = self.backend.tx_status(slot.hw, cookie);
                if let Some(result) = self.settled(channel, cookie, status) {
                    return result;
                }
                kerror!("xdma: transfer timed out on {} ({}) after {:?}", channel, cookie, self.timeout);
                return TransferResult::TimedOut;
            }
        }
    }

    fn settled(&self, channel: ChannelId, cookie: Cookie, status: DmaStatus) -> Option<TransferResult> {
        match status {
            DmaStatus::InProgress => None,
            DmaStatus::Complete => Some(TransferResult::Completed),
            other => {
                kwarn!("xdma: {} on {} finished with status '{}'", cookie, channel, other);
                Some(TransferResult::CompletedWithError(other))
            }
        }
    }

    fn reap(&self, channel: ChannelId) {
        if let Ok(slot) = self.registry.slot(channel) {
            if let Some(state) = self.states().get_mut(&channel) {
                state.reap(&*self.backend, slot.hw);
            }
        }
    }
}
