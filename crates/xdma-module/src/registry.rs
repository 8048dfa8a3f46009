//! Channel registry
//!
//! Discovers tx/rx channel pairs by ordinal and owns their completion
//! tokens. Probing walks ordinals 0, 1, 2, ... asking the backend for one
//! channel of each direction and stops at the first ordinal where
//! neither direction matches. Devices are therefore numbered densely.

use crate::completion::CompletionToken;
use std::sync::Arc;
use xdma_core::error::{Result, XdmaError};
use xdma_core::{
    kdebug, kinfo, kwarn, ChannelId, ChannelMatch, ChannelPair, CompletionId, DeviceId,
    Direction, DmaBackend, HwChannel,
};

/// A claimed hardware channel and its completion token.
#[derive(Debug)]
pub struct ChannelSlot {
    pub hw: HwChannel,
    pub token: Arc<CompletionToken>,
}

#[derive(Debug)]
struct DeviceEntry {
    pair: ChannelPair,
    tx: Option<ChannelSlot>,
    rx: Option<ChannelSlot>,
}

impl DeviceEntry {
    fn slot(&self, direction: Direction) -> Option<&ChannelSlot> {
        match direction {
            Direction::MemToDev => self.tx.as_ref(),
            Direction::DevToMem => self.rx.as_ref(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    devices: Vec<DeviceEntry>,
}

impl ChannelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Claim channel pairs until an ordinal yields nothing or
    /// `max_devices` pairs are held. A pair may lack one direction.
    pub fn probe<B: DmaBackend + ?Sized>(backend: &B, max_devices: usize) -> Self {
        let mut devices = Vec::new();

        loop {
            let ordinal = devices.len() as u32;
            if devices.len() >= max_devices {
                if Self::has_channel_at(backend, ordinal) {
                    kwarn!("xdma: probe: device cap of {} reached, ignoring the rest", max_devices);
                }
                break;
            }

            let tx = backend.request_channel(&ChannelMatch::new(Direction::MemToDev, ordinal));
            let rx = backend.request_channel(&ChannelMatch::new(Direction::DevToMem, ordinal));
            if tx.is_none() && rx.is_none() {
                break;
            }

            let id = DeviceId(ordinal);
            let pair = ChannelPair::new(id, tx.is_some(), rx.is_some());
            let slot = |hw: HwChannel, dir: Direction| ChannelSlot {
                hw,
                token: Arc::new(CompletionToken::new(ChannelId::new(id, dir).completion())),
            };

            kdebug!(
                "xdma: probe: {} tx={:?} rx={:?}",
                id,
                tx.map(|h| h.0),
                rx.map(|h| h.0)
            );

            devices.push(DeviceEntry {
                pair,
                tx: tx.map(|hw| slot(hw, Direction::MemToDev)),
                rx: rx.map(|hw| slot(hw, Direction::DevToMem)),
            });
        }

        kinfo!("xdma: probe: number of devices found: {}", devices.len());
        Self { devices }
    }

    /// Peek for any channel at `ordinal` without keeping it.
    fn has_channel_at<B: DmaBackend + ?Sized>(backend: &B, ordinal: u32) -> bool {
        Direction::ALL.iter().any(|&d| {
            match backend.request_channel(&ChannelMatch::new(d, ordinal)) {
                Some(hw) => {
                    backend.release_channel(hw);
                    true
                }
                None => false,
            }
        })
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.devices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, device: DeviceId) -> Result<ChannelPair> {
        self.devices
            .get(device.index())
            .map(|d| d.pair)
            .ok_or(XdmaError::UnknownDevice(device.0))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &ChannelPair> + '_ {
        self.devices.iter().map(|d| &d.pair)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.pairs()
            .flat_map(|p| [p.tx_chan, p.rx_chan])
            .flatten()
    }

    /// Resolve a channel handle to its hardware slot.
    pub fn slot(&self, channel: ChannelId) -> Result<&ChannelSlot> {
        self.devices
            .get(channel.device.index())
            .and_then(|d| d.slot(channel.direction))
            .ok_or(XdmaError::UnknownChannel(channel))
    }

    /// Resolve a channel and check that `completion` is its token.
    pub fn slot_with_token(
        &self,
        channel: ChannelId,
        completion: CompletionId,
    ) -> Result<&ChannelSlot> {
        let slot = self.slot(channel)?;
        if slot.token.id() != completion {
            return Err(XdmaError::TokenMismatch { channel, completion });
        }
        Ok(slot)
    }

    /// Release every claimed channel. Idempotent.
    pub fn release_all<B: DmaBackend + ?Sized>(&mut self, backend: &B) {
        for entry in self.devices.drain(..) {
            for slot in [entry.tx, entry.rx].into_iter().flatten() {
                backend.release_channel(slot.hw);
            }
            kdebug!("xdma: released {}", entry.pair.device_id);
        }
    }
}
