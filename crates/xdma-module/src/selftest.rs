//! Builtin loopback self-test
//!
//! Device 0 moves a buffer of 'Z' bytes from the tx half of the free
//! arena tail into a buffer of 'Y' bytes in the rx half. Both buffers end
//! in a newline. The rx side is started first without waiting, then tx
//! is started and awaited; the rx outcome is collected afterwards.
//!
//! The test writes over `[cursor, cursor + 2 * len)`, space no buffer has
//! been handed out from, and leaves the cursor where it was. It refuses
//! to run while descriptors are outstanding.

use crate::engine::TransferEngine;
use std::time::Instant;
use xdma_core::constants::BLOCK_SIZE;
use xdma_core::error::{Result, XdmaError};
use xdma_core::{
    kerror, kinfo, kwarn, BufferRequest, ChannelConfig, ChannelId, Cookie, DeviceId, DmaBackend,
    SelfTestReport, TransferRequest,
};

/// Bytes of the rx buffer shown before and after.
const PEEK: usize = 10;

pub(crate) fn run<B: DmaBackend>(engine: &TransferEngine<B>, requested: usize) -> Result<SelfTestReport> {
    let device = DeviceId(0);
    let pair = engine.registry().get(device)?;
    let rx = pair.rx_chan.ok_or(XdmaError::UnknownChannel(ChannelId::rx(device)))?;
    let tx = pair.tx_chan.ok_or(XdmaError::UnknownChannel(ChannelId::tx(device)))?;

    let outstanding = engine.outstanding();
    if outstanding > 0 {
        kerror!("xdma: self-test refused, {} descriptors outstanding", outstanding);
        return Err(XdmaError::ArenaBusy(outstanding));
    }

    let arena = engine.arena();
    let base = arena.cursor();
    let remaining = arena.capacity() - base;
    let len = requested.min(remaining / 2) / BLOCK_SIZE * BLOCK_SIZE;
    if len == 0 {
        return Err(XdmaError::CapacityExceeded { requested: BLOCK_SIZE * 2, remaining });
    }
    let (rx_at, tx_at) = (base, base + len);

    arena.fill(rx_at, len, b'Y')?;
    arena.write_at(rx_at + len - 1, b"\n")?;
    arena.fill(tx_at, len, b'Z')?;
    arena.write_at(tx_at + len - 1, b"\n")?;

    let peek = || -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; PEEK.min(len)];
        arena.read_at(rx_at, &mut bytes)?;
        Ok(bytes)
    };
    let rx_before = peek()?;

    let t0 = Instant::now();
    for channel in [rx, tx] {
        let config = ChannelConfig::new(channel.direction).coalesce(1).delay(0);
        engine.configure(Some(channel), config)?;
    }
    let rx_cookie = engine.prepare(&request(rx, rx_at, len))?;
    let tx_cookie = engine.prepare(&request(tx, tx_at, len))?;
    let prepare_time = t0.elapsed();

    let t1 = Instant::now();
    engine.start(&start(rx, rx_cookie, false))?;
    let tx_result = engine.start(&start(tx, tx_cookie, true))?;
    let transfer_time = t1.elapsed();
    let rx_result = engine.wait(rx, rx.completion(), rx_cookie)?;

    for (channel, result) in [(rx, rx_result), (tx, tx_result)] {
        if result.needs_recovery() {
            kwarn!("xdma: self-test: {} {}, stopping channel", channel, result);
            engine.stop(Some(channel))?;
        }
    }

    let report = SelfTestReport {
        bytes: len,
        prepare_time,
        transfer_time,
        rx: rx_result,
        tx: tx_result,
        rx_before,
        rx_after: peek()?,
    };
    kinfo!(
        "xdma: self-test: {} bytes, prepare {:?}, transfer {:?} ({} MB/s)",
        len,
        prepare_time,
        transfer_time,
        report.throughput_mbps().map_or_else(|| "-".to_string(), |v| v.to_string())
    );
    Ok(report)
}

fn request(channel: ChannelId, offset: usize, len: usize) -> BufferRequest {
    BufferRequest {
        channel,
        completion: channel.completion(),
        offset: offset as u32,
        size: len as u32,
        direction: channel.direction,
    }
}

fn start(channel: ChannelId, cookie: Cookie, wait: bool) -> TransferRequest {
    TransferRequest { channel, completion: channel.completion(), cookie, wait }
}
