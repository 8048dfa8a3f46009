//! Command/response control surface.
//!
//! The engine is driven through a synchronous command boundary modeled on
//! the driver's ioctl table. How a command reaches the engine (in-process
//! call, character device, RPC) is the `Controller` implementor's business.

use crate::channel::{ChannelId, ChannelPair, CompletionId, DeviceId, Direction};
use crate::config::ChannelConfig;
use crate::descriptor::{Cookie, TransferResult};
use crate::error::{Result, XdmaError};
use std::time::Duration;

/// Arguments of `PrepareBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRequest {
    pub channel: ChannelId,
    pub completion: CompletionId,
    /// Byte offset into the shared arena.
    pub offset: u32,
    /// Byte length.
    pub size: u32,
    pub direction: Direction,
}

/// Arguments of `StartTransfer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub channel: ChannelId,
    pub completion: CompletionId,
    pub cookie: Cookie,
    pub wait: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetDeviceCount,
    GetDeviceInfo(DeviceId),
    /// `None` channel: the direction is absent on this device (no-op).
    ConfigureChannel {
        channel: Option<ChannelId>,
        config: ChannelConfig,
    },
    PrepareBuffer(BufferRequest),
    StartTransfer(TransferRequest),
    /// `None` channel: no-op.
    StopTransfer(Option<ChannelId>),
    RunBuiltinTest,
}

impl Command {
    /// Name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetDeviceCount => "GET_NUM_DEVICES",
            Command::GetDeviceInfo(_) => "GET_DEV_INFO",
            Command::ConfigureChannel { .. } => "DEVICE_CONTROL",
            Command::PrepareBuffer(_) => "PREP_BUF",
            Command::StartTransfer(_) => "START_TRANSFER",
            Command::StopTransfer(_) => "STOP_TRANSFER",
            Command::RunBuiltinTest => "TEST_TRANSFER",
        }
    }
}

/// Result of the builtin loopback self-test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    /// Bytes moved in each direction.
    pub bytes: usize,
    /// Time spent configuring and preparing both channels.
    pub prepare_time: Duration,
    /// Time from the first start to the awaited completion.
    pub transfer_time: Duration,
    /// Outcome of the rx transfer, collected after tx finished.
    pub rx: TransferResult,
    /// Outcome of the awaited tx start.
    pub tx: TransferResult,
    /// First bytes of the rx buffer before the transfer.
    pub rx_before: Vec<u8>,
    /// First bytes of the rx buffer after the transfer.
    pub rx_after: Vec<u8>,
}

impl SelfTestReport {
    /// Throughput in MB/s (bytes per microsecond), `None` if too fast to time.
    pub fn throughput_mbps(&self) -> Option<u64> {
        let us = self.transfer_time.as_micros();
        if us == 0 {
            None
        } else {
            Some((self.bytes as u128 / us) as u64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    DeviceCount(u32),
    DeviceInfo(ChannelPair),
    Cookie(Cookie),
    Transfer(TransferResult),
    SelfTest(SelfTestReport),
    Done,
}

/// Anything that executes engine commands.
pub trait Controller {
    fn execute(&self, command: Command) -> Result<Response>;

    // ── Typed conveniences over `execute` ──

    fn device_count(&self) -> Result<u32> {
        match self.execute(Command::GetDeviceCount)? {
            Response::DeviceCount(n) => Ok(n),
            other => Err(unexpected("GET_NUM_DEVICES", &other)),
        }
    }

    fn device_info(&self, device: DeviceId) -> Result<ChannelPair> {
        match self.execute(Command::GetDeviceInfo(device))? {
            Response::DeviceInfo(pair) => Ok(pair),
            other => Err(unexpected("GET_DEV_INFO", &other)),
        }
    }

    fn configure(&self, channel: Option<ChannelId>, config: ChannelConfig) -> Result<()> {
        self.execute(Command::ConfigureChannel { channel, config }).map(|_| ())
    }

    fn prepare(&self, request: BufferRequest) -> Result<Cookie> {
        match self.execute(Command::PrepareBuffer(request))? {
            Response::Cookie(c) => Ok(c),
            other => Err(unexpected("PREP_BUF", &other)),
        }
    }

    fn start(&self, request: TransferRequest) -> Result<TransferResult> {
        match self.execute(Command::StartTransfer(request))? {
            Response::Transfer(r) => Ok(r),
            other => Err(unexpected("START_TRANSFER", &other)),
        }
    }

    fn stop(&self, channel: Option<ChannelId>) -> Result<()> {
        self.execute(Command::StopTransfer(channel)).map(|_| ())
    }

    fn self_test(&self) -> Result<SelfTestReport> {
        match self.execute(Command::RunBuiltinTest)? {
            Response::SelfTest(report) => Ok(report),
            other => Err(unexpected("TEST_TRANSFER", &other)),
        }
    }
}

fn unexpected(command: &'static str, response: &Response) -> XdmaError {
    crate::kerror!("xdma: {} answered with {:?}", command, response);
    XdmaError::Protocol(command)
}
