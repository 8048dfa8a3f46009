//! `SimulatedDma`: in-process AXI DMA model.
//!
//! Each probed ordinal is a tx/rx pair joined by a byte stream: a tx
//! descriptor copies arena memory into the stream, an rx descriptor
//! completes once the stream holds enough bytes and copies them out.
//! That is the loopback wiring of an AXI DMA with its stream ports tied
//! together, which is what the builtin self-test expects.
//!
//! A single worker thread plays the hardware. `issue_pending` kicks the
//! channel onto the worker's busy list through a lock-free queue; the
//! worker executes descriptors in submit order and fires completion
//! callbacks outside the channel lock, batched by the channel's
//! coalescing threshold.

use crossbeam_queue::ArrayQueue;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};
use xdma_core::descriptor::prep_flags;
use xdma_core::error::{Result, XdmaError};
use xdma_core::{
    kdebug, ChannelConfig, ChannelInfo, ChannelMatch, CompletionCallback, Cookie, Direction,
    DmaBackend, DmaStatus, HwChannel, PreparedTx,
};

const KICK_QUEUE_DEPTH: usize = 256;
const DEFAULT_QUEUE_DEPTH: usize = 64;
/// Failed cookies remembered behind the completion point.
const FAILED_HISTORY: i32 = 1024;

/// How the simulated hardware treats issued descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBehavior {
    /// tx feeds the pair's stream, rx drains it.
    Loopback,
    /// Every descriptor completes successfully as soon as it is reached.
    Immediate,
    /// Descriptors are accepted and never complete.
    Stall,
    /// Every descriptor completes with an error status.
    Fault,
    /// `tx_submit` refuses every descriptor.
    RejectSubmit,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    channels: Vec<ChannelInfo>,
    behavior: SimBehavior,
    latency: Duration,
    queue_depth: usize,
}

impl SimConfig {
    /// `n` complete tx/rx pairs at ordinals `0..n`.
    pub fn pairs(n: u32) -> Self {
        let channels = (0..n)
            .flat_map(|ordinal| {
                Direction::ALL.map(|direction| ChannelInfo { direction, ordinal })
            })
            .collect();
        Self::with_channels(channels)
    }

    /// An explicit channel list (for gaps and half pairs).
    pub fn with_channels(channels: Vec<ChannelInfo>) -> Self {
        Self {
            channels,
            behavior: SimBehavior::Loopback,
            latency: Duration::ZERO,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn behavior(mut self, behavior: SimBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Minimum time between issue and completion of each descriptor.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Descriptors a channel holds (prepared + queued + running).
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }
}

struct SimTx {
    id: u64,
    bus_addr: u64,
    len: usize,
    direction: Direction,
    interrupt: bool,
    cookie: Cookie,
    callback: Option<CompletionCallback>,
    issued_at: Option<Instant>,
}

struct SimChannel {
    info: ChannelInfo,
    claimed: bool,
    config: Option<ChannelConfig>,
    /// Built by prep, not yet submitted.
    prepared: Vec<SimTx>,
    /// Submitted, waiting for issue_pending.
    submitted: VecDeque<SimTx>,
    /// Issued, executing in order.
    active: VecDeque<SimTx>,
    next_cookie: i32,
    completed_cookie: i32,
    failed: BTreeSet<i32>,
    /// Callbacks held back by interrupt coalescing.
    irq_pending: Vec<CompletionCallback>,
}

impl SimChannel {
    fn new(info: ChannelInfo) -> Self {
        Self {
            info,
            claimed: false,
            config: None,
            prepared: Vec::new(),
            submitted: VecDeque::new(),
            active: VecDeque::new(),
            next_cookie: Cookie::MIN.0,
            completed_cookie: Cookie::UNSET.0,
            failed: BTreeSet::new(),
            irq_pending: Vec::new(),
        }
    }

    fn queued(&self) -> usize {
        self.prepared.len() + self.submitted.len() + self.active.len()
    }

    fn assign_cookie(&mut self) -> Cookie {
        let cookie = Cookie(self.next_cookie);
        self.next_cookie = if self.next_cookie == i32::MAX {
            Cookie::MIN.0
        } else {
            self.next_cookie + 1
        };
        cookie
    }

    /// Drop every descriptor without signaling. Submitted ones report
    /// `Error` from then on.
    fn abort_all(&mut self) {
        let aborted: Vec<i32> = self
            .submitted
            .iter()
            .chain(self.active.iter())
            .map(|tx| tx.cookie.0)
            .collect();
        self.failed.extend(aborted);
        self.prepared.clear();
        self.submitted.clear();
        self.active.clear();
        self.irq_pending.clear();
        self.prune_failed();
    }

    fn prune_failed(&mut self) {
        if self.failed.len() > FAILED_HISTORY as usize {
            let floor = self.completed_cookie.saturating_sub(FAILED_HISTORY);
            self.failed = self.failed.split_off(&floor);
        }
    }

    fn status(&self, cookie: Cookie) -> DmaStatus {
        if !cookie.is_valid() || self.failed.contains(&cookie.0) {
            DmaStatus::Error
        } else if cookie.0 <= self.completed_cookie {
            DmaStatus::Complete
        } else {
            DmaStatus::InProgress
        }
    }
}

struct SimInner {
    behavior: SimBehavior,
    latency: Duration,
    queue_depth: usize,
    channels: Vec<Mutex<SimChannel>>,
    /// Loopback stream per ordinal.
    streams: Vec<Mutex<VecDeque<u8>>>,
    /// issue_pending → worker.
    kicks: ArrayQueue<u32>,
    next_desc: AtomicU64,
    shutdown: AtomicBool,
    waker: OnceLock<Thread>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimInner {
    fn channel(&self, chan: HwChannel) -> Option<MutexGuard<'_, SimChannel>> {
        self.channels.get(chan.0 as usize).map(lock)
    }

    /// Abort everything on `ch` and drop the bytes its pair left in the
    /// loopback stream.
    fn abort(&self, ch: &mut SimChannel) {
        ch.abort_all();
        if let Some(stream) = self.streams.get(ch.info.ordinal as usize) {
            lock(stream).clear();
        }
    }

    fn kick(&self, chan: HwChannel) {
        while self.kicks.push(chan.0).is_err() {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            thread::yield_now();
        }
        if let Some(worker) = self.waker.get() {
            worker.unpark();
        }
    }

    /// Run the data movement of a loopback descriptor.
    ///
    /// `None` means the descriptor cannot make progress yet (rx waiting
    /// for stream data).
    fn move_data(&self, ordinal: u32, tx: &SimTx) -> Option<bool> {
        let mut stream = lock(&self.streams[ordinal as usize]);
        // Safety: bus addresses come from the arena, which outlives every
        // descriptor: the device releases its channels (terminating all
        // descriptors) before unmapping the region.
        match tx.direction {
            Direction::MemToDev => {
                let src = unsafe { std::slice::from_raw_parts(tx.bus_addr as usize as *const u8, tx.len) };
                stream.extend(src.iter().copied());
                Some(true)
            }
            Direction::DevToMem => {
                if stream.len() < tx.len {
                    return None;
                }
                let dst = unsafe { std::slice::from_raw_parts_mut(tx.bus_addr as usize as *mut u8, tx.len) };
                for (d, s) in dst.iter_mut().zip(stream.drain(..tx.len)) {
                    *d = s;
                }
                Some(true)
            }
        }
    }

    /// Advance the head descriptor of one channel.
    ///
    /// Returns (made progress, channel still has work).
    fn service(&self, idx: u32) -> (bool, bool) {
        let Some(mut ch) = self.channel(HwChannel(idx)) else {
            return (false, false);
        };
        let Some(head) = ch.active.front() else {
            return (false, false);
        };
        if head.issued_at.is_some_and(|t| t.elapsed() < self.latency) {
            return (false, true);
        }

        let ok = match self.behavior {
            SimBehavior::Stall => return (false, true),
            SimBehavior::Fault => false,
            SimBehavior::Immediate | SimBehavior::RejectSubmit => true,
            SimBehavior::Loopback => match self.move_data(ch.info.ordinal, head) {
                Some(ok) => ok,
                None => return (false, true),
            },
        };

        let Some(mut tx) = ch.active.pop_front() else {
            return (false, false);
        };
        ch.completed_cookie = tx.cookie.0;
        if !ok {
            ch.failed.insert(tx.cookie.0);
            ch.prune_failed();
        }
        if let Some(cb) = tx.callback.take() {
            ch.irq_pending.push(cb);
        }

        let threshold = ch.config.map_or(1, |c| c.coalesce.max(1)) as usize;
        let fire = if ch.irq_pending.len() >= threshold || ch.active.is_empty() {
            std::mem::take(&mut ch.irq_pending)
        } else {
            Vec::new()
        };
        let more = !ch.active.is_empty();
        drop(ch);

        for cb in fire {
            cb();
        }
        (true, more)
    }
}

/// Hardware thread main loop.
fn worker_loop(inner: Arc<SimInner>) {
    let _ = inner.waker.set(thread::current());
    let mut busy: Vec<u32> = Vec::new();

    loop {
        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }

        while let Some(ch) = inner.kicks.pop() {
            if !busy.contains(&ch) {
                busy.push(ch);
            }
        }

        let mut progressed = false;
        busy.retain(|&ch| {
            let (did, more) = inner.service(ch);
            progressed |= did;
            more
        });

        if !progressed {
            thread::park_timeout(Duration::from_millis(1));
        }
    }
}

pub struct SimulatedDma {
    inner: Arc<SimInner>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SimulatedDma {
    pub fn new(config: SimConfig) -> Result<Self> {
        let ordinals = config
            .channels
            .iter()
            .map(|c| c.ordinal as usize + 1)
            .max()
            .unwrap_or(0);

        let inner = Arc::new(SimInner {
            behavior: config.behavior,
            latency: config.latency,
            queue_depth: config.queue_depth,
            channels: config.channels.into_iter().map(|i| Mutex::new(SimChannel::new(i))).collect(),
            streams: (0..ordinals).map(|_| Mutex::new(VecDeque::new())).collect(),
            kicks: ArrayQueue::new(KICK_QUEUE_DEPTH),
            next_desc: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
            waker: OnceLock::new(),
        });

        let worker = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("xdma-sim".into())
                .spawn(move || worker_loop(inner))
                .map_err(|e| XdmaError::Os(e.raw_os_error().unwrap_or(libc::EAGAIN)))?
        };

        kdebug!(
            "xdma-sim: {} channels, {:?}, latency {:?}",
            inner.channels.len(),
            inner.behavior,
            inner.latency
        );
        Ok(Self { inner, worker: Some(worker) })
    }

    pub fn behavior(&self) -> SimBehavior {
        self.inner.behavior
    }

    /// Bytes sitting in the loopback stream of `ordinal`.
    pub fn stream_len(&self, ordinal: u32) -> usize {
        self.inner.streams.get(ordinal as usize).map_or(0, |s| lock(s).len())
    }

    /// Descriptors held by a channel (prepared + queued + running).
    pub fn queued(&self, chan: HwChannel) -> usize {
        self.inner.channel(chan).map_or(0, |c| c.queued())
    }

    /// Current slave configuration of a channel.
    pub fn config_of(&self, chan: HwChannel) -> Option<ChannelConfig> {
        self.inner.channel(chan).and_then(|c| c.config)
    }

    pub fn claimed(&self) -> usize {
        self.inner.channels.iter().filter(|&c| lock(c).claimed).count()
    }
}

impl Drop for SimulatedDma {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

impl DmaBackend for SimulatedDma {
    fn request_channel(&self, matcher: &ChannelMatch) -> Option<HwChannel> {
        self.inner.channels.iter().enumerate().find_map(|(i, c)| {
            let mut ch = lock(c);
            if !ch.claimed && matcher.matches(&ch.info) {
                ch.claimed = true;
                Some(HwChannel(i as u32))
            } else {
                None
            }
        })
    }

    fn release_channel(&self, chan: HwChannel) {
        if let Some(mut ch) = self.inner.channel(chan) {
            self.inner.abort(&mut ch);
            ch.claimed = false;
            ch.config = None;
        }
    }

    fn slave_config(&self, chan: HwChannel, config: &ChannelConfig) -> Result<()> {
        let mut ch = self
            .inner
            .channel(chan)
            .ok_or(XdmaError::InvalidConfig("no such hardware channel"))?;
        if !ch.claimed {
            return Err(XdmaError::InvalidConfig("channel not claimed"));
        }
        if config.direction != ch.info.direction {
            return Err(XdmaError::InvalidConfig("direction does not match channel"));
        }
        if config.reset {
            self.inner.abort(&mut ch);
        }
        ch.config = Some(*config);
        Ok(())
    }

    fn prep_slave_single(
        &self,
        chan: HwChannel,
        bus_addr: u64,
        len: usize,
        direction: Direction,
        flags: u32,
    ) -> Option<PreparedTx> {
        let mut ch = self.inner.channel(chan)?;
        if !ch.claimed
            || ch.config.is_none()
            || direction != ch.info.direction
            || len == 0
            || ch.queued() >= self.inner.queue_depth
        {
            return None;
        }

        let id = self.inner.next_desc.fetch_add(1, Ordering::Relaxed);
        ch.prepared.push(SimTx {
            id,
            bus_addr,
            len,
            direction,
            interrupt: flags & prep_flags::PREP_INTERRUPT != 0,
            cookie: Cookie::UNSET,
            callback: None,
            issued_at: None,
        });
        Some(PreparedTx { chan, id })
    }

    fn tx_submit(&self, tx: PreparedTx, callback: CompletionCallback) -> Cookie {
        let Some(mut ch) = self.inner.channel(tx.chan) else {
            return Cookie(-libc::ENODEV);
        };
        let Some(pos) = ch.prepared.iter().position(|p| p.id == tx.id) else {
            return Cookie(-libc::EINVAL);
        };
        let mut desc = ch.prepared.swap_remove(pos);
        if self.inner.behavior == SimBehavior::RejectSubmit {
            return Cookie(-libc::EBUSY);
        }

        desc.cookie = ch.assign_cookie();
        if desc.interrupt {
            desc.callback = Some(callback);
        }
        let cookie = desc.cookie;
        ch.submitted.push_back(desc);
        cookie
    }

    fn issue_pending(&self, chan: HwChannel) {
        {
            let Some(mut ch) = self.inner.channel(chan) else {
                return;
            };
            if !ch.claimed {
                return;
            }
            let now = Instant::now();
            while let Some(mut tx) = ch.submitted.pop_front() {
                tx.issued_at = Some(now);
                ch.active.push_back(tx);
            }
            if ch.active.is_empty() {
                return;
            }
        }
        self.inner.kick(chan);
    }

    fn tx_status(&self, chan: HwChannel, cookie: Cookie) -> DmaStatus {
        self.inner
            .channel(chan)
            .map_or(DmaStatus::Error, |ch| ch.status(cookie))
    }

    fn terminate_all(&self, chan: HwChannel) -> Result<()> {
        let mut ch = self.inner.channel(chan).ok_or(XdmaError::Os(libc::ENODEV))?;
        self.inner.abort(&mut ch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn claim(dma: &SimulatedDma, direction: Direction, ordinal: u32) -> HwChannel {
        let hw = dma.request_channel(&ChannelMatch::new(direction, ordinal)).unwrap();
        dma.slave_config(hw, &ChannelConfig::new(direction)).unwrap();
        hw
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> CompletionCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let make = move || -> CompletionCallback {
            let h = Arc::clone(&h);
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
        };
        (hits, make)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_claim_once() {
        let dma = SimulatedDma::new(SimConfig::pairs(1)).unwrap();
        let m = ChannelMatch::new(Direction::MemToDev, 0);
        assert!(dma.request_channel(&m).is_some());
        assert!(dma.request_channel(&m).is_none());
        assert_eq!(dma.claimed(), 1);
    }

    #[test]
    fn test_unconfigured_channel_refuses_prep() {
        let dma = SimulatedDma::new(SimConfig::pairs(1)).unwrap();
        let hw = dma.request_channel(&ChannelMatch::new(Direction::MemToDev, 0)).unwrap();
        assert!(dma.prep_slave_single(hw, 0, 64, Direction::MemToDev, prep_flags::SINGLE_SHOT).is_none());
        assert!(dma
            .slave_config(hw, &ChannelConfig::new(Direction::DevToMem))
            .is_err());
    }

    #[test]
    fn test_immediate_completion_in_order() {
        let dma = SimulatedDma::new(SimConfig::pairs(1).behavior(SimBehavior::Immediate)).unwrap();
        let hw = claim(&dma, Direction::MemToDev, 0);
        let (hits, cb) = counter();

        let c1 = dma.tx_submit(dma.prep_slave_single(hw, 0, 64, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap(), cb());
        let c2 = dma.tx_submit(dma.prep_slave_single(hw, 64, 64, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap(), cb());
        assert_eq!(c1, Cookie(1));
        assert_eq!(c2, Cookie(2));
        assert_eq!(dma.tx_status(hw, c2), DmaStatus::InProgress);

        dma.issue_pending(hw);
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 2));
        assert_eq!(dma.tx_status(hw, c1), DmaStatus::Complete);
        assert_eq!(dma.tx_status(hw, c2), DmaStatus::Complete);
    }

    #[test]
    fn test_nothing_moves_before_issue() {
        let dma = SimulatedDma::new(SimConfig::pairs(1).behavior(SimBehavior::Immediate)).unwrap();
        let hw = claim(&dma, Direction::DevToMem, 0);
        let (hits, cb) = counter();
        let c = dma.tx_submit(dma.prep_slave_single(hw, 0, 64, Direction::DevToMem, prep_flags::SINGLE_SHOT).unwrap(), cb());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(dma.tx_status(hw, c), DmaStatus::InProgress);
    }

    #[test]
    fn test_fault_reports_error() {
        let dma = SimulatedDma::new(SimConfig::pairs(1).behavior(SimBehavior::Fault)).unwrap();
        let hw = claim(&dma, Direction::MemToDev, 0);
        let (hits, cb) = counter();
        let c = dma.tx_submit(dma.prep_slave_single(hw, 0, 64, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap(), cb());
        dma.issue_pending(hw);
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 1));
        assert_eq!(dma.tx_status(hw, c), DmaStatus::Error);
    }

    #[test]
    fn test_reject_submit() {
        let dma = SimulatedDma::new(SimConfig::pairs(1).behavior(SimBehavior::RejectSubmit)).unwrap();
        let hw = claim(&dma, Direction::MemToDev, 0);
        let (_hits, cb) = counter();
        let c = dma.tx_submit(dma.prep_slave_single(hw, 0, 64, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap(), cb());
        assert!(c.is_error());
        assert_eq!(dma.queued(hw), 0);
    }

    #[test]
    fn test_queue_depth() {
        let dma = SimulatedDma::new(SimConfig::pairs(1).queue_depth(1)).unwrap();
        let hw = claim(&dma, Direction::MemToDev, 0);
        assert!(dma.prep_slave_single(hw, 0, 64, Direction::MemToDev, 0).is_some());
        assert!(dma.prep_slave_single(hw, 64, 64, Direction::MemToDev, 0).is_none());
    }

    #[test]
    fn test_coalesced_interrupts() {
        let dma = SimulatedDma::new(
            SimConfig::pairs(1)
                .behavior(SimBehavior::Immediate)
                .latency(Duration::from_millis(5)),
        )
        .unwrap();
        let hw = dma.request_channel(&ChannelMatch::new(Direction::MemToDev, 0)).unwrap();
        dma.slave_config(hw, &ChannelConfig::new(Direction::MemToDev).coalesce(3)).unwrap();
        let (hits, cb) = counter();

        for i in 0..3 {
            let tx = dma.prep_slave_single(hw, i * 64, 64, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap();
            dma.tx_submit(tx, cb());
        }
        dma.issue_pending(hw);
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 3));
        assert_eq!(dma.tx_status(hw, Cookie(3)), DmaStatus::Complete);
    }

    #[test]
    fn test_stall_and_terminate() {
        let dma = SimulatedDma::new(SimConfig::pairs(1).behavior(SimBehavior::Stall)).unwrap();
        let hw = claim(&dma, Direction::DevToMem, 0);
        let (hits, cb) = counter();
        let c = dma.tx_submit(dma.prep_slave_single(hw, 0, 64, Direction::DevToMem, prep_flags::SINGLE_SHOT).unwrap(), cb());
        dma.issue_pending(hw);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(dma.tx_status(hw, c), DmaStatus::InProgress);

        dma.terminate_all(hw).unwrap();
        assert_eq!(dma.queued(hw), 0);
        assert_eq!(dma.tx_status(hw, c), DmaStatus::Error);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_flag_discards_queue() {
        let dma = SimulatedDma::new(SimConfig::pairs(1)).unwrap();
        let hw = claim(&dma, Direction::MemToDev, 0);
        dma.prep_slave_single(hw, 0, 64, Direction::MemToDev, 0).unwrap();
        assert_eq!(dma.queued(hw), 1);

        dma.slave_config(hw, &ChannelConfig::new(Direction::MemToDev).reset(true)).unwrap();
        assert_eq!(dma.queued(hw), 0);
        assert_eq!(dma.config_of(hw).map(|c| c.reset), Some(true));
    }

    #[test]
    fn test_loopback_moves_bytes() {
        let dma = SimulatedDma::new(SimConfig::pairs(1)).unwrap();
        let tx = claim(&dma, Direction::MemToDev, 0);
        let rx = claim(&dma, Direction::DevToMem, 0);

        let src = vec![0xABu8; 128];
        let mut dst = vec![0u8; 128];
        let (hits, cb) = counter();

        let rc = dma.tx_submit(
            dma.prep_slave_single(rx, dst.as_mut_ptr() as u64, 128, Direction::DevToMem, prep_flags::SINGLE_SHOT).unwrap(),
            cb(),
        );
        dma.issue_pending(rx);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(dma.tx_status(rx, rc), DmaStatus::InProgress);

        let tc = dma.tx_submit(
            dma.prep_slave_single(tx, src.as_ptr() as u64, 128, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap(),
            cb(),
        );
        dma.issue_pending(tx);

        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 2));
        assert_eq!(dma.tx_status(tx, tc), DmaStatus::Complete);
        assert_eq!(dma.tx_status(rx, rc), DmaStatus::Complete);
        assert_eq!(dst, src);
        assert_eq!(dma.stream_len(0), 0);
    }

    #[test]
    fn test_terminate_drops_undrained_stream() {
        let dma = SimulatedDma::new(SimConfig::pairs(1)).unwrap();
        let tx = claim(&dma, Direction::MemToDev, 0);
        let rx = claim(&dma, Direction::DevToMem, 0);
        let src = vec![0x11u8; 128];
        let (hits, cb) = counter();

        let tc = dma.tx_submit(
            dma.prep_slave_single(tx, src.as_ptr() as u64, 128, Direction::MemToDev, prep_flags::SINGLE_SHOT).unwrap(),
            cb(),
        );
        dma.issue_pending(tx);
        assert!(wait_for(|| hits.load(Ordering::SeqCst) == 1));
        assert_eq!(dma.tx_status(tx, tc), DmaStatus::Complete);
        assert_eq!(dma.stream_len(0), 128);

        dma.terminate_all(tx).unwrap();
        assert_eq!(dma.stream_len(0), 0);

        // A later rx must not see the stopped transfer's bytes.
        let mut dst = vec![0u8; 64];
        let rc = dma.tx_submit(
            dma.prep_slave_single(rx, dst.as_mut_ptr() as u64, 64, Direction::DevToMem, prep_flags::SINGLE_SHOT).unwrap(),
            cb(),
        );
        dma.issue_pending(rx);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(dma.tx_status(rx, rc), DmaStatus::InProgress);
        dma.terminate_all(rx).unwrap();
        assert!(dst.iter().all(|&b| b == 0));
    }
}
