//! XDMA End-to-End Smoke Test
//!
//! Exercises the whole stack against the simulated AXI DMA:
//!   Part A: Arena: allocation rounding, capacity, offsets, generations
//!   Part B: Discovery: zero, N, capped and partial channel pairs
//!   Part C: Command surface: every command through `Controller`
//!   Part D: Transfers: completion, timeout, fault, stop recovery,
//!           client transactions and the builtin self-test
//!
//! Run: ./target/release/xdma-smoke
//! (`XDMA_LOG_LEVEL=debug` shows the engine's own log lines)

use std::time::Duration;

use xdma_core::{
    calc_size, constants::BLOCK_SIZE, BufferRequest, ChannelConfig, ChannelId, ChannelInfo,
    Command, Controller, Cookie, DeviceId, Direction, DmaStatus, Response, TransferRequest,
    TransferResult, XdmaError,
};
use xdma_module::{Arena, ArenaHost, DeviceConfig, SimBehavior, SimConfig, XdmaDevice};
use xdma::{WaitMode, Xdma};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok { self.pass(name); } else { self.fail(name, reason); }
    }

    /// Record an `Err` as a failure and hand back the value otherwise.
    fn ok<T>(&mut self, name: &str, r: xdma_core::Result<T>) -> Option<T> {
        match r {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(name, &e.to_string());
                None
            }
        }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

/// Small, unpinned device config with a short timeout.
fn small_config(arena: usize) -> DeviceConfig {
    DeviceConfig::new()
        .arena_capacity(arena)
        .lock_arena(false)
        .transfer_timeout(Duration::from_millis(100))
        .selftest_len(4096)
}

fn request(channel: ChannelId, offset: u32, size: u32) -> BufferRequest {
    BufferRequest {
        channel,
        completion: channel.completion(),
        offset,
        size,
        direction: channel.direction,
    }
}

fn start(channel: ChannelId, cookie: Cookie, wait: bool) -> TransferRequest {
    TransferRequest { channel, completion: channel.completion(), cookie, wait }
}

// ════════════════════════════════════════════════════════════
// Part A: Arena
// ════════════════════════════════════════════════════════════

fn test_arena(t: &mut TestRunner) {
    t.section("Part A: Arena");

    t.check(
        "calc_size(1025, 4) == 4160",
        calc_size(1025, 4) == Some(4160),
        "wrong rounding",
    );
    t.check("calc_size(0, 4) == 0", calc_size(0, 4) == Some(0), "zero not zero");

    let arena = match t.ok("map 12 KiB arena", Arena::new(3 * 4096, false)) {
        Some(a) => a,
        None => return,
    };
    t.pass("map 12 KiB arena");

    if let Some(a) = t.ok("allocate 1025 x u32", arena.allocate(1025, 4)) {
        t.check("first buffer at offset 0", a.offset() == 0, &format!("offset {}", a.offset()));
        t.check("size rounded to 4160", a.size() == 4160, &format!("size {}", a.size()));
    }
    if let Some(b) = t.ok("allocate second 1025 x u32", arena.allocate(1025, 4)) {
        t.check(
            "second buffer at offset 4160",
            b.offset() == 4160,
            &format!("offset {}", b.offset()),
        );
        t.check(
            "offset_of(ptr) matches",
            arena.offset_of(b.as_ptr()).ok() == Some(4160),
            "offset_of disagrees",
        );
    }
    t.check("cursor at 8320", arena.cursor() == 8320, &format!("cursor {}", arena.cursor()));

    let over = arena.allocate(4096, 1);
    t.check(
        "over-capacity allocation refused",
        matches!(over, Err(XdmaError::CapacityExceeded { .. })),
        &format!("{:?}", over.map(|b| b.offset())),
    );
    t.check("cursor unchanged after refusal", arena.cursor() == 8320, "cursor moved");

    let probe = [0u8; 1];
    t.check(
        "foreign pointer refused",
        matches!(arena.offset_of(probe.as_ptr()), Err(XdmaError::OutOfArena)),
        "accepted stack pointer",
    );

    let stale = arena.allocate(1, BLOCK_SIZE);
    arena.reset();
    t.check("reset rewinds cursor", arena.cursor() == 0, "cursor not zero");
    match stale {
        Ok(buf) => t.check(
            "pre-reset buffer is stale",
            matches!(arena.check(&buf), Err(XdmaError::StaleBuffer { .. })),
            "check passed",
        ),
        Err(e) => t.fail("pre-reset buffer is stale", &e.to_string()),
    }
}

// ════════════════════════════════════════════════════════════
// Part B: Discovery
// ════════════════════════════════════════════════════════════

fn count_with(sim: SimConfig, max_devices: usize) -> xdma_core::Result<u32> {
    let backend = xdma_module::SimulatedDma::new(sim)?;
    let mut dev = XdmaDevice::new(backend, small_config(4096).max_devices(max_devices));
    match dev.init() {
        Ok(()) | Err(XdmaError::NoDevicesFound) => dev.device_count(),
        Err(e) => Err(e),
    }
}

fn test_discovery(t: &mut TestRunner) {
    t.section("Part B: Discovery");

    let zero = count_with(SimConfig::pairs(0), 4);
    t.check("zero pairs -> count 0", zero == Ok(0), &format!("{:?}", zero));

    let init = XdmaDevice::simulated(SimConfig::pairs(0), small_config(4096));
    t.check(
        "zero pairs -> NoDevicesFound",
        matches!(init, Err(XdmaError::NoDevicesFound)),
        "init succeeded",
    );

    let three = count_with(SimConfig::pairs(3), 4);
    t.check("three pairs -> count 3", three == Ok(3), &format!("{:?}", three));

    let capped = count_with(SimConfig::pairs(6), 4);
    t.check("six pairs, cap 4 -> count 4", capped == Ok(4), &format!("{:?}", capped));

    let half = SimConfig::with_channels(vec![
        ChannelInfo { direction: Direction::MemToDev, ordinal: 0 },
        ChannelInfo { direction: Direction::DevToMem, ordinal: 0 },
        ChannelInfo { direction: Direction::MemToDev, ordinal: 1 },
    ]);
    let dev = match t.ok("tx-only second pair", XdmaDevice::simulated(half, small_config(4096))) {
        Some(d) => d,
        None => return,
    };
    match dev.device_info(DeviceId(1)) {
        Ok(pair) => t.check(
            "dev1 has tx, no rx",
            pair.tx_chan.is_some() && pair.rx_chan.is_none() && pair.rx_cmp.is_none(),
            &format!("{:?}", pair),
        ),
        Err(e) => t.fail("dev1 has tx, no rx", &e.to_string()),
    }
    t.check(
        "configure absent rx is a no-op",
        dev.configure(None, ChannelConfig::new(Direction::DevToMem)).is_ok(),
        "error on absent channel",
    );
    t.check("stop absent rx is a no-op", dev.stop(None).is_ok(), "error on absent channel");
}

// ════════════════════════════════════════════════════════════
// Part C: Command surface
// ════════════════════════════════════════════════════════════

fn test_commands(t: &mut TestRunner) {
    t.section("Part C: Command surface");

    let dev = match t.ok("init one pair", XdmaDevice::simulated(SimConfig::pairs(1), small_config(8192))) {
        Some(d) => d,
        None => return,
    };
    let tx = ChannelId::tx(DeviceId(0));
    let rx = ChannelId::rx(DeviceId(0));

    t.check(
        "GET_NUM_DEVICES",
        dev.execute(Command::GetDeviceCount) == Ok(Response::DeviceCount(1)),
        "wrong count",
    );
    t.check(
        "GET_DEV_INFO dev0",
        matches!(dev.execute(Command::GetDeviceInfo(DeviceId(0))), Ok(Response::DeviceInfo(p)) if p.tx_chan == Some(tx)),
        "wrong pair",
    );
    t.check(
        "GET_DEV_INFO dev1 -> UnknownDevice",
        dev.execute(Command::GetDeviceInfo(DeviceId(1))) == Err(XdmaError::UnknownDevice(1)),
        "accepted",
    );

    let cfg = ChannelConfig::new(Direction::MemToDev).coalesce(300);
    t.check(
        "DEVICE_CONTROL coalesce 300 refused",
        matches!(dev.configure(Some(tx), cfg), Err(XdmaError::InvalidConfig(_))),
        "accepted",
    );
    t.check(
        "DEVICE_CONTROL wrong direction refused",
        matches!(
            dev.configure(Some(tx), ChannelConfig::new(Direction::DevToMem)),
            Err(XdmaError::InvalidConfig(_))
        ),
        "accepted",
    );

    let unconfigured = dev.prepare(request(tx, 0, 64));
    t.check(
        "PREP_BUF before configure -> NotConfigured",
        matches!(unconfigured, Err(XdmaError::NotConfigured { .. })),
        &format!("{:?}", unconfigured),
    );

    for ch in [tx, rx] {
        if let Err(e) = dev.configure(Some(ch), ChannelConfig::new(ch.direction)) {
            t.fail("DEVICE_CONTROL tx/rx", &e.to_string());
            return;
        }
    }
    t.pass("DEVICE_CONTROL tx/rx");

    let bad_token = BufferRequest { completion: rx.completion(), ..request(tx, 0, 64) };
    t.check(
        "PREP_BUF foreign token -> TokenMismatch",
        matches!(dev.prepare(bad_token), Err(XdmaError::TokenMismatch { .. })),
        "accepted",
    );
    t.check(
        "PREP_BUF past arena end -> OutOfBounds",
        matches!(dev.prepare(request(tx, 8128, 128)), Err(XdmaError::OutOfBounds { .. })),
        "accepted",
    );

    let cookie = match t.ok("PREP_BUF tx 64 bytes", dev.prepare(request(tx, 0, 64))) {
        Some(c) => c,
        None => return,
    };
    t.check("cookie is valid", cookie.is_valid(), &cookie.to_string());
    t.check(
        "arena reset refused while prepared",
        matches!(dev.reset_arena(), Err(XdmaError::ArenaBusy(_))),
        "reset allowed",
    );

    t.check(
        "START_TRANSFER unknown cookie refused",
        matches!(dev.start(start(tx, Cookie(cookie.0 + 100), false)), Err(XdmaError::UnknownCookie { .. })),
        "accepted",
    );
    t.check(
        "START_TRANSFER no wait -> Started",
        dev.start(start(tx, cookie, false)) == Ok(TransferResult::Started),
        "not started",
    );
    t.check("STOP_TRANSFER tx", dev.stop(Some(tx)).is_ok(), "stop failed");
    t.check("arena reset after stop", dev.reset_arena().is_ok(), "still busy");

    match dev.execute(Command::RunBuiltinTest) {
        Ok(Response::SelfTest(r)) => t.check(
            "TEST_TRANSFER completes",
            r.tx == TransferResult::Completed && r.rx == TransferResult::Completed,
            &format!("tx {}, rx {}", r.tx, r.rx),
        ),
        other => t.fail("TEST_TRANSFER completes", &format!("{:?}", other.map(|_| ()))),
    }
}

// ════════════════════════════════════════════════════════════
// Part D: Transfers
// ════════════════════════════════════════════════════════════

fn one_shot(behavior: SimBehavior) -> xdma_core::Result<TransferResult> {
    let dev = XdmaDevice::simulated(SimConfig::pairs(1).behavior(behavior), small_config(4096))?;
    let tx = ChannelId::tx(DeviceId(0));
    dev.configure(Some(tx), ChannelConfig::new(Direction::MemToDev))?;
    let cookie = dev.prepare(request(tx, 0, 256))?;
    let result = dev.start(start(tx, cookie, true))?;
    if result.needs_recovery() {
        dev.stop(Some(tx))?;
    }
    Ok(result)
}

fn test_transfers(t: &mut TestRunner) {
    t.section("Part D: Transfers");

    let r = one_shot(SimBehavior::Immediate);
    t.check("immediate -> Completed", r == Ok(TransferResult::Completed), &format!("{:?}", r));

    let r = one_shot(SimBehavior::Stall);
    t.check("stall -> TimedOut", r == Ok(TransferResult::TimedOut), &format!("{:?}", r));

    let r = one_shot(SimBehavior::Fault);
    t.check(
        "fault -> CompletedWithError(Error)",
        r == Ok(TransferResult::CompletedWithError(DmaStatus::Error)),
        &format!("{:?}", r),
    );

    let r = one_shot(SimBehavior::RejectSubmit);
    t.check(
        "rejected submit -> SubmitRejected",
        matches!(r, Err(XdmaError::SubmitRejected { .. })),
        &format!("{:?}", r),
    );

    // Client transaction: 1025 words of 'B' looped into a buffer of 'A'.
    let xdma = match t.ok(
        "client init",
        Xdma::open_simulated(SimConfig::pairs(1), small_config(3 * 4096)),
    ) {
        Some(x) => x,
        None => return,
    };
    let bufs = xdma.alloc(1025, 4).and_then(|dst| Ok((dst, xdma.alloc(1025, 4)?)));
    let (dst, src) = match t.ok("alloc dst + src", bufs) {
        Some(b) => b,
        None => return,
    };
    t.check("dst at 0, src at 4160", dst.offset() == 0 && src.offset() == 4160, "bad layout");

    let filled = xdma.arena().and_then(|a| {
        a.fill(src.offset() as usize, src.requested_len(), b'B')?;
        a.fill(dst.offset() as usize, dst.requested_len(), b'A')
    });
    if t.ok("fill buffers", filled).is_none() {
        return;
    }

    match xdma.perform_transaction(DeviceId(0), WaitMode::Dst, Some(&src), Some(&dst)) {
        Ok(o) => t.check(
            "transaction: src Started, dst Completed",
            o.src == Some(TransferResult::Started) && o.dst == Some(TransferResult::Completed),
            &format!("{:?}", o),
        ),
        Err(e) => t.fail("transaction: src Started, dst Completed", &e.to_string()),
    }

    let mut head = [0u8; 40];
    let read = xdma.arena().and_then(|a| a.read_at(dst.offset() as usize, &mut head));
    t.check(
        "dst now holds src bytes",
        read.is_ok() && head.iter().all(|&b| b == b'B'),
        &String::from_utf8_lossy(&head),
    );

    t.check("alloc_reset after transaction", xdma.alloc_reset().is_ok(), "busy");
    t.check(
        "old buffer refused after reset",
        matches!(
            xdma.perform_transaction(DeviceId(0), WaitMode::Both, Some(&src), None),
            Err(XdmaError::StaleBuffer { .. })
        ),
        "accepted",
    );

    match xdma.self_test() {
        Ok(r) => {
            t.check(
                "self-test rx now holds 'Z'",
                !r.rx_after.is_empty() && r.rx_after.iter().all(|&b| b == b'Z'),
                &String::from_utf8_lossy(&r.rx_after),
            );
            println!(
                "       {} bytes, prepare {:?}, transfer {:?}",
                r.bytes, r.prepare_time, r.transfer_time
            );
        }
        Err(e) => t.fail("self-test rx now holds 'Z'", &e.to_string()),
    }

    let _ = xdma.exit();
}

fn main() {
    println!("=== XDMA End-to-End Smoke Test ===");
    println!("    block size: {} bytes", BLOCK_SIZE);

    let mut t = TestRunner::new();

    test_arena(&mut t);
    test_discovery(&mut t);
    test_commands(&mut t);
    test_transfers(&mut t);

    t.summary();
    std::process::exit(if t.failed > 0 { 1 } else { 0 });
}
