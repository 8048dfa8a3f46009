//! Arena and transfer-path microbenchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use xdma_core::kprint::{set_log_level, LogLevel};
use xdma_core::{BufferRequest, ChannelConfig, ChannelId, Controller, DeviceId, Direction, TransferRequest};
use xdma_module::{Arena, ArenaHost, DeviceConfig, SimBehavior, SimConfig, XdmaDevice};

fn bench_allocate(c: &mut Criterion) {
    let arena = Arena::new(32 << 20, false).unwrap();
    c.bench_function("arena_allocate_1025x4", |b| {
        b.iter(|| {
            if arena.remaining() < 8192 {
                arena.reset();
            }
            black_box(arena.allocate(black_box(1025), 4).unwrap())
        })
    });
}

fn bench_prepare_start(c: &mut Criterion) {
    set_log_level(LogLevel::Off);
    let dev = XdmaDevice::simulated(
        SimConfig::pairs(1).behavior(SimBehavior::Immediate),
        DeviceConfig::new()
            .arena_capacity(1 << 20)
            .lock_arena(false)
            .transfer_timeout(Duration::from_secs(1)),
    )
    .unwrap();
    let tx = ChannelId::tx(DeviceId(0));
    dev.configure(Some(tx), ChannelConfig::new(Direction::MemToDev)).unwrap();
    let buf = dev.arena().unwrap().allocate(4096, 1).unwrap();

    c.bench_function("prepare_start_wait_4k", |b| {
        b.iter(|| {
            let cookie = dev
                .prepare(BufferRequest {
                    channel: tx,
                    completion: tx.completion(),
                    offset: buf.offset(),
                    size: 4096,
                    direction: Direction::MemToDev,
                })
                .unwrap();
            black_box(
                dev.start(TransferRequest {
                    channel: tx,
                    completion: tx.completion(),
                    cookie,
                    wait: true,
                })
                .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_allocate, bench_prepare_start);
criterion_main!(benches);
