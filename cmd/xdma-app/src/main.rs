//! XDMA demo
//!
//! Fills a 1025-word source buffer with 'B' and a destination buffer
//! with 'A' (each ending in a newline), runs one transaction on device 0
//! and prints the head of the destination before and after.
//!
//! Usage: xdma-app [none|src|dst|both] [--selftest]
//!
//! Hardware is the in-process simulator; `XDMA_SIM_PAIRS` sets how many
//! channel pairs it exposes (default 1). The `XDMA_*` variables read by
//! `DeviceConfig::from_env` apply as well.

use xdma::module::{DeviceConfig, SimConfig};
use xdma::{env_get, kprint, ArenaBuf, DeviceId, Result, WaitMode, Xdma};

const LENGTH: usize = 1025;
const WORD: usize = std::mem::size_of::<u32>();

fn parse_wait(arg: Option<&str>) -> WaitMode {
    match arg {
        Some("none") => WaitMode::None,
        Some("src") => WaitMode::Src,
        Some("both") => WaitMode::Both,
        _ => WaitMode::Dst,
    }
}

fn fill_words(xdma: &Xdma, buf: &ArenaBuf, value: u32) -> Result<()> {
    let arena = xdma.arena()?;
    let base = buf.offset() as usize;
    for i in 0..LENGTH {
        let v = if i == LENGTH - 1 { b'\n' as u32 } else { value };
        arena.write_at(base + i * WORD, &v.to_ne_bytes())?;
    }
    Ok(())
}

fn print_head(xdma: &Xdma, buf: &ArenaBuf) -> Result<()> {
    let mut bytes = [0u8; 10 * WORD];
    xdma.arena()?.read_at(buf.offset() as usize, &mut bytes)?;
    let line: Vec<String> = bytes
        .chunks_exact(WORD)
        .map(|w| {
            let v = u32::from_ne_bytes([w[0], w[1], w[2], w[3]]);
            char::from_u32(v).unwrap_or('?').to_string()
        })
        .collect();
    println!("{}", line.join("\t"));
    Ok(())
}

fn run(wait: WaitMode, selftest: bool) -> Result<()> {
    let pairs: u32 = env_get("XDMA_SIM_PAIRS", 1);
    let xdma = Xdma::open_simulated(SimConfig::pairs(pairs), DeviceConfig::from_env())?;

    if selftest {
        let report = xdma.self_test()?;
        println!(
            "self-test: {} bytes, tx {}, rx {}, prepare {:?}, transfer {:?}, {} MB/s",
            report.bytes,
            report.tx,
            report.rx,
            report.prepare_time,
            report.transfer_time,
            report.throughput_mbps().map_or_else(|| "-".to_string(), |v| v.to_string())
        );
        println!("rx before: {}", String::from_utf8_lossy(&report.rx_before));
        println!("rx after:  {}", String::from_utf8_lossy(&report.rx_after));
        xdma.alloc_reset()?;
    }

    let dst = xdma.alloc(LENGTH, WORD)?;
    let src = xdma.alloc(LENGTH, WORD)?;
    println!("src offset {}", src.offset());
    println!("dst offset {}", dst.offset());

    fill_words(&xdma, &src, b'B' as u32)?;
    fill_words(&xdma, &dst, b'A' as u32)?;

    println!("test: dst buffer before transmit:");
    print_head(&xdma, &dst)?;

    let outcome = xdma.perform_transaction(DeviceId(0), wait, Some(&src), Some(&dst))?;
    println!(
        "transaction ({:?}): src {}, dst {}",
        wait,
        outcome.src.map_or_else(|| "-".to_string(), |r| r.to_string()),
        outcome.dst.map_or_else(|| "-".to_string(), |r| r.to_string())
    );
    if outcome.needs_recovery() {
        xdma.stop_transaction(DeviceId(0), Some(&src), Some(&dst))?;
    }

    println!("test: dst buffer after transmit:");
    print_head(&xdma, &dst)?;

    xdma.exit();
    Ok(())
}

fn main() {
    kprint::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let selftest = args.iter().any(|a| a == "--selftest");
    let wait = parse_wait(args.iter().find(|a| !a.starts_with("--")).map(String::as_str));

    if let Err(e) = run(wait, selftest) {
        eprintln!("xdma-app: {}", e);
        std::process::exit(1);
    }
}
