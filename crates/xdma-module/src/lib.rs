//! # xdma-module - Default implementations
//!
//! The driver half of XDMA: everything between the command surface and
//! the hardware backend.
//!
//! | Component        | Type                | Notes                                  |
//! |------------------|---------------------|----------------------------------------|
//! | Shared region    | `SharedRegion`      | mmap on unix, aligned heap elsewhere   |
//! | Arena allocator  | `Arena`             | bump cursor, block-rounded, generations|
//! | Completion token | `CompletionToken`   | futex on Linux, condvar elsewhere      |
//! | Channel registry | `ChannelRegistry`   | (direction, ordinal) probing           |
//! | Transfer engine  | `TransferEngine`    | configure / prepare / start / stop     |
//! | Hardware         | `SimulatedDma`      | in-process AXI DMA with loopback       |
//! | Lifecycle        | `XdmaDevice`        | init / shutdown / command dispatch     |

pub mod region;
pub mod arena;
pub mod completion;
pub mod registry;
pub mod engine;
pub mod sim;
pub mod config;
pub mod device;
mod selftest;

pub use arena::{Arena, ArenaBuf, ArenaHost};
pub use completion::CompletionToken;
pub use config::DeviceConfig;
pub use device::XdmaDevice;
pub use engine::TransferEngine;
pub use registry::ChannelRegistry;
pub use region::SharedRegion;
pub use sim::{SimBehavior, SimConfig, SimulatedDma};
