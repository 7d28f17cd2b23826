//! Drivers for the AXI DMA engine, the AXI4-Stream FIFO, and the AXI timer.
//!
//! `axi-stream` moves bulk data between host memory and custom logic in a
//! programmable-logic fabric, and times it. It provides
//!
//! - DMA-coherent buffers, allocated through a platform
//!   [`CoherentAllocator`].
//! - a [`SimpleDma`] driver with independent transmit and receive
//!   [`Channel`](channel::Channel)s, blocking or non-blocking transfers, and
//!   copy helpers that manage scratch buffers for you.
//! - a [`FifoStream`] driver that frames packets onto a streaming FIFO with
//!   back-pressure, and drains received packets from an interrupt task.
//! - an [`AxiTimer`] driver that turns tick counts into seconds.
//! - a [`Registry`] that attaches the right driver to a device by its
//!   hardware identifier.
//!
//! # Getting started
//!
//! Every driver talks to its device through the [`Registers`] trait. On
//! hardware that's usually an [`Mmio`] window over the device's mapped
//! registers:
//!
//! ```no_run
//! use axi_stream::{FifoStream, Mmio, Selector, Wait};
//! # let base = core::ptr::NonNull::<u32>::dangling();
//!
//! // Safety: `base` maps the FIFO's 4 KiB register window.
//! let registers = unsafe { Mmio::new(base, 0x1000) };
//! let fifo = FifoStream::new(registers);
//! fifo.reset(Selector::Both);
//! fifo.init_events();
//! fifo.transmit(&[0xdead_beef, 0x1234_5678], true)?;
//! fifo.drain_received_packets(Wait::No)?;
//! for packet in fifo.packets().drain() {
//!     // ...
//! #   let _ = packet;
//! }
//! # Ok::<(), axi_stream::Error>(())
//! ```
//!
//! # Waiting
//!
//! Operations that wait on hardware take a [`Wait`]. `true` and `false`
//! convert to a bounded wait and to no wait at all. Bounded waits that
//! expire return [`Error::Timeout`]; nothing in this crate retries on its
//! own.
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![no_std]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

pub mod buffer;
pub mod channel;
pub mod dma;
mod element;
mod error;
pub mod fifo;
mod interrupt;
mod packet;
pub mod ral;
pub mod registry;
pub mod timer;
mod wait;

#[cfg(test)]
mod mock;

pub use buffer::{BufferManager, CoherentAllocator, CoherentBuffer, HeapAllocator, Region};
pub use dma::{DmaConfig, DmaStatus, SimpleDma};
pub use element::{Element, ElementType, Shape};
pub use error::Error;
pub use fifo::{FifoEvents, FifoStream};
pub use interrupt::{CancelToken, Cancelled, Interrupt};
pub use packet::{Packet, PacketQueue};
pub use ral::{Mmio, Registers};
pub use registry::{Description, Driver, Registry};
pub use timer::AxiTimer;
pub use wait::{Wait, DEFAULT_POLLS};

/// A driver result
pub type Result<T> = core::result::Result<T, Error>;

/// Selects the transmit side, the receive side, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Tx,
    Rx,
    Both,
}

impl Selector {
    pub const fn includes_tx(self) -> bool {
        matches!(self, Selector::Tx | Selector::Both)
    }

    pub const fn includes_rx(self) -> bool {
        matches!(self, Selector::Rx | Selector::Both)
    }
}

impl core::str::FromStr for Selector {
    type Err = Error;

    /// Parse `"tx"`, `"rx"`, or `"both"`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tx" => Ok(Selector::Tx),
            "rx" => Ok(Selector::Rx),
            "both" => Ok(Selector::Both),
            _ => Err(Error::InvalidArgument("selector must be tx, rx, or both")),
        }
    }
}
