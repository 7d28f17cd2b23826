//! The AXI DMA driver.
//!
//! [`SimpleDma`] pairs a transmit and a receive [`Channel`] of one engine in
//! direct-register (simple) mode. Every transfer moves one coherent buffer.
//! You can either keep a persistent buffer per channel (see
//! [`resize`](SimpleDma::resize)), or let the copy helpers allocate, copy,
//! and release a scratch buffer per call.
//!
//! ```
//! use axi_stream::{BufferManager, DmaConfig, ElementType, Selector, SimpleDma};
//! # fn run(registers: impl axi_stream::Registers + Clone) -> axi_stream::Result<()> {
//! let mut dma = SimpleDma::new(registers, BufferManager::heap(), DmaConfig::default());
//! dma.start(true)?;
//!
//! dma.resize(Selector::Both, [1024], ElementType::U32)?;
//! dma.tx().buffer_mut()?.as_mut_slice::<u32>()?.fill(7);
//! dma.send(true)?;
//! dma.receive(true)?;
//! # Ok(())
//! # }
//! ```

use crate::buffer::BufferManager;
use crate::channel::{Channel, Rx, Tx};
use crate::element::{Element, ElementType, Shape};
use crate::ral::Registers;
use crate::wait::Wait;
use crate::{Result, Selector};

use alloc::vec::Vec;

bitflags::bitflags! {
    /// DMACR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DmaControl: u32 {
        /// Run / stop.
        const RUN = 1 << 0;
        /// Soft reset. Self-clearing; resets both directions.
        const RESET = 1 << 2;
        const IOC_IRQ_EN = 1 << 12;
        const DLY_IRQ_EN = 1 << 13;
        const ERR_IRQ_EN = 1 << 14;
    }
}

bitflags::bitflags! {
    /// DMASR bits. The interrupt bits are write-1-to-clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DmaStatus: u32 {
        const HALTED = 1 << 0;
        const IDLE = 1 << 1;
        const SG_INCLUDED = 1 << 3;
        const INTERNAL_ERR = 1 << 4;
        const SLAVE_ERR = 1 << 5;
        const DECODE_ERR = 1 << 6;
        const IOC_IRQ = 1 << 12;
        const DLY_IRQ = 1 << 13;
        const ERR_IRQ = 1 << 14;

        const ERRORS = Self::INTERNAL_ERR.bits() | Self::SLAVE_ERR.bits() | Self::DECODE_ERR.bits();
    }
}

/// Synthesis parameters of the engine that the driver has to respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaConfig {
    /// Width of the LENGTH register, in bits (8 to 26). Wider values are
    /// treated as 26.
    pub length_width: u8,
    /// The engine was built with 64-bit addressing.
    pub addr_64bit: bool,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            length_width: 26,
            addr_64bit: false,
        }
    }
}

/// Widest LENGTH register the engine can be built with.
pub const MAX_LENGTH_WIDTH: u8 = 26;

impl DmaConfig {
    /// Largest transfer, in bytes, the LENGTH register can express.
    pub const fn max_transfer(&self) -> usize {
        let width = if self.length_width > MAX_LENGTH_WIDTH {
            MAX_LENGTH_WIDTH
        } else {
            self.length_width
        };
        (1usize << width) - 1
    }
}

/// A transmit / receive pair of DMA channels.
///
/// Use [`split`](Self::split) to drive the two directions from separate
/// execution contexts.
#[derive(Debug)]
pub struct SimpleDma<R: Registers> {
    tx: Channel<R, Tx>,
    rx: Channel<R, Rx>,
    buffers: BufferManager,
}

impl<R: Registers + Clone> SimpleDma<R> {
    pub fn new(registers: R, buffers: BufferManager, config: DmaConfig) -> Self {
        Self {
            tx: Channel::new(registers.clone(), buffers.clone(), config),
            rx: Channel::new(registers, buffers.clone(), config),
            buffers,
        }
    }
}

impl<R: Registers> SimpleDma<R> {
    /// Start both channels.
    pub fn start(&mut self, wait: impl Into<Wait>) -> Result<()> {
        let wait = wait.into();
        self.tx.start(wait)?;
        self.rx.start(wait)
    }

    /// Stop both channels.
    pub fn stop(&mut self, wait: impl Into<Wait>) -> Result<()> {
        let wait = wait.into();
        self.tx.stop(wait)?;
        self.rx.stop(wait)
    }

    /// Reset the engine. Both channels are halted afterwards.
    pub fn reset(&mut self, wait: impl Into<Wait>) -> Result<()> {
        let wait = wait.into();
        self.tx.reset(wait)?;
        self.rx.reset(wait)
    }

    /// Replace the persistent buffer(s) of the selected channel(s).
    ///
    /// Nothing is released unless every selected channel is idle and the
    /// shape is valid.
    pub fn resize(
        &mut self,
        selector: Selector,
        shape: impl Into<Shape>,
        ty: ElementType,
    ) -> Result<()> {
        let shape = shape.into();
        shape.byte_len(ty)?;
        if selector.includes_tx() {
            self.tx.wait(Wait::No)?;
        }
        if selector.includes_rx() {
            self.rx.wait(Wait::No)?;
        }
        if selector.includes_tx() {
            self.tx.resize(shape.clone(), ty)?;
        }
        if selector.includes_rx() {
            self.rx.resize(shape, ty)?;
        }
        Ok(())
    }

    /// Send the transmit channel's persistent buffer.
    pub fn send(&mut self, wait: impl Into<Wait>) -> Result<()> {
        self.tx.send(wait)
    }

    /// Receive into the receive channel's persistent buffer.
    pub fn receive(&mut self, wait: impl Into<Wait>) -> Result<()> {
        self.rx.receive(wait)
    }

    /// Send a copy of `data`. See [`Channel::send_copy`].
    pub fn send_copy<E: Element>(&mut self, data: &[E], wait: impl Into<Wait>) -> Result<()> {
        self.tx.send_copy(data, wait)
    }

    /// Receive `shape` elements and return a copy. See [`Channel::receive_copy`].
    pub fn receive_copy<E: Element>(
        &mut self,
        shape: impl Into<Shape>,
        wait: impl Into<Wait>,
    ) -> Result<Vec<E>> {
        self.rx.receive_copy(shape, wait)
    }

    /// Wait for the outstanding transfer(s) of the selected channel(s).
    pub fn wait(&mut self, selector: Selector, wait: impl Into<Wait>) -> Result<()> {
        let wait = wait.into();
        if selector.includes_tx() {
            self.tx.wait(wait)?;
        }
        if selector.includes_rx() {
            self.rx.wait(wait)?;
        }
        Ok(())
    }

    pub fn tx(&mut self) -> &mut Channel<R, Tx> {
        &mut self.tx
    }

    pub fn rx(&mut self) -> &mut Channel<R, Rx> {
        &mut self.rx
    }

    /// Borrow both channels at once, e.g. to hand them to two threads.
    pub fn split(&mut self) -> (&mut Channel<R, Tx>, &mut Channel<R, Rx>) {
        (&mut self.tx, &mut self.rx)
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }
}
