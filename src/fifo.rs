//! The AXI4-Stream FIFO driver.
//!
//! [`FifoStream`] frames packets onto the transmit FIFO and collects
//! packets from the receive FIFO into a [`PacketQueue`].
//!
//! Transmit and receive are independent. Each side has its own lock, so
//! one thread (or the interrupt task) can receive while another transmits,
//! but two transmits (or two drains) never interleave their register
//! traffic. All methods take `&self`; share the driver by reference or in
//! an `Arc`.
//!
//! The receive side is usually interrupt driven:
//!
//! ```no_run
//! # async fn run(fifo: &axi_stream::FifoStream<axi_stream::Mmio>, irq: &impl axi_stream::Interrupt) {
//! use axi_stream::CancelToken;
//!
//! let cancel = CancelToken::new();
//! fifo.init_events();
//! // Runs until `cancel.cancel()` is called, or the FIFO reports a fault.
//! fifo.run_interrupt_handler(irq, &cancel).await.ok();
//! # }
//! ```

use alloc::vec::Vec;
use core::pin::pin;

use crate::interrupt::{CancelToken, Interrupt, Next, Wake};
use crate::packet::{Packet, PacketQueue};
use crate::ral::{self, Registers};
use crate::wait::Wait;
use crate::{Error, Result, Selector};

bitflags::bitflags! {
    /// Interrupt status (ISR) and enable (IER) bits.
    ///
    /// Writing a bit to the ISR clears that pending condition, and nothing
    /// else.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FifoEvents: u32 {
        /// Receive packet underrun read error
        const RPURE = 0x8000_0000;
        /// Receive packet overrun read error
        const RPORE = 0x4000_0000;
        /// Receive packet underrun error
        const RPUE = 0x2000_0000;
        /// Transmit packet overrun error
        const TPOE = 0x1000_0000;
        /// Transmit complete
        const TC = 0x0800_0000;
        /// Receive complete
        const RC = 0x0400_0000;
        /// Transmit size error
        const TSE = 0x0200_0000;
        /// Transmit reset complete
        const TRC = 0x0100_0000;
        /// Receive reset complete
        const RRC = 0x0080_0000;
        /// Transmit FIFO programmable full
        const TFPF = 0x0040_0000;
        /// Transmit FIFO programmable empty
        const TFPE = 0x0020_0000;
        /// Receive FIFO programmable full
        const RFPF = 0x0010_0000;
        /// Receive FIFO programmable empty
        const RFPE = 0x0008_0000;

        /// Conditions that mean data was lost or mangled.
        const FAULTS = Self::RPURE.bits()
            | Self::RPORE.bits()
            | Self::RPUE.bits()
            | Self::TPOE.bits()
            | Self::TSE.bits();
    }
}

/// The TLR value for a packet of `words` words.
///
/// Zero-length packets and lengths TLR can't hold are rejected.
fn packet_length(words: usize) -> Result<u32> {
    if words == 0 {
        return Err(Error::InvalidArgument("packet has no whole words"));
    }
    words
        .checked_mul(4)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .ok_or(Error::InvalidArgument("packet is too large"))
}

/// An AXI4-Stream FIFO.
#[derive(Debug)]
pub struct FifoStream<R> {
    registers: R,
    packets: PacketQueue,
    tx_lock: spin::Mutex<()>,
    rx_lock: spin::Mutex<()>,
}

impl<R: Registers> FifoStream<R> {
    pub fn new(registers: R) -> Self {
        Self {
            registers,
            packets: PacketQueue::new(),
            tx_lock: spin::Mutex::new(()),
            rx_lock: spin::Mutex::new(()),
        }
    }

    /// Packets collected by the receive side.
    pub fn packets(&self) -> &PacketQueue {
        &self.packets
    }

    /// Soft-reset the selected FIFO(s).
    ///
    /// When resetting both, transmit goes first so that traffic still in
    /// flight can't land in the receive FIFO after it was reset.
    pub fn reset(&self, which: Selector) {
        let _tx = which.includes_tx().then(|| self.tx_lock.lock());
        let _rx = which.includes_rx().then(|| self.rx_lock.lock());
        if which.includes_tx() {
            self.registers.write(ral::fifo::TDFR, ral::RESET_KEY);
        }
        if which.includes_rx() {
            self.registers.write(ral::fifo::RDFR, ral::RESET_KEY);
        }
        log::debug!("fifo reset ({which:?})");
    }

    /// Reset the whole core, including the stream interface.
    pub fn reset_core(&self) {
        let _tx = self.tx_lock.lock();
        let _rx = self.rx_lock.lock();
        self.registers.write(ral::fifo::SRR, ral::RESET_KEY);
        log::debug!("fifo core reset");
    }

    /// Free space in the transmit FIFO, in 32-bit words.
    pub fn room_for_transmit(&self) -> u32 {
        self.registers.read(ral::fifo::TDFV)
    }

    /// Occupancy of the receive FIFO, in 32-bit words.
    pub fn words_available_to_receive(&self) -> u32 {
        self.registers.read(ral::fifo::RDFO)
    }

    /// Transmit one packet of 32-bit words.
    ///
    /// With a blocking `wait`, polls until the transmit FIFO has room for
    /// the whole packet. With [`Wait::No`] the words are written without
    /// checking. An empty packet is rejected; committing zero bytes isn't
    /// safe on this hardware.
    pub fn transmit(&self, data: &[u32], wait: impl Into<Wait>) -> Result<()> {
        let length = packet_length(data.len())?;
        let _tx = self.tx_lock.lock();
        self.wait_for_room(data.len(), wait.into())?;
        for &word in data {
            self.registers.write(ral::fifo::TDFD, word);
        }
        self.commit(length);
        Ok(())
    }

    /// Transmit one packet of bytes, packed little-endian into words.
    ///
    /// Only whole words are sent: a payload of `4n + r` bytes sends `n`
    /// words and drops the trailing `r` bytes. A payload shorter than one
    /// word is rejected.
    pub fn transmit_bytes(&self, data: &[u8], wait: impl Into<Wait>) -> Result<()> {
        let words = data.len() / 4;
        let length = packet_length(words)?;
        let _tx = self.tx_lock.lock();
        self.wait_for_room(words, wait.into())?;
        self.registers.write_block(ral::fifo::TDFD, &data[..words * 4]);
        self.commit(length);
        Ok(())
    }

    fn wait_for_room(&self, words: usize, wait: Wait) -> Result<()> {
        wait.poll(|| Ok(self.room_for_transmit() as usize >= words))
    }

    /// Write the packet length, in bytes, which hands the packet to the
    /// stream.
    fn commit(&self, length: u32) {
        self.registers.write(ral::fifo::TLR, length);
        log::debug!("fifo sent {} words", length / 4);
    }

    /// Move every complete packet out of the receive FIFO into
    /// [`packets`](Self::packets).
    ///
    /// With a blocking `wait`, first waits for data to show up. Returns the
    /// number of packets collected.
    pub fn drain_received_packets(&self, wait: impl Into<Wait>) -> Result<usize> {
        let _rx = self.rx_lock.lock();
        self.drain_locked(wait.into())
    }

    fn drain_locked(&self, wait: Wait) -> Result<usize> {
        wait.poll(|| Ok(self.words_available_to_receive() != 0))?;
        let mut count = 0;
        while self.words_available_to_receive() > 0 {
            let words = (self.registers.read(ral::fifo::RLR) >> 2) as usize;
            if words == 0 {
                log::warn!("fifo reported data without a whole-word packet");
                break;
            }
            let packet: Vec<u32> = (0..words)
                .map(|_| self.registers.read(ral::fifo::RDFD))
                .collect();
            self.packets.append(Packet::new(packet));
            count += 1;
        }
        if count > 0 {
            log::debug!("fifo received {count} packets");
        }
        Ok(count)
    }

    /// Read the pending events.
    pub fn pending_events(&self) -> FifoEvents {
        FifoEvents::from_bits_retain(self.registers.read(ral::fifo::ISR))
    }

    /// Read the enabled interrupt sources.
    pub fn enabled_events(&self) -> FifoEvents {
        FifoEvents::from_bits_retain(self.registers.read(ral::fifo::IER))
    }

    /// Clear the given pending events.
    pub fn clear_events(&self, events: FifoEvents) {
        self.registers.write(ral::fifo::ISR, events.bits());
    }

    /// Clear every pending event, then enable only the receive-complete
    /// interrupt.
    ///
    /// Calling it again once the FIFO is set up changes nothing, so a late
    /// caller can't wipe out a pending receive event.
    pub fn init_events(&self) {
        if self.enabled_events() == FifoEvents::RC {
            log::debug!("fifo events already initialized");
            return;
        }
        self.registers.write(ral::fifo::ISR, u32::MAX);
        self.registers.write(ral::fifo::IER, FifoEvents::RC.bits());
        log::info!("fifo events initialized");
    }

    /// Handle one interrupt.
    ///
    /// Reads the pending events and clears exactly those. If a packet was
    /// received, drains the receive FIFO without waiting. Fault events are
    /// reported as [`Error::FifoFault`] after the drain.
    pub fn service_interrupt(&self) -> Result<FifoEvents> {
        let events = self.pending_events();
        self.clear_events(events);
        if events.contains(FifoEvents::RC) {
            let _rx = self.rx_lock.lock();
            self.drain_locked(Wait::No)?;
        }
        let faults = events & FifoEvents::FAULTS;
        if !faults.is_empty() {
            log::warn!("fifo fault: {faults:?}");
            return Err(Error::FifoFault(faults));
        }
        Ok(events)
    }

    /// Service interrupts until `cancel` fires.
    ///
    /// The task only suspends while waiting for the next interrupt; that's
    /// also where cancellation takes effect. Returns `Ok(())` once cancelled,
    /// or the first fault reported by [`service_interrupt`](Self::service_interrupt).
    /// Restarting after a fault is up to the caller.
    pub async fn run_interrupt_handler<I: Interrupt>(
        &self,
        irq: &I,
        cancel: &CancelToken,
    ) -> Result<()> {
        loop {
            let interrupt = pin!(irq.wait());
            let wake = Next {
                interrupt,
                token: cancel,
            }
            .await;
            match wake {
                Wake::Interrupt => {
                    self.service_interrupt()?;
                }
                Wake::Cancelled => {
                    log::info!("fifo interrupt handler cancelled");
                    return Ok(());
                }
            }
        }
    }
}
