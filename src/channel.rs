//! DMA channels.
//!
//! A [`Channel`] drives one direction of the DMA engine: [`Tx`] moves
//! memory to the stream (MM2S), [`Rx`] moves the stream to memory (S2MM).
//! The two directions have separate register blocks, so a `Tx` and an `Rx`
//! channel can be driven from different threads at the same time.
//!
//! Within one channel, transfers are strictly sequential. A channel tracks
//! whether its last transfer is still in flight. While it is, the channel
//! refuses new transfers and won't hand out or release the buffer the
//! engine is using; those calls fail with [`Error::Busy`]. Completion is
//! observed by [`Channel::wait`], or lazily by the next call that needs an
//! idle channel.
//!
//! Dropping a channel with a transfer in flight stops the channel first.
//! If the channel never reports that it halted, its buffers are leaked
//! rather than returned to the allocator.

use alloc::vec::Vec;
use core::marker::PhantomData;
use core::sync::atomic::{fence, Ordering};

use crate::buffer::{BufferManager, CoherentBuffer};
use crate::dma::{DmaConfig, DmaControl, DmaStatus};
use crate::element::{Element, ElementType, Shape};
use crate::ral::{self, Registers};
use crate::wait::Wait;
use crate::{Error, Result};

mod sealed {
    pub trait Sealed {}
}

/// A DMA transfer direction.
pub trait Direction: sealed::Sealed {
    /// Offset of this direction's register block.
    const BASE: usize;
    /// Short name for logs.
    const NAME: &'static str;
}

/// Memory to stream (MM2S).
#[derive(Debug)]
pub enum Tx {}
/// Stream to memory (S2MM).
#[derive(Debug)]
pub enum Rx {}

impl sealed::Sealed for Tx {}
impl sealed::Sealed for Rx {}

impl Direction for Tx {
    const BASE: usize = ral::dma::MM2S;
    const NAME: &'static str = "tx";
}

impl Direction for Rx {
    const BASE: usize = ral::dma::S2MM;
    const NAME: &'static str = "rx";
}

/// One direction of an AXI DMA engine.
pub struct Channel<R: Registers, D: Direction> {
    registers: R,
    config: DmaConfig,
    buffers: BufferManager,
    /// The persistent buffer, reused across send / receive calls.
    current: Option<CoherentBuffer>,
    /// Scratch buffer of a copy transfer whose completion wasn't observed.
    parked: Option<CoherentBuffer>,
    in_flight: bool,
    _direction: PhantomData<D>,
}

impl<R: Registers, D: Direction> Channel<R, D> {
    pub fn new(registers: R, buffers: BufferManager, config: DmaConfig) -> Self {
        Self {
            registers,
            config,
            buffers,
            current: None,
            parked: None,
            in_flight: false,
            _direction: PhantomData,
        }
    }

    fn read(&self, offset: usize) -> u32 {
        self.registers.read(D::BASE + offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.registers.write(D::BASE + offset, value)
    }

    /// Read the channel's status register.
    pub fn status(&self) -> DmaStatus {
        DmaStatus::from_bits_retain(self.read(ral::dma::DMASR))
    }

    pub fn is_running(&self) -> bool {
        !self.status().contains(DmaStatus::HALTED)
    }

    pub fn is_idle(&self) -> bool {
        self.status().contains(DmaStatus::IDLE)
    }

    /// `true` if a transfer was issued and its completion hasn't been
    /// observed yet.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Set the run bit, then wait for the channel to leave the halted state.
    pub fn start(&mut self, wait: impl Into<Wait>) -> Result<()> {
        let control = DmaControl::from_bits_retain(self.read(ral::dma::DMACR));
        self.write(ral::dma::DMACR, (control | DmaControl::RUN).bits());
        wait.into().poll(|| Ok(self.is_running()))?;
        log::debug!("dma {} channel started", D::NAME);
        Ok(())
    }

    /// Clear the run bit, then wait for the channel to halt.
    ///
    /// A halted channel no longer touches memory, so an outstanding
    /// transfer is abandoned and its scratch buffer released.
    pub fn stop(&mut self, wait: impl Into<Wait>) -> Result<()> {
        let control = DmaControl::from_bits_retain(self.read(ral::dma::DMACR));
        self.write(ral::dma::DMACR, (control - DmaControl::RUN).bits());
        let wait = wait.into();
        if wait.is_blocking() {
            wait.poll(|| Ok(!self.is_running()))?;
            self.abandon();
        }
        log::debug!("dma {} channel stopped", D::NAME);
        Ok(())
    }

    /// Soft-reset the channel and wait for the reset to finish.
    ///
    /// This is the only way out of a [`DmaFault`](Error::DmaFault). Note
    /// that the reset applies to the whole engine, and that the channel is
    /// halted afterwards. A transfer in flight on the other channel is
    /// lost too; that channel reports [`Error::Aborted`] when it next
    /// checks for completion.
    pub fn reset(&mut self, wait: impl Into<Wait>) -> Result<()> {
        self.write(ral::dma::DMACR, DmaControl::RESET.bits());
        wait.into().poll(|| {
            let control = DmaControl::from_bits_retain(self.read(ral::dma::DMACR));
            Ok(!control.contains(DmaControl::RESET))
        })?;
        self.abandon();
        log::info!("dma {} channel reset", D::NAME);
        Ok(())
    }

    /// Wait for the outstanding transfer, if any, to complete.
    ///
    /// With [`Wait::No`] this checks once, and fails with [`Error::Busy`] if
    /// the transfer is still running. Engine errors surface as
    /// [`Error::DmaFault`]; the transfer then counts as outstanding until the
    /// channel is [`reset`](Self::reset). If the channel halted without
    /// finishing the transfer, this fails once with [`Error::Aborted`] and
    /// the channel is no longer in flight.
    pub fn wait(&mut self, wait: impl Into<Wait>) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        let wait = wait.into();
        let done = if wait.is_blocking() {
            wait.poll(|| self.check_done())
        } else {
            match self.check_done() {
                Ok(true) => Ok(()),
                Ok(false) => Err(Error::Busy),
                Err(err) => Err(err),
            }
        };
        self.observe(done)?;
        self.complete();
        Ok(())
    }

    /// Release the persistent buffer, if any, and allocate a new one.
    ///
    /// The old buffer is released before the new one is allocated. Fails
    /// with [`Error::Busy`] while a transfer is outstanding, and with
    /// [`Error::InvalidArgument`] for an empty shape; in both cases the old
    /// buffer stays in place.
    pub fn resize(&mut self, shape: impl Into<Shape>, ty: ElementType) -> Result<()> {
        let shape = shape.into();
        shape.byte_len(ty)?;
        self.settle()?;
        if let Some(old) = self.current.take() {
            self.buffers.release(old);
        }
        self.current = Some(self.buffers.allocate(shape, ty)?);
        Ok(())
    }

    /// The persistent buffer.
    ///
    /// Fails with [`Error::Busy`] while a transfer is outstanding, and with
    /// [`Error::InvalidArgument`] if [`resize`](Self::resize) was never
    /// called.
    pub fn buffer(&mut self) -> Result<&CoherentBuffer> {
        self.settle()?;
        self.current.as_ref().ok_or(NO_BUFFER)
    }

    /// The persistent buffer, for filling before a send.
    pub fn buffer_mut(&mut self) -> Result<&mut CoherentBuffer> {
        self.settle()?;
        self.current.as_mut().ok_or(NO_BUFFER)
    }

    /// Transfer the persistent buffer.
    fn transfer_current(&mut self, wait: Wait) -> Result<()> {
        self.settle()?;
        let (phys, len) = match &self.current {
            Some(buffer) => (buffer.phys_addr(), buffer.len_bytes()),
            None => return Err(NO_BUFFER),
        };
        self.program(phys, len)?;
        if wait.is_blocking() {
            self.wait(wait)?;
        }
        Ok(())
    }

    /// Transfer a scratch buffer. On success the scratch buffer is returned
    /// to the caller; otherwise it's parked until the transfer completes.
    fn transfer_scratch(
        &mut self,
        scratch: CoherentBuffer,
        wait: Wait,
    ) -> Result<Option<CoherentBuffer>> {
        self.program(scratch.phys_addr(), scratch.len_bytes())?;
        if !wait.is_blocking() {
            self.parked = Some(scratch);
            return Ok(None);
        }
        match wait.poll(|| self.check_done()) {
            Ok(()) => {
                self.complete();
                Ok(Some(scratch))
            }
            Err(err) => {
                self.parked = Some(scratch);
                self.observe(Err(err))
            }
        }
    }

    /// Validate and start a transfer of `len` bytes at `phys`.
    ///
    /// Every check runs before the first register write.
    fn program(&mut self, phys: u64, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::InvalidArgument("zero-length transfer"));
        }
        if len > self.config.max_transfer() {
            return Err(Error::InvalidArgument(
                "transfer exceeds the buffer length register",
            ));
        }
        if phys >> 32 != 0 && !self.config.addr_64bit {
            return Err(Error::InvalidArgument(
                "buffer address needs 64-bit addressing",
            ));
        }
        if self.in_flight {
            return Err(Error::Busy);
        }
        if !self.is_running() {
            return Err(Error::Halted);
        }

        // Payload stores must land before the engine is told to go.
        fence(Ordering::SeqCst);
        self.write(ral::dma::ADDR, phys as u32);
        if self.config.addr_64bit {
            self.write(ral::dma::ADDR_MSB, (phys >> 32) as u32);
        }
        self.in_flight = true;
        self.write(ral::dma::LENGTH, len as u32);
        log::debug!("dma {} transfer of {len} bytes at {phys:#x}", D::NAME);
        Ok(())
    }

    fn check_done(&self) -> Result<bool> {
        let status = self.status();
        if status.intersects(DmaStatus::ERRORS) {
            log::warn!("dma {} fault: {status:?}", D::NAME);
            return Err(Error::DmaFault(status));
        }
        if status.contains(DmaStatus::IDLE) {
            return Ok(true);
        }
        if status.contains(DmaStatus::HALTED) {
            return Err(Error::Aborted);
        }
        Ok(false)
    }

    /// Forget a transfer that the engine dropped when it halted.
    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::Aborted) = result {
            log::warn!("dma {} channel halted with a transfer in flight", D::NAME);
            self.abandon();
        }
        result
    }

    /// Observe the completion of an outstanding transfer, if it finished.
    fn settle(&mut self) -> Result<()> {
        if self.in_flight {
            let done = self.check_done();
            if !self.observe(done)? {
                return Err(Error::Busy);
            }
            self.complete();
        }
        Ok(())
    }

    fn complete(&mut self) {
        // Engine writes must be visible before the host reads the buffer.
        fence(Ordering::SeqCst);
        self.in_flight = false;
        if self.status().contains(DmaStatus::IOC_IRQ) {
            self.write(ral::dma::DMASR, DmaStatus::IOC_IRQ.bits());
        }
        if let Some(scratch) = self.parked.take() {
            self.buffers.release(scratch);
        }
    }

    fn abandon(&mut self) {
        self.in_flight = false;
        self.parked = None;
    }
}

const NO_BUFFER: Error = Error::InvalidArgument("channel has no buffer; call resize first");

/// Polls a dropped channel gets to halt.
const HALT_POLLS: u32 = 1 << 16;

impl<R: Registers, D: Direction> Drop for Channel<R, D> {
    fn drop(&mut self) {
        if !self.in_flight {
            return;
        }
        let control = DmaControl::from_bits_retain(self.read(ral::dma::DMACR));
        self.write(ral::dma::DMACR, (control - DmaControl::RUN).bits());
        if Wait::Polls(HALT_POLLS)
            .poll(|| Ok(!self.is_running()))
            .is_ok()
        {
            return;
        }
        log::error!("dma {} channel didn't halt; leaking its buffers", D::NAME);
        core::mem::forget(self.current.take());
        core::mem::forget(self.parked.take());
    }
}

impl<R: Registers> Channel<R, Tx> {
    /// Send the persistent buffer.
    ///
    /// With a blocking `wait`, returns once the engine reports completion.
    /// With [`Wait::No`] the transfer stays in flight; call
    /// [`wait`](Self::wait) before touching the buffer again.
    pub fn send(&mut self, wait: impl Into<Wait>) -> Result<()> {
        self.transfer_current(wait.into())
    }

    /// Copy `data` into a scratch buffer and send it.
    ///
    /// The scratch buffer is released once completion is observed. With
    /// [`Wait::No`], that happens in a later [`wait`](Self::wait) or in the
    /// next call that needs an idle channel.
    pub fn send_copy<E: Element>(&mut self, data: &[E], wait: impl Into<Wait>) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("zero-length transfer"));
        }
        self.settle()?;
        let scratch = self.buffers.copy_from(data)?;
        self.transfer_scratch(scratch, wait.into())?;
        Ok(())
    }
}

impl<R: Registers> Channel<R, Rx> {
    /// Receive into the persistent buffer.
    ///
    /// With [`Wait::No`] the transfer stays in flight; call
    /// [`wait`](Self::wait) before reading the buffer.
    pub fn receive(&mut self, wait: impl Into<Wait>) -> Result<()> {
        self.transfer_current(wait.into())
    }

    /// Receive `shape` elements into a scratch buffer, and return a copy of
    /// them, flattened.
    ///
    /// The data only exists once the transfer completes, so `wait` must be
    /// blocking; [`Wait::No`] is rejected. If the wait fails, the scratch
    /// buffer stays with the channel until the engine is done with it.
    pub fn receive_copy<E: Element>(
        &mut self,
        shape: impl Into<Shape>,
        wait: impl Into<Wait>,
    ) -> Result<Vec<E>> {
        let wait = wait.into();
        if !wait.is_blocking() {
            return Err(Error::InvalidArgument("receive_copy must wait for its data"));
        }
        let shape = shape.into();
        shape.byte_len(E::TYPE)?;
        self.settle()?;
        let scratch = self.buffers.allocate(shape, E::TYPE)?;
        match self.transfer_scratch(scratch, wait)? {
            Some(scratch) => Ok(scratch.as_slice::<E>()?.to_vec()),
            None => Err(Error::Busy),
        }
    }

    /// Number of bytes the engine wrote in the last completed transfer.
    ///
    /// The stream may end a packet before the buffer is full.
    pub fn received_len(&self) -> usize {
        self.read(ral::dma::LENGTH) as usize
    }
}

impl<R: Registers, D: Direction> core::fmt::Debug for Channel<R, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("direction", &D::NAME)
            .field("buffer", &self.current)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}
