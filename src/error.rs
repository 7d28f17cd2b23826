//! Driver errors.

use crate::dma::DmaStatus;
use crate::fifo::FifoEvents;

/// A driver error.
///
/// Argument errors are raised before any register is touched. Hardware
/// faults are reported to the immediate caller and never retried here;
/// blindly restarting a DMA engine can corrupt an in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The call violated its contract: empty shape, zero-length payload,
    /// unrecognized selector, oversized transfer, and so on.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A bounded wait expired before the hardware condition became true.
    #[error("timed out waiting for hardware")]
    Timeout,
    /// The channel, or the buffer it owns, is still referenced by a
    /// transfer whose completion hasn't been observed.
    #[error("a transfer is still in flight")]
    Busy,
    /// The DMA channel isn't running. Call `start()` first.
    #[error("DMA channel is halted")]
    Halted,
    /// The DMA channel halted before the outstanding transfer finished,
    /// for example because the engine was reset through the other channel.
    /// The transfer is forgotten once this is reported.
    #[error("DMA channel halted with a transfer in flight")]
    Aborted,
    /// The DMA engine reported an internal, slave, or decode error.
    #[error("DMA fault, status {0:?}")]
    DmaFault(DmaStatus),
    /// The FIFO raised one or more error conditions in its status register.
    #[error("FIFO fault, events {0:?}")]
    FifoFault(FifoEvents),
    /// The coherent allocator couldn't satisfy a request of this many bytes.
    #[error("coherent allocation of {0} bytes failed")]
    OutOfMemory(usize),
    /// No driver is registered for the hardware identifier.
    #[error("no driver registered for this hardware identifier")]
    UnknownDevice,
}

impl Error {
    /// Returns the offending status bits, if this is a hardware fault.
    pub fn fault_bits(&self) -> Option<u32> {
        match self {
            Error::DmaFault(status) => Some(status.bits()),
            Error::FifoFault(events) => Some(events.bits()),
            _ => None,
        }
    }
}
