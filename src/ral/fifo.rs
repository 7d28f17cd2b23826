//! AXI4-Stream FIFO register block (AXI4-Lite data interface)

use core::mem::offset_of;

use ral_registers::{RORegister, RWRegister, WORegister};

#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt Status Register. Write 1 to clear.
    pub ISR: RWRegister<u32>,
    /// Interrupt Enable Register
    pub IER: RWRegister<u32>,
    /// Transmit Data FIFO Reset
    pub TDFR: WORegister<u32>,
    /// Transmit Data FIFO Vacancy, in words
    pub TDFV: RORegister<u32>,
    /// Transmit Data FIFO 32-bit Write Port
    pub TDFD: WORegister<u32>,
    /// Transmit Length, in bytes. Writing it commits the packet.
    pub TLR: WORegister<u32>,
    /// Receive Data FIFO Reset
    pub RDFR: WORegister<u32>,
    /// Receive Data FIFO Occupancy, in words
    pub RDFO: RORegister<u32>,
    /// Receive Data FIFO 32-bit Read Port
    pub RDFD: RORegister<u32>,
    /// Receive Length, in bytes, of the next packet
    pub RLR: RORegister<u32>,
    /// AXI4-Stream Reset
    pub SRR: WORegister<u32>,
    /// Transmit Destination
    pub TDR: WORegister<u32>,
    /// Receive Destination
    pub RDR: RORegister<u32>,
}

const _: () = assert!(offset_of!(RegisterBlock, TDFD) == 0x10);
const _: () = assert!(offset_of!(RegisterBlock, RLR) == 0x24);
const _: () = assert!(offset_of!(RegisterBlock, RDR) == 0x30);

pub const ISR: usize = offset_of!(RegisterBlock, ISR);
pub const IER: usize = offset_of!(RegisterBlock, IER);
pub const TDFR: usize = offset_of!(RegisterBlock, TDFR);
pub const TDFV: usize = offset_of!(RegisterBlock, TDFV);
pub const TDFD: usize = offset_of!(RegisterBlock, TDFD);
pub const TLR: usize = offset_of!(RegisterBlock, TLR);
pub const RDFR: usize = offset_of!(RegisterBlock, RDFR);
pub const RDFO: usize = offset_of!(RegisterBlock, RDFO);
pub const RDFD: usize = offset_of!(RegisterBlock, RDFD);
pub const RLR: usize = offset_of!(RegisterBlock, RLR);
pub const SRR: usize = offset_of!(RegisterBlock, SRR);
