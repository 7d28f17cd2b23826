//! AXI DMA register blocks and fields (simple, direct-register mode)

use core::mem::offset_of;

use ral_registers::{RORegister, RWRegister};

/// One direction of the DMA engine.
///
/// MM2S (memory to stream) and S2MM (stream to memory) share this layout.
/// The descriptor pointers are only meaningful in scatter-gather mode,
/// which this driver doesn't use.
#[repr(C)]
pub struct ChannelBlock {
    /// DMA Control Register
    pub DMACR: RWRegister<u32>,
    /// DMA Status Register
    pub DMASR: RWRegister<u32>,
    _curdesc: [RORegister<u32>; 2],
    _taildesc: [RORegister<u32>; 2],
    /// Source (MM2S) or destination (S2MM) address, low word
    pub ADDR: RWRegister<u32>,
    /// Address, high word. Only present with 64-bit addressing.
    pub ADDR_MSB: RWRegister<u32>,
    _reserved0: [u32; 2],
    /// Transfer length, in bytes. Writing it starts the transfer.
    pub LENGTH: RWRegister<u32>,
    _reserved1: [u32; 1],
}

/// The full DMA register window.
#[repr(C)]
pub struct RegisterBlock {
    pub MM2S: ChannelBlock,
    pub S2MM: ChannelBlock,
}

const _: () = assert!(offset_of!(ChannelBlock, ADDR) == 0x18);
const _: () = assert!(offset_of!(ChannelBlock, LENGTH) == 0x28);
const _: () = assert!(offset_of!(RegisterBlock, S2MM) == 0x30);

/// Offset of the MM2S (transmit) channel block.
pub const MM2S: usize = offset_of!(RegisterBlock, MM2S);
/// Offset of the S2MM (receive) channel block.
pub const S2MM: usize = offset_of!(RegisterBlock, S2MM);

// Offsets within a channel block.
pub const DMACR: usize = offset_of!(ChannelBlock, DMACR);
pub const DMASR: usize = offset_of!(ChannelBlock, DMASR);
pub const ADDR: usize = offset_of!(ChannelBlock, ADDR);
pub const ADDR_MSB: usize = offset_of!(ChannelBlock, ADDR_MSB);
pub const LENGTH: usize = offset_of!(ChannelBlock, LENGTH);
