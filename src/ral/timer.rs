//! AXI timer register block. Only timer 0 is described.

use core::mem::offset_of;

use ral_registers::RWRegister;

#[repr(C)]
pub struct RegisterBlock {
    /// Control/Status Register 0
    pub TCSR0: RWRegister<u32>,
    /// Load Register 0
    pub TLR0: RWRegister<u32>,
    /// Timer/Counter Register 0
    pub TCR0: RWRegister<u32>,
}

pub const TCSR0: usize = offset_of!(RegisterBlock, TCSR0);
pub const TLR0: usize = offset_of!(RegisterBlock, TLR0);
pub const TCR0: usize = offset_of!(RegisterBlock, TCR0);

/// TCSR0 fields, as RAL-style field modules.
pub mod tcsr0 {
    pub mod ARHT0 {
        pub const offset: u32 = 4;
        pub const mask: u32 = 1 << offset;
    }
    pub mod LOAD0 {
        pub const offset: u32 = 5;
        pub const mask: u32 = 1 << offset;
    }
    pub mod ENIT0 {
        pub const offset: u32 = 6;
        pub const mask: u32 = 1 << offset;
    }
    pub mod ENT0 {
        pub const offset: u32 = 7;
        pub const mask: u32 = 1 << offset;
    }
}
