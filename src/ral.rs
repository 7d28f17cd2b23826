//! A RAL-like module describing register access for the AXI peripherals.
//!
//! Drivers don't dereference register blocks directly. They go through the
//! [`Registers`] trait, an address-indexed read / write interface. That keeps
//! the drivers independent of how the platform maps the device: [`Mmio`]
//! covers a plain memory-mapped window, while a UIO handle, a remote
//! debugger, or a register model can implement the same trait.
//!
//! The `RegisterBlock` layouts in the submodules aren't used for access.
//! They document the hardware, and their field offsets become the
//! constants the drivers use.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals, // RAL field modules
    dead_code, // Layout-only fields
)]

pub mod dma;
pub mod fifo;
pub mod timer;

use alloc::sync::Arc;
use core::ptr::NonNull;

use ral_registers::RWRegister;

/// Address-indexed access to one device's register window.
///
/// Offsets are in bytes from the start of the window. Implementations are
/// shared between the TX and RX paths of a driver, so they take `&self`.
pub trait Registers {
    /// Read the 32-bit register at `offset`.
    fn read(&self, offset: usize) -> u32;
    /// Write the 32-bit register at `offset`.
    fn write(&self, offset: usize, value: u32);
    /// Write a block of bytes to the data port at `offset`.
    ///
    /// The default implementation writes each whole little-endian word of
    /// `block` to the same offset, in order. Trailing bytes that don't form
    /// a whole word are ignored.
    fn write_block(&self, offset: usize, block: &[u8]) {
        for word in block.chunks_exact(4) {
            self.write(offset, u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }
    }
}

impl<T: Registers + ?Sized> Registers for &T {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
    fn write_block(&self, offset: usize, block: &[u8]) {
        (**self).write_block(offset, block)
    }
}

impl<T: Registers + ?Sized> Registers for Arc<T> {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
    fn write_block(&self, offset: usize, block: &[u8]) {
        (**self).write_block(offset, block)
    }
}

/// A memory-mapped register window.
///
/// Every access is a volatile 32-bit load or store through a
/// [`RWRegister`] cell. `Mmio` is a copyable handle; it doesn't own the
/// mapping.
#[derive(Clone, Copy, Debug)]
pub struct Mmio {
    base: NonNull<RWRegister<u32>>,
    len: usize,
}

// Safety: the window is device memory. Every access is a single volatile
// word access, which the hardware serializes.
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {
    /// Wrap the register window starting at `base`, `len` bytes long.
    ///
    /// # Safety
    ///
    /// `base` must point to a mapping of device registers that's valid for
    /// reads and writes of `len` bytes, for as long as any copy of this
    /// `Mmio` exists. `base` must be 4-byte aligned.
    pub const unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self {
            base: base.cast(),
            len,
        }
    }

    /// Size of the window, in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn register(&self, offset: usize) -> &RWRegister<u32> {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "register offset {offset:#x} is outside of the mapped window"
        );
        // Safety: in bounds and aligned per the assert above, and the
        // mapping is valid per the contract of new().
        unsafe { &*self.base.as_ptr().add(offset / 4) }
    }
}

impl Registers for Mmio {
    fn read(&self, offset: usize) -> u32 {
        self.register(offset).read()
    }
    fn write(&self, offset: usize, value: u32) {
        self.register(offset).write(value)
    }
}

/// Soft-reset key accepted by the FIFO reset registers.
pub const RESET_KEY: u32 = 0xA5;
