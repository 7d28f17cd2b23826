//! DMA-coherent buffers.
//!
//! A [`CoherentBuffer`] is memory that the host and the fabric observe
//! identically without explicit cache maintenance. Where that memory comes
//! from is platform business, so allocation goes through the
//! [`CoherentAllocator`] trait. [`HeapAllocator`] covers identity-mapped
//! targets where ordinary heap memory is device visible.
//!
//! A buffer is released exactly once: either by [`CoherentBuffer::release`],
//! which consumes it, or when it drops. Buffers that a channel is
//! transferring are owned by that channel, so they can't be released out
//! from under the engine.

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use alloc::sync::Arc;
use core::fmt;
use core::ptr::NonNull;

use crate::element::{Element, ElementType, Shape};
use crate::{Error, Result};

/// A contiguous region handed out by a [`CoherentAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Host (CPU) address of the first byte.
    pub virt: NonNull<u8>,
    /// Bus address the DMA engine uses for the first byte.
    pub phys: u64,
    /// Length in bytes.
    pub len: usize,
}

/// Source of device-visible memory.
pub trait CoherentAllocator: Send + Sync {
    /// Allocate `len` bytes of coherent memory. `len` is never zero.
    fn allocate(&self, len: usize) -> Result<Region>;

    /// Return a region to the allocator.
    ///
    /// # Safety
    ///
    /// `region` must have come from `allocate` on this allocator, it must not
    /// be released twice, and no transfer may still reference it.
    unsafe fn release(&self, region: Region);
}

/// Alignment of [`HeapAllocator`] regions. One cache line on the targets
/// we care about; large enough for every [`ElementType`].
pub const HEAP_ALIGN: usize = 64;

/// Coherent memory from the global heap, for identity-mapped systems.
///
/// Regions are zero filled and their bus address equals their host address.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl CoherentAllocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Result<Region> {
        let layout = Layout::from_size_align(len, HEAP_ALIGN)
            .map_err(|_| Error::InvalidArgument("allocation is too large"))?;
        // Safety: callers never ask for zero bytes.
        let virt = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(Error::OutOfMemory(len))?;
        Ok(Region {
            virt,
            phys: virt.as_ptr() as usize as u64,
            len,
        })
    }

    unsafe fn release(&self, region: Region) {
        // Safety: the layout matches the one used in allocate, since the
        // region length is never modified.
        unsafe {
            dealloc(
                region.virt.as_ptr(),
                Layout::from_size_align_unchecked(region.len, HEAP_ALIGN),
            )
        }
    }
}

/// A hardware-visible buffer with a fixed shape and element type.
pub struct CoherentBuffer {
    region: Region,
    shape: Shape,
    ty: ElementType,
    allocator: Arc<dyn CoherentAllocator>,
}

// Safety: the buffer uniquely owns its region. Shared references only allow
// reads.
unsafe impl Send for CoherentBuffer {}
unsafe impl Sync for CoherentBuffer {}

#[allow(clippy::len_without_is_empty)] // Zero-sized buffers can't be allocated.
impl CoherentBuffer {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.ty
    }

    /// Size of the buffer, in bytes.
    pub fn len_bytes(&self) -> usize {
        self.region.len
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.region.len / self.ty.width()
    }

    /// The address the DMA engine uses for this buffer.
    pub fn phys_addr(&self) -> u64 {
        self.region.phys
    }

    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the region is valid for len bytes while we own it.
        unsafe { core::slice::from_raw_parts(self.region.virt.as_ptr(), self.region.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // Safety: as above, and &mut self gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.region.virt.as_ptr(), self.region.len) }
    }

    /// View the buffer as elements of type `E`.
    ///
    /// Fails if `E` isn't the buffer's element type.
    pub fn as_slice<E: Element>(&self) -> Result<&[E]> {
        self.check_type::<E>()?;
        Ok(bytemuck::cast_slice(self.as_bytes()))
    }

    /// Mutably view the buffer as elements of type `E`.
    pub fn as_mut_slice<E: Element>(&mut self) -> Result<&mut [E]> {
        self.check_type::<E>()?;
        Ok(bytemuck::cast_slice_mut(self.as_bytes_mut()))
    }

    /// Copy `data` into the front of the buffer.
    pub fn copy_from<E: Element>(&mut self, data: &[E]) -> Result<()> {
        let dst = self.as_mut_slice::<E>()?;
        if data.len() > dst.len() {
            return Err(Error::InvalidArgument("data is larger than the buffer"));
        }
        dst[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Release the buffer back to its allocator.
    pub fn release(self) {
        drop(self)
    }

    fn check_type<E: Element>(&self) -> Result<()> {
        if E::TYPE == self.ty {
            Ok(())
        } else {
            Err(Error::InvalidArgument("element type doesn't match the buffer"))
        }
    }
}

impl Drop for CoherentBuffer {
    fn drop(&mut self) {
        log::trace!("releasing {} coherent bytes at {:#x}", self.region.len, self.region.phys);
        // Safety: the region came from this allocator, and drop runs once.
        // Buffers referenced by a transfer are owned by their channel until
        // the transfer completes.
        unsafe { self.allocator.release(self.region) }
    }
}

impl fmt::Debug for CoherentBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoherentBuffer")
            .field("phys", &format_args!("{:#x}", self.region.phys))
            .field("len", &self.region.len)
            .field("shape", &self.shape)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Allocates and releases [`CoherentBuffer`]s.
///
/// Cheap to clone; clones share the allocator.
#[derive(Clone)]
pub struct BufferManager {
    allocator: Arc<dyn CoherentAllocator>,
}

impl BufferManager {
    pub fn new(allocator: Arc<dyn CoherentAllocator>) -> Self {
        Self { allocator }
    }

    /// A manager backed by [`HeapAllocator`].
    pub fn heap() -> Self {
        Self::new(Arc::new(HeapAllocator))
    }

    /// Allocate a buffer for `shape` elements of type `ty`.
    ///
    /// Fails with `InvalidArgument` if the shape denotes zero elements.
    pub fn allocate(&self, shape: impl Into<Shape>, ty: ElementType) -> Result<CoherentBuffer> {
        let shape = shape.into();
        let len = shape.byte_len(ty)?;
        let region = self.allocator.allocate(len)?;
        log::trace!("allocated {len} coherent bytes at {:#x}", region.phys);
        Ok(CoherentBuffer {
            region,
            shape,
            ty,
            allocator: Arc::clone(&self.allocator),
        })
    }

    /// Allocate a one-dimensional buffer holding a copy of `data`.
    pub fn copy_from<E: Element>(&self, data: &[E]) -> Result<CoherentBuffer> {
        let mut buffer = self.allocate(data.len(), E::TYPE)?;
        buffer.copy_from(data)?;
        Ok(buffer)
    }

    /// Release `buffer`. Equivalent to dropping it.
    pub fn release(&self, buffer: CoherentBuffer) {
        buffer.release()
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager").finish_non_exhaustive()
    }
}
