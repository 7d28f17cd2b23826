//! Attach drivers to devices by hardware identifier.
//!
//! A device tree or overlay description names each IP core by its VLNV
//! (vendor:library:name:version) string. [`Registry::attach`] looks the
//! identifier up once, and builds the matching driver.
//!
//! ```
//! use axi_stream::{registry::Description, Driver, Registry};
//! # fn run(registers: impl axi_stream::Registers + Clone) -> axi_stream::Result<()> {
//! let registry = Registry::new();
//! let driver = registry.attach(Description::new("xilinx.com:ip:axi_timer:2.0", registers))?;
//! assert!(matches!(driver, Driver::Timer(_)));
//! # Ok(())
//! # }
//! ```

use alloc::vec::Vec;

use crate::buffer::BufferManager;
use crate::dma::{DmaConfig, SimpleDma};
use crate::fifo::FifoStream;
use crate::ral::Registers;
use crate::timer::AxiTimer;
use crate::{Error, Result};

pub const AXI_DMA: &str = "xilinx.com:ip:axi_dma:7.1";
pub const AXI_FIFO: &str = "xilinx.com:ip:axi_fifo_mm_s:4.2";
pub const AXI_TIMER: &str = "xilinx.com:ip:axi_timer:2.0";

/// Fabric clock assumed when a description doesn't give one.
pub const DEFAULT_CLOCK_MHZ: f64 = 100.0;

/// Everything a constructor needs to know about one device.
#[derive(Debug, Clone)]
pub struct Description<'a, R> {
    /// The hardware identifier.
    pub vlnv: &'a str,
    pub registers: R,
    /// Coherent memory for drivers that need it.
    pub buffers: BufferManager,
    /// Clock feeding the device, for drivers that count time.
    pub clock_mhz: f64,
    pub dma: DmaConfig,
}

impl<'a, R> Description<'a, R> {
    /// Describe a device with heap buffers, the default clock, and the
    /// default DMA configuration.
    pub fn new(vlnv: &'a str, registers: R) -> Self {
        Self {
            vlnv,
            registers,
            buffers: BufferManager::heap(),
            clock_mhz: DEFAULT_CLOCK_MHZ,
            dma: DmaConfig::default(),
        }
    }
}

/// An attached driver.
#[derive(Debug)]
pub enum Driver<R: Registers> {
    Dma(SimpleDma<R>),
    Fifo(FifoStream<R>),
    Timer(AxiTimer<R>),
}

/// Builds a driver from a device description.
pub type Constructor<R> = fn(Description<'_, R>) -> Result<Driver<R>>;

/// Maps hardware identifiers to driver constructors.
pub struct Registry<R: Registers> {
    entries: Vec<(&'static str, Constructor<R>)>,
}

impl<R: Registers + Clone> Registry<R> {
    /// A registry that knows the AXI DMA, AXI4-Stream FIFO, and AXI timer.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(AXI_DMA, |desc| {
            Ok(Driver::Dma(SimpleDma::new(desc.registers, desc.buffers, desc.dma)))
        });
        registry.register(AXI_FIFO, |desc| Ok(Driver::Fifo(FifoStream::new(desc.registers))));
        registry.register(AXI_TIMER, |desc| {
            AxiTimer::new(desc.registers, desc.clock_mhz).map(Driver::Timer)
        });
        registry
    }
}

impl<R: Registers + Clone> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Registers> Registry<R> {
    /// A registry with no entries.
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Bind `vlnv` to `constructor`, replacing any earlier binding.
    pub fn register(&mut self, vlnv: &'static str, constructor: Constructor<R>) {
        match self.entries.iter_mut().find(|(known, _)| *known == vlnv) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((vlnv, constructor)),
        }
    }

    pub fn supports(&self, vlnv: &str) -> bool {
        self.entries.iter().any(|(known, _)| *known == vlnv)
    }

    /// Build the driver registered for `desc.vlnv`.
    pub fn attach(&self, desc: Description<'_, R>) -> Result<Driver<R>> {
        let Some((vlnv, constructor)) = self.entries.iter().find(|(known, _)| *known == desc.vlnv)
        else {
            log::warn!("no driver for {}", desc.vlnv);
            return Err(Error::UnknownDevice);
        };
        log::info!("attaching driver for {vlnv}");
        constructor(desc)
    }
}

impl<R: Registers> core::fmt::Debug for Registry<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(vlnv, _)| vlnv))
            .finish()
    }
}
