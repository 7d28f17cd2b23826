//! The AXI timer driver, timer 0 only.
//!
//! The counter runs up from the load value and, with auto-reload, wraps back
//! to it. Intervals are programmed as "start this many ticks before the
//! wrap", so an interval of `n` ticks loads `max_count - (n - 1)`.

use crate::ral::{self, timer::tcsr0, Registers};
use crate::{Error, Result};

/// Timer 0 of an AXI timer.
///
/// The driver keeps a shadow of TCSR0 and writes the whole register on every
/// change. Control bits other than the ones this driver sets stay zero.
#[derive(Debug)]
pub struct AxiTimer<R> {
    registers: R,
    ctrl: u32,
    clock_mhz: f64,
    max_count: u32,
}

impl<R: Registers> AxiTimer<R> {
    /// Wrap a timer clocked at `clock_mhz`.
    pub fn new(registers: R, clock_mhz: f64) -> Result<Self> {
        if !(clock_mhz > 0.0) || !clock_mhz.is_finite() {
            return Err(Error::InvalidArgument("timer clock must be positive"));
        }
        Ok(Self {
            registers,
            ctrl: 0,
            clock_mhz,
            max_count: u32::MAX,
        })
    }

    pub fn clock_mhz(&self) -> f64 {
        self.clock_mhz
    }

    fn set_ctrl(&mut self, bits: u32) {
        self.ctrl |= bits;
        self.registers.write(ral::timer::TCSR0, self.ctrl);
    }

    fn clear_ctrl(&mut self, bits: u32) {
        self.ctrl &= !bits;
        self.registers.write(ral::timer::TCSR0, self.ctrl);
    }

    /// Start counting, with auto-reload.
    pub fn start(&mut self) {
        self.set_ctrl(tcsr0::ENT0::mask | tcsr0::ARHT0::mask);
        log::debug!("timer started");
    }

    /// Stop counting. The count is kept.
    pub fn stop(&mut self) {
        self.clear_ctrl(tcsr0::ENT0::mask);
        log::debug!("timer stopped");
    }

    /// The current count.
    pub fn read_count(&self) -> u32 {
        self.registers.read(ral::timer::TCR0)
    }

    /// Seconds between two counts, where `t2` was read after `t1`.
    ///
    /// One wrap of the counter between the reads is accounted for.
    pub fn elapsed_secs(&self, t1: u32, t2: u32) -> f64 {
        f64::from(t2.wrapping_sub(t1)) / (1e6 * self.clock_mhz)
    }

    /// Program an interval of `ticks` counts.
    ///
    /// Intervals longer than the counter wrap modulo 2^32.
    pub fn set_interval_ticks(&mut self, ticks: u64) -> Result<()> {
        if ticks == 0 {
            return Err(Error::InvalidArgument("interval must be at least one tick"));
        }
        let span = u64::from(self.max_count) + 1;
        let load = u64::from(self.max_count) - ((ticks - 1) % span);
        self.clear_ctrl(tcsr0::LOAD0::mask);
        self.registers.write(ral::timer::TLR0, load as u32);
        self.set_ctrl(tcsr0::LOAD0::mask);
        self.clear_ctrl(tcsr0::LOAD0::mask);
        log::debug!("timer interval {ticks} ticks, load {load:#x}");
        Ok(())
    }

    /// Program the shortest interval that's at least `secs` long.
    pub fn set_interval_secs(&mut self, secs: f64) -> Result<()> {
        if !(secs > 0.0) || !secs.is_finite() {
            return Err(Error::InvalidArgument("interval must be positive"));
        }
        let exact = secs * 1e6 * self.clock_mhz;
        let mut ticks = exact as u64;
        if (ticks as f64) < exact {
            ticks += 1;
        }
        self.set_interval_ticks(ticks.max(1))
    }

    /// Enable or disable the timer's interrupt output.
    pub fn enable_interrupt(&mut self, enable: bool) {
        if enable {
            self.set_ctrl(tcsr0::ENIT0::mask);
        } else {
            self.clear_ctrl(tcsr0::ENIT0::mask);
        }
    }
}
