//! Register models and helpers for unit tests.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, Waker};

use crate::buffer::{CoherentAllocator, HeapAllocator, Region};
use crate::channel::Direction;
use crate::dma::{DmaConfig, DmaControl, DmaStatus};
use crate::fifo::FifoEvents;
use crate::interrupt::Interrupt;
use crate::ral::{self, Registers};
use crate::Result;

/// A DMA configuration that accepts host heap addresses.
pub fn config() -> DmaConfig {
    DmaConfig {
        addr_64bit: true,
        ..DmaConfig::default()
    }
}

struct ThreadWaker(std::thread::Thread);

impl std::task::Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
}

/// Run a future to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
        std::thread::park();
    }
}

/// An interrupt line raised by the test.
#[derive(Default)]
pub struct TestIrq {
    state: spin::Mutex<(u32, Option<Waker>)>,
}

impl TestIrq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.0 += 1;
            state.1.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Interrupt for TestIrq {
    fn wait(&self) -> impl Future<Output = ()> {
        core::future::poll_fn(move |cx| {
            let mut state = self.state.lock();
            if state.0 > 0 {
                state.0 -= 1;
                Poll::Ready(())
            } else {
                state.1 = Some(cx.waker().clone());
                Poll::Pending
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocEvent {
    Allocate { id: usize, len: usize },
    Release { id: usize },
}

#[derive(Default)]
struct Allocations {
    next_id: usize,
    next_phys: u64,
    live: BTreeMap<usize, usize>,
    events: Vec<AllocEvent>,
}

/// A heap allocator that records every allocation and release.
///
/// With a phys base, bus addresses are handed out sequentially from that
/// base instead of matching host addresses. Such buffers can't be used for
/// data movement by [`DmaModel`].
#[derive(Default)]
pub struct TrackingAllocator {
    phys_base: Option<u64>,
    state: spin::Mutex<Allocations>,
}

impl TrackingAllocator {
    pub fn with_phys_base(base: u64) -> Self {
        Self {
            phys_base: Some(base),
            state: Default::default(),
        }
    }

    pub fn events(&self) -> Vec<AllocEvent> {
        self.state.lock().events.clone()
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn releases(&self) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| matches!(event, AllocEvent::Release { .. }))
            .count()
    }
}

impl CoherentAllocator for TrackingAllocator {
    fn allocate(&self, len: usize) -> Result<Region> {
        let mut region = HeapAllocator.allocate(len)?;
        let mut state = self.state.lock();
        if let Some(base) = self.phys_base {
            region.phys = base + state.next_phys;
            state.next_phys += len as u64;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(region.virt.as_ptr() as usize, id);
        state.events.push(AllocEvent::Allocate { id, len });
        Ok(region)
    }

    unsafe fn release(&self, region: Region) {
        {
            let mut state = self.state.lock();
            let id = state
                .live
                .remove(&(region.virt.as_ptr() as usize))
                .expect("released a region that isn't live");
            state.events.push(AllocEvent::Release { id });
        }
        // Safety: forwarded from the caller; the region came from the heap.
        unsafe { HeapAllocator.release(region) }
    }
}

/// A register file that remembers writes.
#[derive(Default)]
pub struct RegisterLog {
    state: spin::Mutex<(BTreeMap<usize, u32>, Vec<(usize, u32)>)>,
}

impl RegisterLog {
    /// Preset a register without logging a write.
    pub fn set(&self, offset: usize, value: u32) {
        self.state.lock().0.insert(offset, value);
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().1.clone()
    }

    pub fn last_write(&self, offset: usize) -> Option<u32> {
        let state = self.state.lock();
        state
            .1
            .iter()
            .rev()
            .find(|&&(at, _)| at == offset)
            .map(|&(_, value)| value)
    }
}

impl Registers for RegisterLog {
    fn read(&self, offset: usize) -> u32 {
        self.state.lock().0.get(&offset).copied().unwrap_or(0)
    }
    fn write(&self, offset: usize, value: u32) {
        let mut state = self.state.lock();
        state.0.insert(offset, value);
        state.1.push((offset, value));
    }
}

#[derive(Default)]
struct DmaChannelModel {
    dmacr: u32,
    dmasr: u32,
    addr: u64,
    length: u32,
    pending: Option<(u64, usize)>,
}

impl DmaChannelModel {
    fn halted() -> Self {
        Self {
            dmasr: DmaStatus::HALTED.bits(),
            ..Default::default()
        }
    }
}

struct DmaState {
    channels: [DmaChannelModel; 2],
    auto_complete: bool,
    stuck: bool,
    stream: VecDeque<u8>,
    writes: Vec<(usize, u32)>,
}

/// A simple-mode AXI DMA engine whose MM2S output feeds its S2MM input.
///
/// Bus addresses are host addresses. An auto-completing model finishes each
/// transfer as soon as its length is written; a deferred model waits for
/// [`complete`](Self::complete).
pub struct DmaModel {
    state: spin::Mutex<DmaState>,
}

const TX: usize = 0;
const RX: usize = 1;

fn index<D: Direction>() -> usize {
    if D::BASE == ral::dma::MM2S {
        TX
    } else {
        RX
    }
}

impl DmaModel {
    fn new(auto_complete: bool) -> Self {
        Self {
            state: spin::Mutex::new(DmaState {
                channels: [DmaChannelModel::halted(), DmaChannelModel::halted()],
                auto_complete,
                stuck: false,
                stream: VecDeque::new(),
                writes: Vec::new(),
            }),
        }
    }

    pub fn loopback() -> Self {
        Self::new(true)
    }

    pub fn deferred() -> Self {
        Self::new(false)
    }

    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.state.lock().auto_complete = auto_complete;
    }

    /// A stuck engine keeps running after its run bit is cleared.
    pub fn set_stuck(&self, stuck: bool) {
        self.state.lock().stuck = stuck;
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Bytes sent but not yet received.
    pub fn stream_bytes(&self) -> Vec<u8> {
        self.state.lock().stream.iter().copied().collect()
    }

    pub fn stream_words(&self) -> Vec<u32> {
        self.stream_bytes()
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect()
    }

    pub fn status<D: Direction>(&self) -> DmaStatus {
        DmaStatus::from_bits_retain(self.state.lock().channels[index::<D>()].dmasr)
    }

    pub fn is_running<D: Direction>(&self) -> bool {
        !self.status::<D>().contains(DmaStatus::HALTED)
    }

    /// Finish the pending transfer of `D`.
    pub fn complete<D: Direction>(&self) {
        let mut state = self.state.lock();
        Self::finish(&mut state, index::<D>());
    }

    /// Fail the pending transfer of `D` with `error` bits.
    pub fn fault<D: Direction>(&self, error: DmaStatus) {
        let mut state = self.state.lock();
        let channel = &mut state.channels[index::<D>()];
        channel.pending = None;
        channel.dmasr |= (error | DmaStatus::ERR_IRQ | DmaStatus::HALTED).bits();
    }

    fn finish(state: &mut DmaState, idx: usize) {
        let Some((addr, len)) = state.channels[idx].pending.take() else {
            return;
        };
        if idx == TX {
            // Safety: bus addresses are host addresses of live buffers.
            let data = unsafe { core::slice::from_raw_parts(addr as usize as *const u8, len) };
            state.stream.extend(data);
        } else {
            let n = len.min(state.stream.len());
            // Safety: as above.
            let data = unsafe { core::slice::from_raw_parts_mut(addr as usize as *mut u8, n) };
            for byte in data.iter_mut() {
                *byte = state.stream.pop_front().unwrap_or_default();
            }
            state.channels[idx].length = n as u32;
        }
        state.channels[idx].dmasr |= (DmaStatus::IDLE | DmaStatus::IOC_IRQ).bits();
    }
}

impl Registers for DmaModel {
    fn read(&self, offset: usize) -> u32 {
        let state = self.state.lock();
        let (idx, local) = split_dma_offset(offset);
        let channel = &state.channels[idx];
        match local {
            ral::dma::DMACR => channel.dmacr,
            ral::dma::DMASR => channel.dmasr,
            ral::dma::ADDR => channel.addr as u32,
            ral::dma::ADDR_MSB => (channel.addr >> 32) as u32,
            ral::dma::LENGTH => channel.length,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = self.state.lock();
        state.writes.push((offset, value));
        let (idx, local) = split_dma_offset(offset);
        match local {
            ral::dma::DMACR => {
                let control = DmaControl::from_bits_retain(value);
                if control.contains(DmaControl::RESET) {
                    state.channels = [DmaChannelModel::halted(), DmaChannelModel::halted()];
                    return;
                }
                let stuck = state.stuck;
                let channel = &mut state.channels[idx];
                channel.dmacr = value;
                if control.contains(DmaControl::RUN) {
                    channel.dmasr &= !DmaStatus::HALTED.bits();
                    channel.dmasr |= DmaStatus::IDLE.bits();
                } else if !stuck {
                    channel.dmasr |= DmaStatus::HALTED.bits();
                }
            }
            ral::dma::DMASR => {
                let irqs = DmaStatus::IOC_IRQ | DmaStatus::DLY_IRQ | DmaStatus::ERR_IRQ;
                state.channels[idx].dmasr &= !(value & irqs.bits());
            }
            ral::dma::ADDR => {
                let channel = &mut state.channels[idx];
                channel.addr = (channel.addr & !0xffff_ffff) | u64::from(value);
            }
            ral::dma::ADDR_MSB => {
                let channel = &mut state.channels[idx];
                channel.addr = (channel.addr & 0xffff_ffff) | (u64::from(value) << 32);
            }
            ral::dma::LENGTH => {
                let channel = &mut state.channels[idx];
                channel.length = value;
                channel.dmasr &= !DmaStatus::IDLE.bits();
                channel.pending = Some((channel.addr, value as usize));
                if state.auto_complete {
                    Self::finish(&mut state, idx);
                }
            }
            _ => {}
        }
    }
}

fn split_dma_offset(offset: usize) -> (usize, usize) {
    if offset >= ral::dma::S2MM {
        (RX, offset - ral::dma::S2MM)
    } else {
        (TX, offset - ral::dma::MM2S)
    }
}

struct FifoState {
    isr: u32,
    ier: u32,
    room: Vec<u32>,
    room_reads: usize,
    rx: VecDeque<VecDeque<u32>>,
    tx: Vec<u32>,
    sent: Vec<Vec<u32>>,
    writes: Vec<(usize, u32)>,
    reads: usize,
}

/// An AXI4-Stream FIFO with a scripted receive side.
pub struct FifoModel {
    state: spin::Mutex<FifoState>,
}

impl FifoModel {
    pub fn new() -> Self {
        Self {
            state: spin::Mutex::new(FifoState {
                isr: 0,
                ier: 0,
                room: alloc::vec![512],
                room_reads: 0,
                rx: VecDeque::new(),
                tx: Vec::new(),
                sent: Vec::new(),
                writes: Vec::new(),
                reads: 0,
            }),
        }
    }

    /// TDFV values for successive reads. The last one repeats.
    pub fn set_room_sequence(&self, room: &[u32]) {
        let mut state = self.state.lock();
        state.room = room.to_vec();
        state.room_reads = 0;
    }

    pub fn push_rx_packet(&self, words: &[u32]) {
        self.state.lock().rx.push_back(words.iter().copied().collect());
    }

    pub fn raise(&self, events: FifoEvents) {
        self.state.lock().isr |= events.bits();
    }

    pub fn sent_packets(&self) -> Vec<Vec<u32>> {
        self.state.lock().sent.clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }
}

impl Registers for FifoModel {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state.lock();
        state.reads += 1;
        match offset {
            ral::fifo::ISR => state.isr,
            ral::fifo::IER => state.ier,
            ral::fifo::TDFV => {
                let at = state.room_reads.min(state.room.len() - 1);
                state.room_reads += 1;
                state.room[at]
            }
            ral::fifo::RDFO => state.rx.iter().map(|packet| packet.len() as u32).sum(),
            ral::fifo::RLR => state
                .rx
                .front()
                .map_or(0, |packet| packet.len() as u32 * 4),
            ral::fifo::RDFD => {
                let word = state
                    .rx
                    .front_mut()
                    .and_then(|packet| packet.pop_front())
                    .unwrap_or_default();
                if state.rx.front().is_some_and(|packet| packet.is_empty()) {
                    state.rx.pop_front();
                }
                word
            }
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = self.state.lock();
        state.writes.push((offset, value));
        match offset {
            ral::fifo::ISR => state.isr &= !value,
            ral::fifo::IER => state.ier = value,
            ral::fifo::TDFD => state.tx.push(value),
            ral::fifo::TLR => {
                let packet = core::mem::take(&mut state.tx);
                state.sent.push(packet);
            }
            ral::fifo::TDFR if value == ral::RESET_KEY => {
                state.tx.clear();
                state.isr |= FifoEvents::TRC.bits();
            }
            ral::fifo::RDFR if value == ral::RESET_KEY => {
                state.rx.clear();
                state.isr |= FifoEvents::RRC.bits();
            }
            _ => {}
        }
    }
}
