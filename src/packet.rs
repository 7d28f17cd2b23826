//! Received packets.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::ops::Deref;

/// One length-delimited unit read from a streaming FIFO.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Packet(Vec<u32>);

impl Packet {
    pub fn new(words: Vec<u32>) -> Self {
        Packet(words)
    }

    pub fn words(&self) -> &[u32] {
        &self.0
    }

    pub fn into_words(self) -> Vec<u32> {
        self.0
    }

    /// The packet as little-endian bytes, the way it crossed the stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.0).to_vec()
    }
}

impl Deref for Packet {
    type Target = [u32];
    fn deref(&self) -> &[u32] {
        &self.0
    }
}

impl From<Vec<u32>> for Packet {
    fn from(words: Vec<u32>) -> Self {
        Packet(words)
    }
}

/// Packets in arrival order.
///
/// The FIFO driver appends; one consumer drains. Both sides may run
/// concurrently: an append and a drain never interleave, and a drain takes
/// every packet appended before it, oldest first.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: spin::Mutex<VecDeque<Packet>>,
}

impl PacketQueue {
    pub const fn new() -> Self {
        Self {
            packets: spin::Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn append(&self, packet: Packet) {
        self.packets.lock().push_back(packet);
    }

    /// Take every queued packet, oldest first.
    pub fn drain(&self) -> Vec<Packet> {
        let mut packets = self.packets.lock();
        packets.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }
}
