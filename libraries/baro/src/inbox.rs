//! Inbox for samples delivered from callback contexts
//!
//! Serial parsers and CAN handlers run outside the scheduler task. They post
//! packets here without taking the frontend lock; the frontend drains the
//! queue at the start of every tick, before any backend refresh.

use heapless::mpmc::MpMcQueue;

/// Capacity of the inbox. Must be a power of two.
pub const INBOX_CAPACITY: usize = 16;

/// Transport a packet arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedSource {
    /// MultiWii serial protocol
    Msp,
    /// External AHRS serial feed
    ExternalAhrs,
    /// CAN bus node
    Can,
}

/// A pressure/temperature sample from a message stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectedPacket {
    pub source: InjectedSource,
    /// Sensor number on the remote side
    pub sensor_id: u8,
    pub pressure_pa: f32,
    pub temperature_c: f32,
}

/// Lock-free multi-producer queue of injected packets
pub struct Inbox {
    queue: MpMcQueue<InjectedPacket, INBOX_CAPACITY>,
}

impl Inbox {
    pub const fn new() -> Self {
        Self {
            queue: MpMcQueue::new(),
        }
    }

    /// Post a packet. Returns it back if the inbox is full.
    pub fn post(&self, packet: InjectedPacket) -> Result<(), InjectedPacket> {
        self.queue.enqueue(packet)
    }

    /// Take the oldest packet
    pub fn take(&self) -> Option<InjectedPacket> {
        self.queue.dequeue()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(sensor_id: u8) -> InjectedPacket {
        InjectedPacket {
            source: InjectedSource::Msp,
            sensor_id,
            pressure_pa: 101000.0,
            temperature_c: 21.0,
        }
    }

    #[test]
    fn test_fifo_order() {
        let inbox = Inbox::new();
        inbox.post(packet(1)).unwrap();
        inbox.post(packet(2)).unwrap();
        assert_eq!(inbox.take().map(|p| p.sensor_id), Some(1));
        assert_eq!(inbox.take().map(|p| p.sensor_id), Some(2));
        assert!(inbox.take().is_none());
    }

    #[test]
    fn test_full_inbox_returns_packet() {
        let inbox = Inbox::new();
        for i in 0..INBOX_CAPACITY {
            inbox.post(packet(i as u8)).expect("inbox should have room");
        }
        let rejected = inbox.post(packet(99)).expect_err("inbox should be full");
        assert_eq!(rejected.sensor_id, 99);
    }

    #[test]
    fn test_post_from_threads() {
        use std::sync::Arc;
        let inbox = Arc::new(Inbox::new());
        let handles: Vec<_> = (0..4u8)
            .map(|id| {
                let inbox = Arc::clone(&inbox);
                std::thread::spawn(move || inbox.post(packet(id)).is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        let mut ids: Vec<u8> = std::iter::from_fn(|| inbox.take()).map(|p| p.sensor_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
