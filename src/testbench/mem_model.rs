use log::debug;

use super::{component::ClockedComponent, signals::SignalBus};
use crate::codec::MemoryImage;
use crate::error::HarnessError;

/// fixed idealized service delay of the bus.
///
/// the latency is a virtual duration, converted to whole clock edges the
/// same way the host rounds timed waits: 20 ns at a 10 ns clock holds the
/// request for two edges before it is serviced.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub latency_ns: u64,
    pub clock_period_ns: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            latency_ns: 20,
            clock_period_ns: 10,
        }
    }
}

impl MemoryConfig {
    pub fn latency_edges(&self) -> u64 {
        ((self.latency_ns + self.clock_period_ns - 1) / self.clock_period_ns).max(1)
    }
}

/// one request/ack round trip, alive only while it is being serviced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTransaction {
    pub addr: u32,
    pub is_write: bool,
    pub wdata: u32,
}

#[derive(Debug)]
enum BusState {
    Idle,
    Latency { txn: BusTransaction, remaining: u64 },
    Ack,
}

/// # Description
/// * the memory side of the bus: owns the word image and services one
///   transaction at a time
/// * Idle samples the request line each edge; an observed request is held
///   in Latency for the configured delay and then serviced, with the
///   acknowledge asserted for exactly one edge
/// * a second request arriving while one is in flight simply stays on the
///   request line until the acknowledge has cleared and Idle samples it,
///   so overlapping requesters serialize in observation order
#[derive(Debug)]
pub struct MemoryModel {
    image: MemoryImage,
    state: BusState,
    latency_edges: u64,
    reads: u64,
    writes: u64,
}

impl MemoryModel {
    pub fn new(config: MemoryConfig) -> Self {
        MemoryModel {
            image: MemoryImage::new(),
            state: BusState::Idle,
            latency_edges: config.latency_edges(),
            reads: 0,
            writes: 0,
        }
    }

    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut MemoryImage {
        &mut self.image
    }
}

impl ClockedComponent for MemoryModel {
    fn edge(&mut self, bus: &mut SignalBus) -> Result<(), HarnessError> {
        if !bus.sampled().reset_n {
            // reset drops the in flight transaction, the image survives
            self.state = BusState::Idle;
            bus.drive().mem_ack = false;
            return Ok(());
        }
        let state = std::mem::replace(&mut self.state, BusState::Idle);
        self.state = match state {
            BusState::Idle => {
                if bus.sampled().mem_req {
                    let sampled = bus.sampled();
                    let txn = BusTransaction {
                        addr: sampled.mem_addr,
                        is_write: sampled.mem_we,
                        wdata: sampled.mem_wdata,
                    };
                    BusState::Latency {
                        txn,
                        remaining: self.latency_edges,
                    }
                } else {
                    BusState::Idle
                }
            }
            BusState::Latency { txn, remaining } => {
                if remaining > 1 {
                    BusState::Latency {
                        txn,
                        remaining: remaining - 1,
                    }
                } else {
                    if txn.is_write {
                        self.image.write_word(txn.addr, txn.wdata);
                        self.writes += 1;
                        debug!(
                            "bus write #{}: addr=0x{:08x} data=0x{:08x}",
                            self.writes, txn.addr, txn.wdata
                        );
                    } else {
                        let data = self.image.read_word(txn.addr);
                        bus.drive().mem_rdata = data;
                        self.reads += 1;
                        debug!(
                            "bus read #{}: addr=0x{:08x} data=0x{:08x}",
                            self.reads, txn.addr, data
                        );
                    }
                    bus.drive().mem_ack = true;
                    BusState::Ack
                }
            }
            BusState::Ack => {
                bus.drive().mem_ack = false;
                BusState::Idle
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(model: &mut MemoryModel, bus: &mut SignalBus) {
        bus.latch();
        model.edge(bus).unwrap();
    }

    #[test]
    fn test_read_latency_and_single_edge_ack() {
        let mut bus = SignalBus::new(1);
        let mut model = MemoryModel::new(MemoryConfig::default());
        model.image_mut().write_word(0x40, 0x1234_5678);

        bus.drive().mem_req = true;
        bus.drive().mem_addr = 0x40;
        // edge 1 accepts the request, edges 2..3 are latency
        step(&mut model, &mut bus);
        assert!(!bus.observed().mem_ack);
        step(&mut model, &mut bus);
        assert!(!bus.observed().mem_ack);
        step(&mut model, &mut bus);
        assert!(bus.observed().mem_ack);
        assert_eq!(bus.observed().mem_rdata, 0x1234_5678);

        // the acknowledge is held for exactly one edge
        bus.drive().mem_req = false;
        step(&mut model, &mut bus);
        assert!(!bus.observed().mem_ack);
    }

    #[test]
    fn test_absent_word_reads_zero() {
        let mut bus = SignalBus::new(1);
        let mut model = MemoryModel::new(MemoryConfig::default());
        bus.drive().mem_req = true;
        bus.drive().mem_addr = 0xbeef_0000;
        while !bus.observed().mem_ack {
            step(&mut model, &mut bus);
        }
        assert_eq!(bus.observed().mem_rdata, 0);
    }

    #[test]
    fn test_write_overwrites_full_word() {
        let mut bus = SignalBus::new(1);
        let mut model = MemoryModel::new(MemoryConfig::default());
        model.image_mut().write_word(0x80, 0xffff_ffff);

        bus.drive().mem_req = true;
        bus.drive().mem_we = true;
        bus.drive().mem_addr = 0x80;
        bus.drive().mem_wdata = 0x0000_00aa;
        while !bus.observed().mem_ack {
            step(&mut model, &mut bus);
        }
        bus.drive().mem_req = false;
        bus.drive().mem_we = false;
        assert_eq!(model.image().read_word(0x80), 0x0000_00aa);
    }

    #[test]
    fn test_back_to_back_requests_serialize() {
        let mut bus = SignalBus::new(1);
        let mut model = MemoryModel::new(MemoryConfig::default());
        // keep the request line asserted across two transactions
        bus.drive().mem_req = true;
        bus.drive().mem_we = true;
        bus.drive().mem_addr = 0x10;
        bus.drive().mem_wdata = 1;
        while !bus.observed().mem_ack {
            step(&mut model, &mut bus);
        }
        bus.drive().mem_addr = 0x14;
        bus.drive().mem_wdata = 2;
        // ack must clear before the second request is picked up
        step(&mut model, &mut bus);
        assert!(!bus.observed().mem_ack);
        while !bus.observed().mem_ack {
            step(&mut model, &mut bus);
        }
        assert_eq!(model.image().read_word(0x10), 1);
        assert_eq!(model.image().read_word(0x14), 2);
    }

    #[test]
    fn test_reset_drops_transaction_keeps_image() {
        let mut bus = SignalBus::new(1);
        let mut model = MemoryModel::new(MemoryConfig::default());
        model.image_mut().write_word(0x20, 7);

        bus.drive().mem_req = true;
        bus.drive().mem_addr = 0x20;
        step(&mut model, &mut bus);
        bus.drive().reset_n = false;
        step(&mut model, &mut bus);
        bus.drive().reset_n = true;
        bus.drive().mem_req = false;
        for _ in 0..8 {
            step(&mut model, &mut bus);
            assert!(!bus.observed().mem_ack);
        }
        assert_eq!(model.image().read_word(0x20), 7);
    }

    #[test]
    fn test_latency_rounds_up_to_edges() {
        let config = MemoryConfig {
            latency_ns: 25,
            clock_period_ns: 10,
        };
        assert_eq!(config.latency_edges(), 3);
        assert_eq!(MemoryConfig::default().latency_edges(), 2);
    }
}
