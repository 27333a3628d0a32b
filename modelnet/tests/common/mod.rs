//! A sequential simulation driver over the deterministic test kernel: owns one base LP per torus
//! node, dispatches events in timestamp order, and records enough per-event state to replay the
//! whole run in reverse.

// not every scenario binary exercises every helper
#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc};

use warpnet_core::{BitField, Gid, SimTime};
use warpnet_modelnet::{
    BaseLp, FabricLp, ModelNet, NetId, Scheduler, SimEvent, SimulationError, WrappedMessage,
    torus::{LP_TYPE_NAME, TorusLp},
};
use warpnet_test_utils::{TestConfig, TestKernel, TestMapping};

const GROUP: &str = "MODELNET_GRP";

// DRIVER
// ================================================================================================

pub struct TorusGrid {
    pub dims: Vec<u32>,
    pub net: Arc<ModelNet>,
    pub mapping: TestMapping,
    pub kernel: TestKernel<SimEvent>,
    pub lps: BTreeMap<Gid, BaseLp>,
    pub history: Vec<ProcessedEvent>,
    pub delivered: Vec<Delivery>,
}

pub struct ProcessedEvent {
    pub dest: Gid,
    pub time: SimTime,
    pub msg: WrappedMessage,
    pub bits: BitField,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub dest: Gid,
    pub bytes: Vec<u8>,
}

/// Per-LP state snapshot used by reverse-correctness checks.
#[derive(Clone, PartialEq)]
pub struct Snapshot {
    nodes: BTreeMap<Gid, (bool, Scheduler, TorusLp)>,
    rng: BTreeMap<Gid, u64>,
}

impl Snapshot {
    /// Returns the captured state of one node.
    pub fn node_state(&self, gid: Gid) -> &(bool, Scheduler, TorusLp) {
        &self.nodes[&gid]
    }
}

pub fn base_config(dims: &[u32]) -> TestConfig {
    let dim_length =
        dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(" ");
    TestConfig::new()
        .with("PARAMS", "modelnet_scheduler", "fcfs")
        .with("PARAMS", "packet_size", "512")
        .with("PARAMS", "n_dims", &dims.len().to_string())
        .with("PARAMS", "dim_length", &dim_length)
        .with("PARAMS", "link_bandwidth", "1.0")
        .with("PARAMS", "buffer_size", "8")
        .with("PARAMS", "num_vc", "1")
        // four chunks per 512-byte packet; an eight-chunk message burst exactly fits the buffer
        .with("PARAMS", "chunk_size", "128")
}

impl TorusGrid {
    /// Builds a torus of the given shape with one server and one torus node per repetition.
    pub fn build(dims: &[u32], seed: u64) -> Self {
        Self::build_with(dims, seed, |config| config)
    }

    /// Same as [`TorusGrid::build`], with a hook for overriding configuration values.
    pub fn build_with(
        dims: &[u32],
        seed: u64,
        override_config: impl FnOnce(TestConfig) -> TestConfig,
    ) -> Self {
        let nodes: u32 = dims.iter().product();
        let mapping = TestMapping::new(GROUP, nodes)
            .with_lp_type("server", 1)
            .with_lp_type(LP_TYPE_NAME, 1);
        let config = override_config(base_config(dims));
        let net = Arc::new(
            ModelNet::configure(&config, Arc::new(mapping.clone()), &[NetId::Torus]).unwrap(),
        );
        let kernel = TestKernel::new(seed, mapping.num_lps());

        let mut lps = BTreeMap::new();
        for node in 0..nodes {
            let gid = mapping.gid_of(LP_TYPE_NAME, node, 0);
            lps.insert(gid, BaseLp::init(net.clone(), gid).unwrap());
        }

        Self {
            dims: dims.to_vec(),
            net,
            mapping,
            kernel,
            lps,
            history: Vec::new(),
            delivered: Vec::new(),
        }
    }

    // PLACEMENT
    // --------------------------------------------------------------------------------------------

    fn flat(&self, coords: &[u32]) -> u32 {
        assert_eq!(coords.len(), self.dims.len());
        let mut factor = 1;
        let mut flat = 0;
        for (coord, len) in coords.iter().zip(self.dims.iter()) {
            assert!(coord < len);
            flat += coord * factor;
            factor *= len;
        }
        flat
    }

    pub fn node_gid(&self, coords: &[u32]) -> Gid {
        self.mapping.gid_of(LP_TYPE_NAME, self.flat(coords), 0)
    }

    pub fn server_gid(&self, coords: &[u32]) -> Gid {
        self.mapping.gid_of("server", self.flat(coords), 0)
    }

    // WORKLOAD INJECTION
    // --------------------------------------------------------------------------------------------

    pub fn send_message(
        &mut self,
        from: &[u32],
        to: &[u32],
        size: u64,
        remote: &[u8],
        local: &[u8],
    ) {
        let sender = self.server_gid(from);
        let dest = self.server_gid(to);
        self.net
            .event(
                NetId::Torus,
                "request",
                dest,
                size,
                SimTime::ZERO,
                remote,
                local,
                &mut self.kernel.lp(sender),
            )
            .unwrap();
    }

    pub fn send_pull(
        &mut self,
        from: &[u32],
        to: &[u32],
        request_size: u64,
        pull_size: u64,
        remote: &[u8],
    ) {
        let sender = self.server_gid(from);
        let dest = self.server_gid(to);
        self.net
            .pull_event(
                NetId::Torus,
                "pull",
                dest,
                request_size,
                pull_size,
                SimTime::ZERO,
                remote,
                &mut self.kernel.lp(sender),
            )
            .unwrap();
    }

    // EVENT LOOP
    // --------------------------------------------------------------------------------------------

    /// Processes the next pending event. Returns false once the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        let Some(queued) = self.kernel.pop() else {
            return Ok(false);
        };
        match queued.event {
            SimEvent::ModelNet(mut msg) => {
                let mut bits = BitField::new();
                let base = self.lps.get_mut(&queued.dest).expect("event for an unknown LP");
                base.forward(&mut bits, &mut msg, &mut self.kernel.lp(queued.dest))?;
                self.history.push(ProcessedEvent {
                    dest: queued.dest,
                    time: queued.time,
                    msg,
                    bits,
                });
            },
            SimEvent::Payload(bytes) => {
                self.delivered.push(Delivery { dest: queued.dest, bytes });
            },
        }
        Ok(true)
    }

    /// Processes up to `max_events` events; returns how many were processed.
    pub fn run(&mut self, max_events: usize) -> Result<usize, SimulationError> {
        let mut processed = 0;
        while processed < max_events && self.step()? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Drains the event queue completely.
    pub fn run_to_completion(&mut self) -> Result<usize, SimulationError> {
        let processed = self.run(1_000_000)?;
        assert_eq!(self.kernel.pending_count(), 0, "simulation did not quiesce");
        Ok(processed)
    }

    /// Replays every processed event's reverse handler, newest first.
    pub fn reverse_all(&mut self) -> Result<(), SimulationError> {
        while let Some(mut event) = self.history.pop() {
            self.kernel.set_now(event.time);
            let base = self.lps.get_mut(&event.dest).expect("event for an unknown LP");
            base.reverse(&mut event.bits, &mut event.msg, &mut self.kernel.lp(event.dest))?;
        }
        Ok(())
    }

    // INSPECTION
    // --------------------------------------------------------------------------------------------

    pub fn torus_lp(&self, gid: Gid) -> &TorusLp {
        self.lps[&gid]
            .fabric_lp()
            .as_any()
            .downcast_ref()
            .expect("base LP does not wrap a torus node")
    }

    pub fn snapshot(&self) -> Snapshot {
        let nodes = self
            .lps
            .iter()
            .map(|(gid, base)| {
                let node = self.torus_lp(*gid).clone();
                (*gid, (base.in_sched_loop(), base.scheduler().clone(), node))
            })
            .collect();
        Snapshot { nodes, rng: self.kernel.rng_positions() }
    }

    /// Number of SCHED_NEXT events pending for the given LP.
    pub fn pending_sched_next(&self, gid: Gid) -> usize {
        self.kernel
            .pending()
            .filter(|queued| {
                queued.dest == gid
                    && matches!(
                        &queued.event,
                        SimEvent::ModelNet(msg) if msg.body.tag() == "SCHED_NEXT"
                    )
            })
            .count()
    }

    /// Asserts invariant bounds on every virtual channel buffer.
    pub fn assert_buffers_in_bounds(&self, capacity: u32) {
        use warpnet_modelnet::torus::Direction;
        for gid in self.lps.keys() {
            let node = self.torus_lp(*gid);
            for dim in 0..self.dims.len() {
                for dir in [Direction::Minus, Direction::Plus] {
                    let occupancy = node.buffer_occupancy(dim, dir);
                    assert!(
                        occupancy <= capacity,
                        "buffer at LP {gid} dim {dim} dir {dir} holds {occupancy} > {capacity}"
                    );
                }
            }
        }
    }
}
