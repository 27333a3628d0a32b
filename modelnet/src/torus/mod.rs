use std::{
    any::Any,
    fmt::{self, Display},
    sync::{Arc, Mutex},
};

use smallvec::SmallVec;
use warpnet_core::{BitField, ConfigSource, Gid, Lp, Mapping, SimTime};

use crate::{
    Body, Fabric, FabricLp, FabricMessage, ModelNet, NetId, PacketEventArgs, Payload, SetupError,
    SimEvent, SimulationError, WrappedMessage, stats::StatsTable,
};

mod routing;


// CONSTANTS
// ================================================================================================

/// LP type name the torus node registers under.
pub const LP_TYPE_NAME: &str = "modelnet_torus";

const LP_TYPE_NAMES: [&str; 1] = [LP_TYPE_NAME];

/// Mean interval feeding the exponential jitter on chunk injection and hop traversal.
const MEAN_INTERVAL: f64 = 100.0;

/// Dimension length substituted for zero entries in the configuration.
const DEFAULT_DIM_LENGTH: u32 = 8;

/// Default chunk (flit) size in bytes.
const DEFAULT_CHUNK_SIZE: u64 = 32;

/// Size of a credit message in bytes; determines the credit return delay.
const CREDIT_SIZE: f64 = 8.0;

/// Coordinate vector; torus dimension counts are small.
pub(crate) type Coords = SmallVec<[u32; 8]>;

// DIRECTION
// ================================================================================================

/// Traversal direction along one torus dimension.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Minus,
    Plus,
}

impl Direction {
    /// Returns the direction's slot within per-link tables.
    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Self::Minus => 0,
            Self::Plus => 1,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minus => write!(f, "minus"),
            Self::Plus => write!(f, "plus"),
        }
    }
}

// TORUS PARAMETERS
// ================================================================================================

/// The torus fabric's parameter block, read once at configure time and shared immutably by
/// every node.
#[derive(Clone, Debug, PartialEq)]
pub struct TorusParams {
    /// Number of torus dimensions.
    pub n_dims: usize,
    /// Length of each dimension.
    pub dim_length: Vec<u32>,
    /// Half of each dimension length; the wraparound decision window.
    pub half_length: Vec<u32>,
    /// `factor[i]` is the product of the dimension lengths below `i`, for flat-index packing.
    pub factor: Vec<u64>,
    /// Link bandwidth in GB/s.
    pub link_bandwidth: f64,
    /// Virtual channel buffer capacity, in chunks.
    pub buffer_size: u32,
    /// Number of virtual channels per link.
    pub num_vc: usize,
    /// Chunk (flit) size in bytes.
    pub chunk_size: u64,
    /// Transmission delay of one chunk head, `chunk_size / bandwidth`.
    pub head_delay: f64,
    /// Return delay of one credit, `8 / bandwidth`.
    pub credit_delay: f64,
}

impl TorusParams {
    /// Reads the torus parameter block from the `PARAMS` section.
    pub fn from_config(config: &dyn ConfigSource) -> Result<Self, SetupError> {
        const FABRIC: &str = "torus";

        let n_dims = config.get_u64("PARAMS", "n_dims", None)?.ok_or(
            SetupError::MissingFabricParameter { fabric: FABRIC, key: "n_dims" },
        )? as usize;
        if n_dims == 0 {
            return Err(SetupError::InvalidFabricParameter {
                fabric: FABRIC,
                key: "n_dims",
                value: "0".into(),
            });
        }

        let raw_lengths = config.get_u64_list("PARAMS", "dim_length", None)?.ok_or(
            SetupError::MissingFabricParameter { fabric: FABRIC, key: "dim_length" },
        )?;
        if raw_lengths.len() != n_dims {
            return Err(SetupError::InvalidFabricParameter {
                fabric: FABRIC,
                key: "dim_length",
                value: format!("{} entries for {n_dims} dimensions", raw_lengths.len()),
            });
        }
        let dim_length: Vec<u32> = raw_lengths
            .into_iter()
            .map(|len| if len == 0 { DEFAULT_DIM_LENGTH } else { len as u32 })
            .collect();

        let link_bandwidth = config.get_f64("PARAMS", "link_bandwidth", None)?.ok_or(
            SetupError::MissingFabricParameter { fabric: FABRIC, key: "link_bandwidth" },
        )?;
        if link_bandwidth <= 0.0 {
            return Err(SetupError::InvalidFabricParameter {
                fabric: FABRIC,
                key: "link_bandwidth",
                value: link_bandwidth.to_string(),
            });
        }

        let buffer_size = config.get_u64("PARAMS", "buffer_size", None)?.ok_or(
            SetupError::MissingFabricParameter { fabric: FABRIC, key: "buffer_size" },
        )? as u32;

        let num_vc = config.get_u64("PARAMS", "num_vc", None)?.unwrap_or(1) as usize;
        if num_vc == 0 {
            return Err(SetupError::InvalidFabricParameter {
                fabric: FABRIC,
                key: "num_vc",
                value: "0".into(),
            });
        }

        let chunk_size =
            config.get_u64("PARAMS", "chunk_size", None)?.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(SetupError::InvalidFabricParameter {
                fabric: FABRIC,
                key: "chunk_size",
                value: "0".into(),
            });
        }

        let half_length = dim_length.iter().map(|len| len / 2).collect();
        let mut factor = vec![1u64; n_dims];
        for dim in 1..n_dims {
            factor[dim] = factor[dim - 1] * u64::from(dim_length[dim - 1]);
        }

        Ok(Self {
            n_dims,
            dim_length,
            half_length,
            factor,
            link_bandwidth,
            buffer_size,
            num_vc,
            chunk_size,
            head_delay: (1.0 / link_bandwidth) * chunk_size as f64,
            credit_delay: (1.0 / link_bandwidth) * CREDIT_SIZE,
        })
    }

    /// Returns the number of chunks a packet of the given size occupies.
    pub fn num_chunks(&self, packet_size: u64) -> u64 {
        packet_size.div_ceil(self.chunk_size)
    }

    /// Returns the total number of torus nodes.
    pub fn node_count(&self) -> u64 {
        self.dim_length.iter().map(|len| u64::from(*len)).product()
    }
}

// TORUS MESSAGE
// ================================================================================================

/// Event kind of a torus message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TorusEventKind {
    /// A packet enters the network at its source node.
    Generate,
    /// A chunk arrives from a neighboring node.
    Arrival,
    /// A chunk is transmitted toward the next hop.
    Send,
    /// A credit returns a buffer slot to the upstream node.
    Credit,
}

/// The torus fabric's message body.
#[derive(Clone, Debug, PartialEq)]
pub struct TorusMessage {
    /// Event kind.
    pub kind: TorusEventKind,
    /// Traffic category of the owning message.
    pub category: Arc<str>,
    /// Time the packet entered the network.
    pub travel_start_time: SimTime,
    /// Reverse save slot for link/credit availability times.
    pub saved_available_time: SimTime,
    /// Reverse save slot for the max-latency watermark.
    pub saved_max_latency: SimTime,
    /// Reverse save slot for the per-category send-time accumulator.
    pub saved_send_time: SimTime,
    /// Reverse save slot for the per-category recv-time accumulator.
    pub saved_recv_time: SimTime,
    /// Reverse save slot for the whole-run travel-time accumulator.
    pub saved_total_time: SimTime,
    /// Reverse save slot for the routed dimension.
    pub saved_src_dim: usize,
    /// Reverse save slot for the routed direction.
    pub saved_src_dir: Direction,
    /// Unique packet id, `gid + num_lps * packet_counter` at the source.
    pub packet_id: u64,
    /// Dimension the chunk last traversed.
    pub source_dim: usize,
    /// Direction the chunk last traversed.
    pub source_direction: Direction,
    /// Workload LP the remote event is ultimately delivered to.
    pub final_dest_gid: Gid,
    /// Destination torus node of the packet.
    pub dest_lp: Gid,
    /// Workload LP that issued the message; target of pull replies and the self event.
    pub sender_gid: Gid,
    /// Torus node that transmitted the chunk last; target of the credit return.
    pub upstream: Gid,
    /// Next torus node the chunk will traverse.
    pub next_stop: Gid,
    /// Hops traversed so far.
    pub hops: u32,
    /// Packet size in bytes.
    pub packet_size: u64,
    /// Chunk index within the packet.
    pub chunk_id: u64,
    /// True if this packet is a pull request.
    pub is_pull: bool,
    /// Size of the pull reply, in bytes.
    pub pull_size: u64,
    /// Size of the trailing remote event payload.
    pub remote_event_size: usize,
    /// Size of the trailing self event payload.
    pub local_event_size: usize,
}

// TORUS TOTALS
// ================================================================================================

/// Whole-run latency and hop accumulators.
///
/// Kept per LP during the run (forward handlers mutate them, reverse handlers roll them back)
/// and merged into the fabric-wide accumulator at LP teardown, where no event is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TorusTotals {
    /// Packets fully received at their destination.
    pub finished_packets: u64,
    /// Hops traversed by finished packets.
    pub total_hops: u64,
    /// Summed travel time of finished packets.
    pub total_time: SimTime,
    /// Largest single-packet travel time observed.
    pub max_latency: SimTime,
}

impl TorusTotals {
    fn merge(&mut self, other: &Self) {
        self.finished_packets += other.finished_packets;
        self.total_hops += other.total_hops;
        self.total_time += other.total_time;
        self.max_latency = self.max_latency.max(other.max_latency);
    }
}

struct TorusShared {
    params: TorusParams,
    magic: u32,
    totals: Mutex<TorusTotals>,
}

// TORUS FABRIC
// ================================================================================================

/// The configured torus fabric: the registry entry shared by every torus node.
pub struct TorusFabric {
    shared: Arc<TorusShared>,
}

impl TorusFabric {
    /// Reads the torus parameter block and returns the configured fabric.
    pub fn configure(config: &dyn ConfigSource, magic: u32) -> Result<Self, SetupError> {
        let params = TorusParams::from_config(config)?;
        Ok(Self {
            shared: Arc::new(TorusShared {
                params,
                magic,
                totals: Mutex::new(TorusTotals::default()),
            }),
        })
    }

    /// Returns the fabric's parameter block.
    pub fn params(&self) -> &TorusParams {
        &self.shared.params
    }

    /// Returns the merged whole-run totals; meaningful after LPs have finalized.
    pub fn totals(&self) -> TorusTotals {
        *self.shared.totals.lock().expect("torus totals lock poisoned")
    }
}

impl Fabric for TorusFabric {
    fn net_id(&self) -> NetId {
        NetId::Torus
    }

    fn lp_type_names(&self) -> &[&'static str] {
        &LP_TYPE_NAMES
    }

    fn new_lp(
        &self,
        gid: Gid,
        mapping: &dyn Mapping,
    ) -> Result<Box<dyn FabricLp>, SimulationError> {
        Ok(Box::new(TorusLp::init(self.shared.clone(), gid, mapping)?))
    }

    /// Allocates a GENERATE event on the sender's co-located torus node.
    ///
    /// The event is scheduled slightly into the future (plus the caller's offset) so the host
    /// never sees a zero-offset self event; the offset at which it was scheduled is returned so
    /// the scheduler can pace its loop.
    fn packet_event(
        &self,
        mapping: &dyn Mapping,
        args: PacketEventArgs<'_>,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<SimTime, SimulationError> {
        let sender_info = mapping.lp_info(lp.gid())?;
        let local_nic =
            mapping.lp_id(&sender_info.group, LP_TYPE_NAME, sender_info.rep, sender_info.offset)?;

        let xfer_to_nic = SimTime::from_nanos(0.01) + lp.local_latency();

        let mut msg = TorusMessage {
            kind: TorusEventKind::Generate,
            category: args.category.clone(),
            travel_start_time: SimTime::ZERO,
            saved_available_time: SimTime::ZERO,
            saved_max_latency: SimTime::ZERO,
            saved_send_time: SimTime::ZERO,
            saved_recv_time: SimTime::ZERO,
            saved_total_time: SimTime::ZERO,
            saved_src_dim: 0,
            saved_src_dir: Direction::Minus,
            packet_id: 0,
            source_dim: 0,
            source_direction: Direction::Minus,
            final_dest_gid: args.final_dest_gid,
            dest_lp: args.dest_mn_lp,
            sender_gid: args.sender_gid,
            upstream: lp.gid(),
            next_stop: Gid::default(),
            hops: 0,
            packet_size: args.packet_size,
            chunk_id: 0,
            is_pull: args.is_pull,
            pull_size: args.pull_size,
            remote_event_size: 0,
            local_event_size: 0,
        };

        let mut payload = Payload::default();
        if args.is_last_packet {
            if args.remote_event_size > 0 {
                msg.remote_event_size = args.remote_event_size;
                payload.remote = args.remote_event.to_vec();
            }
            if args.self_event_size > 0 {
                msg.local_event_size = args.self_event_size;
                payload.local = args.self_event.to_vec();
            }
        }

        let wrapped = WrappedMessage::pass(self.shared.magic, FabricMessage::Torus(msg), payload);
        lp.send(local_nic, xfer_to_nic + args.offset, SimEvent::ModelNet(wrapped));
        Ok(xfer_to_nic)
    }

    fn packet_event_rc(&self, lp: &mut dyn Lp<Event = SimEvent>) {
        lp.local_latency_reverse();
    }

    fn find_local_device(
        &self,
        mapping: &dyn Mapping,
        sender: Gid,
    ) -> Result<Gid, SimulationError> {
        let info = mapping.lp_info(sender)?;
        Ok(mapping.lp_id(&info.group, LP_TYPE_NAME, info.rep, info.offset)?)
    }

    fn report_stats(&self) {
        let totals = self.totals();
        if totals.finished_packets == 0 {
            tracing::info!("torus: no packets finished");
            return;
        }
        let finished = totals.finished_packets as f64;
        tracing::info!(
            finished_packets = totals.finished_packets,
            avg_hops = totals.total_hops as f64 / finished,
            avg_latency_us = totals.total_time.as_nanos() / (finished * 1000.0),
            max_latency_us = totals.max_latency.as_nanos() / 1000.0,
            "torus traffic summary"
        );
    }
}

// TORUS NODE LP
// ================================================================================================

/// Per-node state of the torus fabric.
///
/// Availability/buffer tables are laid out per (dimension, direction) pair with `num_vc` slots
/// each; all traffic currently rides virtual channel 0, matching the flow-control model.
#[derive(Clone)]
pub struct TorusLp {
    shared: Arc<TorusShared>,
    gid: Gid,
    group: String,
    packet_counter: u64,
    coordinates: Coords,
    neighbor_minus: Coords,
    neighbor_plus: Coords,
    next_link_available_time: Vec<SimTime>,
    next_credit_available_time: Vec<SimTime>,
    // allocated alongside its siblings; nothing writes it yet
    next_flit_generate_time: Vec<SimTime>,
    buffer: Vec<u32>,
    stats: StatsTable,
    totals: TorusTotals,
}

impl TorusLp {
    // CONSTRUCTOR
    // --------------------------------------------------------------------------------------------

    /// Computes the node's coordinates and neighbor indices and zeroes every table.
    fn init(
        shared: Arc<TorusShared>,
        gid: Gid,
        mapping: &dyn Mapping,
    ) -> Result<Self, SimulationError> {
        let info = mapping.lp_info(gid)?;
        let flat = u64::from(info.rep + info.offset);
        let coordinates = shared.params.coordinates_of(flat);

        let n_dims = shared.params.n_dims;
        let mut neighbor_minus = Coords::new();
        let mut neighbor_plus = Coords::new();
        for dim in 0..n_dims {
            let len = shared.params.dim_length[dim];
            for (delta, neighbors) in
                [(len - 1, &mut neighbor_minus), (1, &mut neighbor_plus)]
            {
                let mut coords = coordinates.clone();
                coords[dim] = (coords[dim] + delta) % len;
                let neighbor = shared.params.flat_index(&coords) as u32;
                // resolve the neighbor now so a broken layout fails at init, not mid-route
                mapping.lp_id(&info.group, LP_TYPE_NAME, neighbor, 0)?;
                neighbors.push(neighbor);
            }
        }

        let slots = 2 * n_dims * shared.params.num_vc;
        Ok(Self {
            shared,
            gid,
            group: info.group,
            packet_counter: 0,
            coordinates,
            neighbor_minus,
            neighbor_plus,
            next_link_available_time: vec![SimTime::ZERO; slots],
            next_credit_available_time: vec![SimTime::ZERO; slots],
            next_flit_generate_time: vec![SimTime::ZERO; slots],
            buffer: vec![0; slots],
            stats: StatsTable::new(),
            totals: TorusTotals::default(),
        })
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the node's coordinates.
    pub fn coordinates(&self) -> &[u32] {
        &self.coordinates
    }

    /// Returns the node's per-category statistics.
    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    /// Returns the node's whole-run totals.
    pub fn totals(&self) -> &TorusTotals {
        &self.totals
    }

    /// Returns the number of packets generated at this node.
    pub fn packet_counter(&self) -> u64 {
        self.packet_counter
    }

    /// Returns the occupancy of the virtual channel buffer on the given link.
    pub fn buffer_occupancy(&self, dim: usize, dir: Direction) -> u32 {
        self.buffer[self.channel(dim, dir)]
    }

    /// Returns the link-available time of the given link.
    pub fn link_available_time(&self, dim: usize, dir: Direction) -> SimTime {
        self.next_link_available_time[self.channel(dim, dir)]
    }

    /// Slot of the given link's virtual channel 0.
    fn channel(&self, dim: usize, dir: Direction) -> usize {
        (2 * dim + dir.index()) * self.shared.params.num_vc
    }

    // FORWARD HANDLERS
    // --------------------------------------------------------------------------------------------

    /// Injects a packet: routes its first hop, stamps id and start time, and schedules one SEND
    /// per chunk.
    ///
    /// A full virtual channel buffer at injection is a hard error; injection throttling is
    /// deliberately absent from this flow-control model.
    fn packet_generate(
        &mut self,
        net: &ModelNet,
        msg: &mut TorusMessage,
        payload: &Payload,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let (next_stop, dim, dir) = self.route(net.mapping(), msg.dest_lp)?;
        msg.saved_src_dim = dim;
        msg.saved_src_dir = dir;
        msg.travel_start_time = lp.now();
        msg.packet_id = lp.gid().as_u64() + lp.num_lps() * self.packet_counter;
        msg.hops = 0;
        self.packet_counter += 1;

        tracing::trace!(
            packet = msg.packet_id,
            lp = %self.gid,
            next = %next_stop,
            dest = %msg.dest_lp,
            "packet generated"
        );

        let num_chunks = self.shared.params.num_chunks(msg.packet_size);
        let buffer_size = self.shared.params.buffer_size;
        let channel = self.channel(dim, dir);
        for chunk in 0..num_chunks {
            let occupancy = self.buffer[channel];
            if occupancy >= buffer_size {
                return Err(SimulationError::BufferOverflow {
                    gid: self.gid,
                    dim,
                    dir,
                    occupancy,
                    capacity: buffer_size,
                    dest: msg.dest_lp,
                });
            }
            let ts = chunk as f64 + lp.rand_exponential(MEAN_INTERVAL / 200.0);

            let mut chunk_msg = msg.clone();
            chunk_msg.kind = TorusEventKind::Send;
            chunk_msg.next_stop = next_stop;
            chunk_msg.chunk_id = chunk;
            chunk_msg.source_dim = dim;
            chunk_msg.source_direction = dir;
            // only the last chunk carries the payload tails
            let chunk_payload =
                if chunk + 1 == num_chunks { payload.clone() } else { Payload::default() };
            let wrapped = WrappedMessage::pass(
                self.shared.magic,
                FabricMessage::Torus(chunk_msg),
                chunk_payload,
            );
            lp.send(lp.gid(), SimTime::from_nanos(ts), SimEvent::ModelNet(wrapped));
        }

        let bandwidth = self.shared.params.link_bandwidth;
        let stats = self.stats.entry(&msg.category);
        stats.send_count += 1;
        stats.send_bytes += msg.packet_size;
        // float accumulators save their prior value; subtraction would not round-trip exactly
        msg.saved_send_time = stats.send_time;
        stats.send_time += SimTime::from_nanos((1.0 / bandwidth) * msg.packet_size as f64);
        Ok(())
    }

    /// Bits used: c1 - last chunk left the source, c2 - the chunk was transmitted.
    fn packet_send(
        &mut self,
        net: &ModelNet,
        bits: &mut BitField,
        msg: &mut TorusMessage,
        payload: &Payload,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        // intermediate hops re-route; the destination in the message is the final fabric hop
        let (next_stop, dim, dir) = self.route(net.mapping(), msg.dest_lp)?;
        let buffer_size = self.shared.params.buffer_size;
        let head_delay = self.shared.params.head_delay;
        let channel = self.channel(dim, dir);

        let occupancy = self.buffer[channel];
        if occupancy >= buffer_size {
            return Err(SimulationError::BufferOverflow {
                gid: self.gid,
                dim,
                dir,
                occupancy,
                capacity: buffer_size,
                dest: msg.dest_lp,
            });
        }

        bits.set(2);
        msg.saved_src_dim = dim;
        msg.saved_src_dir = dir;
        let ts = lp.rand_exponential(head_delay / 200.0) + head_delay;
        msg.saved_available_time = self.next_link_available_time[channel];
        let available = self.next_link_available_time[channel].max(lp.now())
            + SimTime::from_nanos(ts);
        self.next_link_available_time[channel] = available;

        let mut fwd = msg.clone();
        fwd.kind = TorusEventKind::Arrival;
        fwd.source_dim = dim;
        fwd.source_direction = dir;
        fwd.next_stop = next_stop;
        fwd.upstream = lp.gid();
        // the self event is delivered below, never forwarded
        fwd.local_event_size = 0;
        let fwd_payload = Payload { remote: payload.remote.clone(), local: Vec::new() };
        let wrapped =
            WrappedMessage::pass(self.shared.magic, FabricMessage::Torus(fwd), fwd_payload);
        lp.send(next_stop, available - lp.now(), SimEvent::ModelNet(wrapped));
        self.buffer[channel] += 1;

        if msg.chunk_id + 1 == self.shared.params.num_chunks(msg.packet_size) {
            bits.set(1);
            if msg.local_event_size > 0 {
                let delivery = SimTime::from_nanos(
                    (1.0 / self.shared.params.link_bandwidth) * msg.local_event_size as f64,
                );
                lp.send(msg.sender_gid, delivery, SimEvent::Payload(payload.local.clone()));
            }
        }
        Ok(())
    }

    /// Bits used: c2 - last chunk received at the destination, c3 - max latency advanced.
    fn packet_arrive(
        &mut self,
        net: &ModelNet,
        bits: &mut BitField,
        msg: &mut TorusMessage,
        payload: &Payload,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        self.credit_send(msg, lp);
        msg.hops += 1;
        // drawn on every arrival so the reverse path can replay unconditionally
        let ts = 0.1 + lp.rand_exponential(MEAN_INTERVAL / 200.0);

        let num_chunks = self.shared.params.num_chunks(msg.packet_size);
        if lp.gid() == msg.dest_lp {
            if msg.chunk_id + 1 == num_chunks {
                bits.set(2);
                let latency = lp.now() - msg.travel_start_time;
                {
                    let stats = self.stats.entry(&msg.category);
                    stats.recv_count += 1;
                    stats.recv_bytes += msg.packet_size;
                    msg.saved_recv_time = stats.recv_time;
                    stats.recv_time += latency;
                }
                self.totals.finished_packets += 1;
                msg.saved_total_time = self.totals.total_time;
                self.totals.total_time += latency;
                self.totals.total_hops += u64::from(msg.hops);
                if self.totals.max_latency < latency {
                    bits.set(3);
                    msg.saved_max_latency = self.totals.max_latency;
                    self.totals.max_latency = latency;
                }

                if msg.remote_event_size > 0 {
                    let delivery = SimTime::from_nanos(
                        (1.0 / self.shared.params.link_bandwidth) * msg.remote_event_size as f64,
                    );
                    if msg.is_pull {
                        net.event(
                            NetId::Torus,
                            &msg.category,
                            msg.sender_gid,
                            msg.pull_size,
                            delivery,
                            &payload.remote,
                            &[],
                            lp,
                        )?;
                    } else {
                        lp.send(
                            msg.final_dest_gid,
                            delivery,
                            SimEvent::Payload(payload.remote.clone()),
                        );
                    }
                }
            }
        } else {
            let mut fwd = msg.clone();
            fwd.kind = TorusEventKind::Send;
            let fwd_payload = Payload { remote: payload.remote.clone(), local: Vec::new() };
            let wrapped =
                WrappedMessage::pass(self.shared.magic, FabricMessage::Torus(fwd), fwd_payload);
            lp.send(lp.gid(), SimTime::from_nanos(ts), SimEvent::ModelNet(wrapped));
        }
        Ok(())
    }

    /// Sends an 8-byte credit back to the upstream node.
    fn credit_send(&mut self, msg: &mut TorusMessage, lp: &mut dyn Lp<Event = SimEvent>) {
        let credit_delay = self.shared.params.credit_delay;
        let channel = self.channel(msg.source_dim, msg.source_direction);

        msg.saved_available_time = self.next_credit_available_time[channel];
        let ts = credit_delay + lp.rand_exponential(credit_delay / 1000.0);
        let available =
            self.next_credit_available_time[channel].max(lp.now()) + SimTime::from_nanos(ts);
        self.next_credit_available_time[channel] = available;

        let mut credit = msg.clone();
        credit.kind = TorusEventKind::Credit;
        let wrapped = WrappedMessage::pass(
            self.shared.magic,
            FabricMessage::Torus(credit),
            Payload::default(),
        );
        lp.send(msg.upstream, available - lp.now(), SimEvent::ModelNet(wrapped));
    }

    /// Returns a buffer slot to the link the chunk came in on.
    fn credit_arrive(&mut self, msg: &TorusMessage) -> Result<(), SimulationError> {
        let channel = self.channel(msg.source_dim, msg.source_direction);
        if self.buffer[channel] == 0 {
            return Err(SimulationError::BufferUnderflow {
                gid: self.gid,
                dim: msg.source_dim,
                dir: msg.source_direction,
            });
        }
        self.buffer[channel] -= 1;
        Ok(())
    }

    // REVERSE HANDLERS
    // --------------------------------------------------------------------------------------------

    fn packet_generate_rc(&mut self, msg: &TorusMessage, lp: &mut dyn Lp<Event = SimEvent>) {
        self.packet_counter -= 1;
        let num_chunks = self.shared.params.num_chunks(msg.packet_size);
        for _ in 0..num_chunks {
            lp.rand_reverse();
        }
        let stats = self.stats.entry(&msg.category);
        stats.send_count -= 1;
        stats.send_bytes -= msg.packet_size;
        stats.send_time = msg.saved_send_time;
    }

    fn packet_send_rc(
        &mut self,
        bits: &BitField,
        msg: &TorusMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) {
        if bits.test(2) {
            let channel = self.channel(msg.saved_src_dim, msg.saved_src_dir);
            self.next_link_available_time[channel] = msg.saved_available_time;
            self.buffer[channel] -= 1;
            lp.rand_reverse();
        }
    }

    fn packet_arrive_rc(
        &mut self,
        net: &ModelNet,
        bits: &BitField,
        msg: &mut TorusMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) {
        lp.rand_reverse();
        lp.rand_reverse();
        let channel = self.channel(msg.source_dim, msg.source_direction);
        self.next_credit_available_time[channel] = msg.saved_available_time;

        if bits.test(2) {
            {
                let stats = self.stats.entry(&msg.category);
                stats.recv_count -= 1;
                stats.recv_bytes -= msg.packet_size;
                stats.recv_time = msg.saved_recv_time;
            }
            self.totals.finished_packets -= 1;
            self.totals.total_time = msg.saved_total_time;
            self.totals.total_hops -= u64::from(msg.hops);
            if bits.test(3) {
                self.totals.max_latency = msg.saved_max_latency;
            }
        }
        msg.hops -= 1;

        let num_chunks = self.shared.params.num_chunks(msg.packet_size);
        if lp.gid() == msg.dest_lp
            && msg.chunk_id + 1 == num_chunks
            && msg.remote_event_size > 0
            && msg.is_pull
        {
            net.event_rc(lp);
        }
    }

    fn credit_arrive_rc(&mut self, msg: &TorusMessage) {
        let channel = self.channel(msg.source_dim, msg.source_direction);
        self.buffer[channel] += 1;
    }

    // TEARDOWN
    // --------------------------------------------------------------------------------------------

    fn merge_totals(&mut self) {
        for (category, stats) in self.stats.iter() {
            tracing::debug!(
                lp = %self.gid,
                %category,
                send_count = stats.send_count,
                send_bytes = stats.send_bytes,
                recv_count = stats.recv_count,
                recv_bytes = stats.recv_bytes,
                "torus node category totals"
            );
        }
        self.shared
            .totals
            .lock()
            .expect("torus totals lock poisoned")
            .merge(&self.totals);
    }
}

impl FabricLp for TorusLp {
    fn forward(
        &mut self,
        net: &ModelNet,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let WrappedMessage { body, payload, .. } = msg;
        let Body::Pass(FabricMessage::Torus(tmsg)) = body else {
            return Err(SimulationError::MisdirectedEvent { gid: self.gid });
        };

        bits.clear();
        match tmsg.kind {
            TorusEventKind::Generate => self.packet_generate(net, tmsg, payload, lp),
            TorusEventKind::Arrival => self.packet_arrive(net, bits, tmsg, payload, lp),
            TorusEventKind::Send => self.packet_send(net, bits, tmsg, payload, lp),
            TorusEventKind::Credit => self.credit_arrive(tmsg),
        }
    }

    fn reverse(
        &mut self,
        net: &ModelNet,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let Body::Pass(FabricMessage::Torus(tmsg)) = &mut msg.body else {
            return Err(SimulationError::MisdirectedEvent { gid: self.gid });
        };

        match tmsg.kind {
            TorusEventKind::Generate => self.packet_generate_rc(tmsg, lp),
            TorusEventKind::Arrival => self.packet_arrive_rc(net, bits, tmsg, lp),
            TorusEventKind::Send => self.packet_send_rc(bits, tmsg, lp),
            TorusEventKind::Credit => self.credit_arrive_rc(tmsg),
        }
        Ok(())
    }

    fn finalize(&mut self) {
        self.merge_totals();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl PartialEq for TorusLp {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
            && self.gid == other.gid
            && self.group == other.group
            && self.packet_counter == other.packet_counter
            && self.coordinates == other.coordinates
            && self.neighbor_minus == other.neighbor_minus
            && self.neighbor_plus == other.neighbor_plus
            && self.next_link_available_time == other.next_link_available_time
            && self.next_credit_available_time == other.next_credit_available_time
            && self.next_flit_generate_time == other.next_flit_generate_time
            && self.buffer == other.buffer
            && self.stats == other.stats
            && self.totals == other.totals
    }
}

impl fmt::Debug for TorusLp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorusLp")
            .field("gid", &self.gid)
            .field("coordinates", &self.coordinates)
            .field("packet_counter", &self.packet_counter)
            .field("buffer", &self.buffer)
            .field("totals", &self.totals)
            .finish_non_exhaustive()
    }
}
