use std::{any::Any, sync::Arc};

use warpnet_core::{BitField, Gid, Lp, Mapping, SimTime};

use crate::{ModelNet, SimEvent, SimulationError, WrappedMessage};

// NET ID
// ================================================================================================

/// The closed set of network fabrics the method registry can hold.
///
/// Only the torus fabric is implemented in this crate; the others exist so that configurations
/// and LP type names resolve to stable identifiers.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum NetId {
    SimpleNet,
    SimpleWan,
    Torus,
    Dragonfly,
    LogGp,
}

impl NetId {
    /// All known fabrics, in registry order.
    pub const ALL: [Self; 5] =
        [Self::SimpleNet, Self::SimpleWan, Self::Torus, Self::Dragonfly, Self::LogGp];

    /// Returns the fabric's method name as it appears in configurations.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::SimpleNet => "simplenet",
            Self::SimpleWan => "simplewan",
            Self::Torus => "torus",
            Self::Dragonfly => "dragonfly",
            Self::LogGp => "loggp",
        }
    }

    /// Returns the name the fabric's primary LP type registers under.
    pub fn lp_type_name(&self) -> &'static str {
        match self {
            Self::SimpleNet => "modelnet_simplenet",
            Self::SimpleWan => "modelnet_simplewan",
            Self::Torus => "modelnet_torus",
            Self::Dragonfly => "modelnet_dragonfly",
            Self::LogGp => "modelnet_loggp",
        }
    }

    /// Resolves a method name back to its id.
    pub fn from_method_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|net| net.method_name() == name)
    }
}

// PACKET EVENT ARGUMENTS
// ================================================================================================

/// Arguments to a fabric's packet-event entry point.
///
/// One call injects one packet; the scheduler issues them from the head request of its queue.
/// The payload slices are only populated on the last packet of a message.
#[derive(Clone, Copy, Debug)]
pub struct PacketEventArgs<'a> {
    /// Traffic category of the owning message.
    pub category: &'a Arc<str>,
    /// Workload LP that issued the owning message; pull replies and the self event go here.
    pub sender_gid: Gid,
    /// Workload LP the remote event is delivered to.
    pub final_dest_gid: Gid,
    /// Fabric LP co-located with the final destination.
    pub dest_mn_lp: Gid,
    /// Size of this packet, in bytes.
    pub packet_size: u64,
    /// True if this packet is a pull request.
    pub is_pull: bool,
    /// Size of the pull reply, in bytes.
    pub pull_size: u64,
    /// Additional scheduling offset for the generated event.
    pub offset: SimTime,
    /// Size of the remote event payload (zero unless this is the last packet).
    pub remote_event_size: usize,
    /// Remote event payload bytes.
    pub remote_event: &'a [u8],
    /// Size of the self event payload (zero unless this is the last packet).
    pub self_event_size: usize,
    /// Self event payload bytes.
    pub self_event: &'a [u8],
    /// True if this is the last packet of its message.
    pub is_last_packet: bool,
}

// FABRIC METHOD REGISTRY
// ================================================================================================

/// A configured network fabric: the per-method entry of the fabric registry.
///
/// Implementations are built once at configure time and shared immutably across every LP; all
/// mutable per-node state lives in the [`FabricLp`] objects they hand out.
pub trait Fabric: Send + Sync {
    /// Returns the fabric's registry id.
    fn net_id(&self) -> NetId;

    /// Returns the LP type names this fabric registers.
    ///
    /// The first entry is the model-net node type itself; fabrics with auxiliary LPs (e.g. a
    /// router type) list them after it.
    fn lp_type_names(&self) -> &[&'static str];

    /// Allocates and initializes the per-LP state for the node with the given id.
    fn new_lp(&self, gid: Gid, mapping: &dyn Mapping)
    -> Result<Box<dyn FabricLp>, SimulationError>;

    /// Injects one packet into the fabric on behalf of `lp` and returns the offset at which the
    /// injection was scheduled.
    fn packet_event(
        &self,
        mapping: &dyn Mapping,
        args: PacketEventArgs<'_>,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<SimTime, SimulationError>;

    /// Reverses one [`Fabric::packet_event`] call.
    fn packet_event_rc(&self, lp: &mut dyn Lp<Event = SimEvent>);

    /// Returns the fabric LP co-located with the given workload LP.
    fn find_local_device(
        &self,
        mapping: &dyn Mapping,
        sender: Gid,
    ) -> Result<Gid, SimulationError>;

    /// Emits the fabric's end-of-run statistics reduction.
    fn report_stats(&self);
}

/// Per-node handler state of a fabric, owned by the base LP that wraps the node.
pub trait FabricLp: Any {
    /// Processes a forward fabric event.
    fn forward(
        &mut self,
        net: &ModelNet,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError>;

    /// Reverses a fabric event previously processed by [`FabricLp::forward`].
    fn reverse(
        &mut self,
        net: &ModelNet,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError>;

    /// Finalizes the node at LP teardown (statistics merge and reporting).
    fn finalize(&mut self);

    /// Upcasts to [`Any`], for host-side inspection.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast to [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// TESTS
// ================================================================================================
