use std::sync::Arc;

use warpnet_core::Gid;

use crate::{NetId, SchedRc, torus::TorusMessage};

// SIMULATION EVENT
// ================================================================================================

/// Everything the model-net crate ever puts on the host's event queue.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// A wrapped model-net event, addressed to a model-net base LP.
    ModelNet(WrappedMessage),
    /// An opaque remote or self event payload, delivered to a workload LP.
    Payload(Vec<u8>),
}

// WRAPPED MESSAGE
// ================================================================================================

/// The sole on-wire event payload of model-net LPs: an integrity tag, the tagged message body,
/// and the trailing opaque payload bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct WrappedMessage {
    /// Process-wide base magic; asserted on every delivery.
    pub magic: u32,
    /// The discriminated message body (the discriminant doubles as the event tag).
    pub body: Body,
    /// Trailing remote/self event payloads, addressed by the sizes recorded in the body.
    pub payload: Payload,
}

impl WrappedMessage {
    /// Returns a NEW_MSG event carrying a workload request.
    pub fn new_msg(magic: u32, req: Request, payload: Payload) -> Self {
        Self { magic, body: Body::NewMsg { req, rc: SchedRc::default() }, payload }
    }

    /// Returns a SCHED_NEXT event; the body carries only the scheduler's reverse slot.
    pub fn sched_next(magic: u32) -> Self {
        Self { magic, body: Body::SchedNext { rc: SchedRc::default() }, payload: Payload::default() }
    }

    /// Returns a PASS event forwarding a fabric-specific message.
    pub fn pass(magic: u32, msg: FabricMessage, payload: Payload) -> Self {
        Self { magic, body: Body::Pass(msg), payload }
    }
}

/// The wrapped-message body union; the variant is the event tag.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// A workload request entering the base LP's scheduler.
    NewMsg { req: Request, rc: SchedRc },
    /// One iteration of the base LP's self-driven scheduler loop.
    SchedNext { rc: SchedRc },
    /// A fabric-level event, forwarded verbatim to the fabric LP.
    Pass(FabricMessage),
}

impl Body {
    /// Returns the event tag name, for diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Body::NewMsg { .. } => "NEW_MSG",
            Body::SchedNext { .. } => "SCHED_NEXT",
            Body::Pass(_) => "PASS",
        }
    }
}

/// The closed set of fabric-specific message bodies.
///
/// Only the torus body is populated here; the remaining fabrics are external plugins whose
/// bodies never cross this crate's boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum FabricMessage {
    Torus(TorusMessage),
}

impl FabricMessage {
    /// Returns the fabric this message belongs to.
    pub fn net_id(&self) -> NetId {
        match self {
            FabricMessage::Torus(_) => NetId::Torus,
        }
    }
}

// PAYLOAD
// ================================================================================================

/// The trailing opaque byte tails of a wrapped message.
///
/// `remote` is delivered at the final destination, `local` back at the sender once the message
/// has fully left the source NIC. Only the last chunk of the last packet of a message carries
/// non-empty tails.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Payload {
    pub remote: Vec<u8>,
    pub local: Vec<u8>,
}

impl Payload {
    /// Returns a payload copied out of the given byte slices.
    pub fn new(remote: &[u8], local: &[u8]) -> Self {
        Self { remote: remote.to_vec(), local: local.to_vec() }
    }

    /// Returns true if both tails are empty.
    pub fn is_empty(&self) -> bool {
        self.remote.is_empty() && self.local.is_empty()
    }
}

// REQUEST
// ================================================================================================

/// A workload-level transmission request, carried inside a NEW_MSG body.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// The model-net LP co-located with the final destination.
    pub dest_mn_lp: Gid,
    /// The workload LP the remote event is ultimately delivered to.
    pub final_dest_gid: Gid,
    /// The workload LP that issued the request.
    pub sender_gid: Gid,
    /// Traffic category, for per-category statistics.
    pub category: Arc<str>,
    /// Total message size in bytes.
    pub msg_size: u64,
    /// Packet size in bytes; stamped by the base LP from its configured parameters.
    pub packet_size: u64,
    /// True if the destination should answer with a `pull_size`-byte message instead of
    /// delivering the remote event locally.
    pub is_pull: bool,
    /// Size of the pull reply, in bytes.
    pub pull_size: u64,
    /// Size of the trailing remote event payload.
    pub remote_event_size: usize,
    /// Size of the trailing self event payload.
    pub self_event_size: usize,
}
