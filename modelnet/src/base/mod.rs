use std::sync::Arc;

use warpnet_core::{BitField, Gid, Lp};

use crate::{
    Body, Fabric, FabricLp, ModelNet, NetId, SimEvent, SimulationError, WrappedMessage,
    engine::BaseParams,
    sched::{SchedOutcome, Scheduler},
};


// BASE LP
// ================================================================================================

/// The model-net base LP: the uniform entry point wrapped around every fabric node.
///
/// Owns request scheduling, packet-size injection and event-tag demultiplexing; the fabric's own
/// per-node state hangs off it as `sub`. At most one SCHED_NEXT event is in flight per LP, and
/// the `in_sched_loop` flag is set exactly while one is.
pub struct BaseLp {
    gid: Gid,
    net_id: NetId,
    in_sched_loop: bool,
    sched: Scheduler,
    params: BaseParams,
    net: Arc<ModelNet>,
    fabric: Arc<dyn Fabric>,
    sub: Box<dyn FabricLp>,
}

impl std::fmt::Debug for BaseLp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseLp")
            .field("gid", &self.gid)
            .field("net_id", &self.net_id)
            .field("in_sched_loop", &self.in_sched_loop)
            .field("sched", &self.sched)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl BaseLp {
    // CONSTRUCTOR
    // --------------------------------------------------------------------------------------------

    /// Initializes the base LP with the given id.
    ///
    /// Resolves the LP's annotation through the mapping service, selects the matching parameter
    /// block (`None` matches the unannotated entry), determines the fabric from the LP type name
    /// and delegates per-node initialization to it.
    pub fn init(net: Arc<ModelNet>, gid: Gid) -> Result<Self, SimulationError> {
        let info = net.mapping().lp_info(gid)?;

        let params = net
            .params_for(info.annotation.as_deref())
            .ok_or_else(|| SimulationError::MissingParams {
                gid,
                annotation: info.annotation.clone(),
            })?
            .clone();

        let (net_id, fabric) = net
            .fabric_for_lp_type(&info.type_name)
            .ok_or_else(|| SimulationError::UnknownLpType { type_name: info.type_name.clone() })?;
        let fabric = fabric.clone();
        let sub = fabric.new_lp(gid, net.mapping())?;

        Ok(Self {
            gid,
            net_id,
            in_sched_loop: false,
            sched: Scheduler::new(params.scheduler),
            params,
            net,
            fabric,
            sub,
        })
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the LP's global id.
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Returns the fabric this LP runs.
    pub fn net_id(&self) -> NetId {
        self.net_id
    }

    /// Returns true while a SCHED_NEXT event is in flight for this LP.
    pub fn in_sched_loop(&self) -> bool {
        self.in_sched_loop
    }

    /// Returns the LP's request scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Returns the fabric's per-node state.
    pub fn fabric_lp(&self) -> &dyn FabricLp {
        self.sub.as_ref()
    }

    /// Returns the fabric's per-node state, mutably.
    pub fn fabric_lp_mut(&mut self) -> &mut dyn FabricLp {
        self.sub.as_mut()
    }

    // EVENT DISPATCH
    // --------------------------------------------------------------------------------------------

    /// Processes a forward event.
    pub fn forward(
        &mut self,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        self.check_magic(msg)?;
        match msg.body {
            Body::NewMsg { .. } => self.handle_new_msg(bits, msg, lp),
            Body::SchedNext { .. } => self.handle_sched_next(bits, msg, lp),
            Body::Pass(_) => self.sub.forward(self.net.as_ref(), bits, msg, lp),
        }
    }

    /// Reverses an event previously processed by [`BaseLp::forward`].
    ///
    /// The bitfield is zeroed after dispatch: the host may reuse the slot when it replays the
    /// event forward again.
    pub fn reverse(
        &mut self,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        self.check_magic(msg)?;
        match msg.body {
            Body::NewMsg { .. } => self.handle_new_msg_rc(bits, lp)?,
            Body::SchedNext { .. } => self.handle_sched_next_rc(bits, msg, lp)?,
            Body::Pass(_) => self.sub.reverse(self.net.as_ref(), bits, msg, lp)?,
        }
        bits.clear();
        Ok(())
    }

    /// Finalizes the LP at teardown.
    pub fn finalize(&mut self) {
        self.sub.finalize();
    }

    fn check_magic(&self, msg: &WrappedMessage) -> Result<(), SimulationError> {
        if msg.magic != self.net.magic() {
            return Err(SimulationError::BadMagic {
                gid: self.gid,
                expected: self.net.magic(),
                actual: msg.magic,
            });
        }
        Ok(())
    }

    // EVENT HANDLERS
    // --------------------------------------------------------------------------------------------

    /// Bits used: c0 - this event kicked the scheduler loop.
    fn handle_new_msg(
        &mut self,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let Body::NewMsg { req, .. } = &mut msg.body else {
            return Err(SimulationError::MisdirectedEvent { gid: self.gid });
        };

        // the base owns the packet size; stamp it before the scheduler sees the request
        req.packet_size = self.params.packet_size;
        self.sched.add(req, &msg.payload);

        if !self.in_sched_loop {
            bits.set(0);
            let event = WrappedMessage::sched_next(self.net.magic());
            let latency = lp.local_latency();
            lp.send(self.gid, latency, SimEvent::ModelNet(event));
            self.in_sched_loop = true;
        }
        Ok(())
    }

    fn handle_new_msg_rc(
        &mut self,
        bits: &mut BitField,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        self.sched.add_rc(self.gid)?;
        if bits.test(0) {
            lp.local_latency_reverse();
            self.in_sched_loop = false;
        }
        Ok(())
    }

    /// Bits used: c0 - the scheduler loop drained on this event.
    fn handle_sched_next(
        &mut self,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let Body::SchedNext { rc } = &mut msg.body else {
            return Err(SimulationError::MisdirectedEvent { gid: self.gid });
        };

        match self.sched.next(self.fabric.as_ref(), self.net.mapping(), rc, lp)? {
            SchedOutcome::Drained => {
                bits.set(0);
                self.in_sched_loop = false;
            },
            SchedOutcome::NextPacket(poffset) => {
                let event = WrappedMessage::sched_next(self.net.magic());
                let offset = poffset + lp.local_latency();
                lp.send(self.gid, offset, SimEvent::ModelNet(event));
            },
        }
        Ok(())
    }

    fn handle_sched_next_rc(
        &mut self,
        bits: &mut BitField,
        msg: &mut WrappedMessage,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let Body::SchedNext { rc } = &mut msg.body else {
            return Err(SimulationError::MisdirectedEvent { gid: self.gid });
        };

        self.sched.next_rc(self.fabric.as_ref(), rc, lp, self.gid)?;
        if bits.test(0) {
            self.in_sched_loop = true;
        } else {
            lp.local_latency_reverse();
        }
        Ok(())
    }
}
