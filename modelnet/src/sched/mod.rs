use std::collections::VecDeque;

use warpnet_core::{Gid, Lp, Mapping, SimTime};

use crate::{Fabric, PacketEventArgs, Payload, Request, SimEvent, SimulationError};


// SCHEDULER KIND
// ================================================================================================

/// Request-ordering discipline of a base LP's scheduler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchedulerKind {
    /// First come, first served, one packet at a time.
    Fcfs,
    /// First come, first served, the whole message as a single packet. The base forces the
    /// packet size to an effectively unbounded value when this kind is configured.
    FcfsFull,
}

impl SchedulerKind {
    /// Resolves a configuration name into a scheduler kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fcfs" => Some(Self::Fcfs),
            "fcfs-full" => Some(Self::FcfsFull),
            _ => None,
        }
    }

    /// Returns the configuration name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fcfs => "fcfs",
            Self::FcfsFull => "fcfs-full",
        }
    }
}

// REVERSE SLOT
// ================================================================================================

/// Per-event scratch state for reversing one scheduler operation.
///
/// The forward path stashes whatever it mutated (bytes consumed from the head request, the
/// request it popped on completion); the reverse path restores from it and resets the slot so
/// the event can be replayed forward again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchedRc {
    issued: bool,
    consumed: u64,
    completed: Option<QueuedRequest>,
}

#[derive(Clone, Debug, PartialEq)]
struct QueuedRequest {
    req: Request,
    payload: Payload,
    remaining: u64,
}

// SCHEDULER
// ================================================================================================

/// Outcome of one scheduler iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchedOutcome {
    /// A packet was injected; the next iteration should run after this offset.
    NextPacket(SimTime),
    /// The queue is empty; the scheduler loop should stop.
    Drained,
}

/// Strict-FIFO request scheduler owned by a single base LP.
///
/// Single-threaded by construction: the owning LP is the only caller. Fairness across
/// categories is not provided.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheduler {
    kind: SchedulerKind,
    queue: VecDeque<QueuedRequest>,
}

impl Scheduler {
    /// Returns an empty scheduler of the given kind.
    pub fn new(kind: SchedulerKind) -> Self {
        Self { kind, queue: VecDeque::new() }
    }

    /// Returns the scheduler kind.
    pub fn kind(&self) -> SchedulerKind {
        self.kind
    }

    /// Returns the number of outstanding requests.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Appends a request and its payload tails to the queue.
    pub fn add(&mut self, req: &Request, payload: &Payload) {
        self.queue.push_back(QueuedRequest {
            req: req.clone(),
            payload: payload.clone(),
            remaining: req.msg_size,
        });
    }

    /// Reverses one [`Scheduler::add`].
    pub fn add_rc(&mut self, gid: Gid) -> Result<(), SimulationError> {
        self.queue
            .pop_back()
            .map(|_| ())
            .ok_or(SimulationError::EmptySchedulerReverse { gid })
    }

    /// Issues the next packet of the head request through the fabric's packet-event entry.
    ///
    /// Returns [`SchedOutcome::Drained`] when the queue is empty. Otherwise one packet of the
    /// head request is injected (the last packet carries the payload tails), the consumed bytes
    /// are recorded in `rc`, and completed requests are popped.
    pub fn next(
        &mut self,
        fabric: &dyn Fabric,
        mapping: &dyn Mapping,
        rc: &mut SchedRc,
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<SchedOutcome, SimulationError> {
        let Some(head) = self.queue.front_mut() else {
            return Ok(SchedOutcome::Drained);
        };

        let packet_size = head.req.packet_size.min(head.remaining);
        let is_last = head.remaining <= head.req.packet_size;
        let args = PacketEventArgs {
            category: &head.req.category,
            sender_gid: head.req.sender_gid,
            final_dest_gid: head.req.final_dest_gid,
            dest_mn_lp: head.req.dest_mn_lp,
            packet_size,
            is_pull: head.req.is_pull,
            pull_size: head.req.pull_size,
            offset: SimTime::ZERO,
            remote_event_size: if is_last { head.req.remote_event_size } else { 0 },
            remote_event: if is_last { &head.payload.remote } else { &[] },
            self_event_size: if is_last { head.req.self_event_size } else { 0 },
            self_event: if is_last { &head.payload.local } else { &[] },
            is_last_packet: is_last,
        };
        let poffset = fabric.packet_event(mapping, args, lp)?;

        rc.issued = true;
        rc.consumed = packet_size;
        head.remaining -= packet_size;
        if head.remaining == 0 {
            rc.completed = self.queue.pop_front();
        }
        Ok(SchedOutcome::NextPacket(poffset))
    }

    /// Reverses one [`Scheduler::next`].
    pub fn next_rc(
        &mut self,
        fabric: &dyn Fabric,
        rc: &mut SchedRc,
        lp: &mut dyn Lp<Event = SimEvent>,
        gid: Gid,
    ) -> Result<(), SimulationError> {
        if !rc.issued {
            // the forward pass found the queue drained and touched nothing
            return Ok(());
        }

        fabric.packet_event_rc(lp);
        if let Some(completed) = rc.completed.take() {
            self.queue.push_front(completed);
        }
        let head = self
            .queue
            .front_mut()
            .ok_or(SimulationError::EmptySchedulerReverse { gid })?;
        head.remaining += rc.consumed;
        rc.consumed = 0;
        rc.issued = false;
        Ok(())
    }
}
