use crate::{Gid, SimTime};

// EVENT KERNEL INTERFACE
// ================================================================================================

/// The per-LP view of the host PDES engine, handed to every forward and reverse handler.
///
/// The host owns the event loop, event storage, global virtual time and the per-LP random-number
/// streams; handlers interact with all of them exclusively through this trait. Handlers run to
/// completion and never block; the only way to "wait" is to schedule a future event via
/// [`Lp::send`].
///
/// Two disciplines are required of implementations and callers alike:
///
/// - Determinism: for a fixed event order, every method must return the same values on forward
///   re-execution after a rollback.
/// - RNG reversibility: each stochastic draw ([`Lp::rand_exponential`], [`Lp::local_latency`])
///   advances the LP's stream by exactly one position, and the matching reverse primitive steps
///   it back by one. Reverse handlers must issue one reverse call per forward draw.
pub trait Lp {
    /// The event payload type carried by the host's event queue.
    type Event;

    /// Returns the global id of this LP.
    fn gid(&self) -> Gid;

    /// Returns the current virtual time of this LP.
    fn now(&self) -> SimTime;

    /// Returns the total number of LPs in the simulation.
    fn num_lps(&self) -> u64;

    /// Allocates an event addressed to `dest` at `now + offset` and hands it to the host for
    /// delivery.
    ///
    /// The host owns the event from this point on; handlers must not retain references to it.
    fn send(&mut self, dest: Gid, offset: SimTime, event: Self::Event);

    /// Draws an exponentially distributed value with the given mean from this LP's stream.
    fn rand_exponential(&mut self, mean: f64) -> f64;

    /// Steps this LP's random stream back by one position.
    fn rand_reverse(&mut self);

    /// Draws a small GVT-safe scheduling latency from this LP's stream.
    ///
    /// Used to break ties between self-scheduled events; consumes one stream position.
    fn local_latency(&mut self) -> SimTime;

    /// Reverses one [`Lp::local_latency`] draw.
    fn local_latency_reverse(&mut self);
}
