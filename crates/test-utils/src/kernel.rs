use std::{
    cmp::Ordering,
    collections::{BTreeMap, BinaryHeap},
};

use warpnet_core::{Gid, Lp, SimTime};

/// Mean of the uniform local-latency draw, in nanoseconds.
const LOCAL_LATENCY_NS: f64 = 0.5;

// QUEUED EVENT
// ================================================================================================

/// An event waiting in the kernel's queue.
#[derive(Clone, Debug)]
pub struct Queued<E> {
    /// Absolute delivery time.
    pub time: SimTime,
    /// Tie-breaking sequence number (allocation order).
    pub seq: u64,
    /// Destination LP.
    pub dest: Gid,
    /// The event payload.
    pub event: E,
}

impl<E> PartialEq for Queued<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<E> Eq for Queued<E> {}

impl<E> PartialOrd for Queued<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Queued<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so that the earliest (time, seq) pops first from the max-heap
        other
            .time
            .as_nanos()
            .total_cmp(&self.time.as_nanos())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

// TEST KERNEL
// ================================================================================================

/// A sequential, deterministic event kernel.
///
/// Events are processed strictly in (time, allocation order). Each LP gets its own random stream
/// addressed by a draw position, so stepping the position back reproduces the exact pre-draw
/// state, which is the property the host engine's reversible streams guarantee.
#[derive(Clone, Debug)]
pub struct TestKernel<E> {
    now: SimTime,
    num_lps: u64,
    seed: u64,
    next_seq: u64,
    queue: BinaryHeap<Queued<E>>,
    rng_pos: BTreeMap<Gid, u64>,
}

impl<E> TestKernel<E> {
    /// Returns a new kernel with the given RNG seed and LP count.
    pub fn new(seed: u64, num_lps: u64) -> Self {
        Self {
            now: SimTime::ZERO,
            num_lps,
            seed,
            next_seq: 0,
            queue: BinaryHeap::new(),
            rng_pos: BTreeMap::new(),
        }
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Repositions the clock.
    ///
    /// Reverse handlers must observe the time at which the forward handler ran; reverse-replay
    /// drivers use this to restore it before each reverse call.
    pub fn set_now(&mut self, now: SimTime) {
        self.now = now;
    }

    /// Returns the per-LP view handed to handlers.
    pub fn lp(&mut self, gid: Gid) -> TestLp<'_, E> {
        TestLp { gid, kernel: self }
    }

    /// Pops the earliest pending event and advances the clock to its delivery time.
    pub fn pop(&mut self) -> Option<Queued<E>> {
        let queued = self.queue.pop()?;
        self.now = queued.time;
        Some(queued)
    }

    /// Returns an iterator over the pending events, in no particular order.
    pub fn pending(&self) -> impl Iterator<Item = &Queued<E>> {
        self.queue.iter()
    }

    /// Returns the number of pending events.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Returns the draw position of the given LP's random stream.
    pub fn rng_position(&self, gid: Gid) -> u64 {
        self.rng_pos.get(&gid).copied().unwrap_or(0)
    }

    /// Returns a snapshot of every LP's draw position.
    pub fn rng_positions(&self) -> BTreeMap<Gid, u64> {
        self.rng_pos.clone()
    }

    fn next_uniform(&mut self, gid: Gid) -> f64 {
        let pos = self.rng_pos.entry(gid).or_insert(0);
        let value = uniform(self.seed, gid.as_u64(), *pos);
        *pos += 1;
        value
    }

    fn reverse_draw(&mut self, gid: Gid) {
        let pos = self
            .rng_pos
            .get_mut(&gid)
            .filter(|pos| **pos > 0)
            .expect("reverse of a random draw that never happened");
        *pos -= 1;
    }
}

// PER-LP FACADE
// ================================================================================================

/// The per-LP [`Lp`] view over a [`TestKernel`].
#[derive(Debug)]
pub struct TestLp<'a, E> {
    gid: Gid,
    kernel: &'a mut TestKernel<E>,
}

impl<E> Lp for TestLp<'_, E> {
    type Event = E;

    fn gid(&self) -> Gid {
        self.gid
    }

    fn now(&self) -> SimTime {
        self.kernel.now
    }

    fn num_lps(&self) -> u64 {
        self.kernel.num_lps
    }

    fn send(&mut self, dest: Gid, offset: SimTime, event: Self::Event) {
        let seq = self.kernel.next_seq;
        self.kernel.next_seq += 1;
        self.kernel.queue.push(Queued { time: self.kernel.now + offset, seq, dest, event });
    }

    fn rand_exponential(&mut self, mean: f64) -> f64 {
        let u = self.kernel.next_uniform(self.gid);
        -mean * (1.0 - u).ln()
    }

    fn rand_reverse(&mut self) {
        self.kernel.reverse_draw(self.gid);
    }

    fn local_latency(&mut self) -> SimTime {
        SimTime::from_nanos(self.kernel.next_uniform(self.gid) * LOCAL_LATENCY_NS)
    }

    fn local_latency_reverse(&mut self) {
        self.kernel.reverse_draw(self.gid);
    }
}

// RANDOM STREAM
// ================================================================================================

/// Returns the uniform value in `[0, 1)` at the given stream position.
///
/// Counter-based (splitmix64 over a position-derived word), so any position can be revisited:
/// stepping the position back and redrawing yields the identical value.
fn uniform(seed: u64, gid: u64, pos: u64) -> f64 {
    let word = seed
        ^ splitmix64(gid.wrapping_add(1))
            .wrapping_add(pos.wrapping_mul(0x2545_F491_4F6C_DD1D));
    let bits = splitmix64(word);
    (bits >> 11) as f64 / (1u64 << 53) as f64
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use warpnet_core::{Gid, Lp, SimTime};

    use super::TestKernel;

    #[test]
    fn events_pop_in_time_order() {
        let mut kernel: TestKernel<u32> = TestKernel::new(7, 4);
        let mut lp = kernel.lp(Gid::new(0));
        lp.send(Gid::new(1), SimTime::from_nanos(5.0), 50);
        lp.send(Gid::new(2), SimTime::from_nanos(1.0), 10);
        lp.send(Gid::new(3), SimTime::from_nanos(1.0), 11);

        assert_eq!(kernel.pop().unwrap().event, 10);
        assert_eq!(kernel.pop().unwrap().event, 11);
        assert_eq!(kernel.now(), SimTime::from_nanos(1.0));
        assert_eq!(kernel.pop().unwrap().event, 50);
        assert!(kernel.pop().is_none());
    }

    #[test]
    fn random_stream_is_position_reversible() {
        let mut kernel: TestKernel<()> = TestKernel::new(42, 2);
        let gid = Gid::new(1);

        let first: Vec<f64> = {
            let mut lp = kernel.lp(gid);
            (0..16).map(|_| lp.rand_exponential(3.0)).collect()
        };
        assert_eq!(kernel.rng_position(gid), 16);

        for _ in 0..16 {
            kernel.lp(gid).rand_reverse();
        }
        assert_eq!(kernel.rng_position(gid), 0);

        let second: Vec<f64> = {
            let mut lp = kernel.lp(gid);
            (0..16).map(|_| lp.rand_exponential(3.0)).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn streams_are_per_lp() {
        let mut kernel: TestKernel<()> = TestKernel::new(42, 2);
        let a = kernel.lp(Gid::new(0)).rand_exponential(1.0);
        let b = kernel.lp(Gid::new(1)).rand_exponential(1.0);
        assert_ne!(a, b);
        assert_eq!(kernel.rng_position(Gid::new(0)), 1);
        assert_eq!(kernel.rng_position(Gid::new(1)), 1);
    }
}
