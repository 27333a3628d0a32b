//! Deterministic stand-ins for the host services warpnet LPs depend on: an event-queue kernel
//! with a position-reversible random stream per LP, a grid-layout mapping service, and a
//! table-backed configuration source.
//!
//! None of this is a PDES engine; it processes events sequentially in timestamp order, which is
//! exactly what unit and scenario tests need. Reverse-computation tests drive reverse handlers by
//! hand, repositioning the kernel clock with [`TestKernel::set_now`].

mod config;
mod kernel;
mod mapping;

pub use config::TestConfig;
pub use kernel::{Queued, TestKernel, TestLp};
pub use mapping::TestMapping;
