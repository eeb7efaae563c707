//! Core engine: resolve → fetch → accumulate → commit.

pub mod accumulator;
pub mod aggregator;
pub mod resolver;
pub mod session;

pub use accumulator::HistoricalAccumulator;
pub use aggregator::{Aggregator, Cycle, PendingSections};
pub use resolver::LocationResolver;
pub use session::{Session, SessionStatus};
