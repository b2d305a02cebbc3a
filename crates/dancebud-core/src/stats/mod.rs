//! Running statistics over the full session history.
//!
//! Statistics are derived state: they are never updated incrementally, only
//! recomputed from every stored summary. This keeps them consistent with the
//! session table at the cost of an O(n) scan per write.

mod aggregator;

pub use aggregator::{RunningStatistics, StatsAggregator};
