/*!
Poll aggregation and elector tallies for two-candidate contests.

For each region of a [registry::RegionRegistry], the [aggregator] turns raw polls into a
single [StatePollingRecord], escalating through wider windows and fallback tiers until
it gets an answer. The records of all regions form a [Snapshot], which [compute_tally]
reduces to weighted elector totals. Snapshots accumulate in a [history::History], from
which [changes] reports what moved between two dates. The [interpolate] module builds
synthetic snapshots between two real ones.

See the [manual] for the details of each step.
*/

mod config;
mod tally;

pub mod aggregator;
pub mod builder;
pub mod changes;
pub mod history;
pub mod interpolate;
pub mod manual;
pub mod registry;

pub use crate::config::*;
pub use crate::tally::compute_tally;
