//! Reconciliation core: snapshot fetching, comparison and reporting.

pub mod compare;
pub mod report;
pub mod snapshot;

pub use compare::{Divergence, Reconciliation, compare};
pub use snapshot::{CheckMode, EntryState, Snapshot, fetch_snapshot};
