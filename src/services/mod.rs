pub mod batch;
pub mod history;
pub mod stats;
pub mod summary;
pub mod sync;

pub use batch::{BatchOutcome, BatchPolicy, BatchResult, BatchRunner, ExecutionMode};
pub use history::{HistoryQuery, HistoryService};
pub use stats::{RepoStats, collect_stats};
pub use summary::BatchSummary;
pub use sync::{SyncEngine, SyncPolicy};
