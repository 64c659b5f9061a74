pub mod loader;
pub mod plan;

pub use loader::{BackfillDone, BackfillError, BackfillKind, BackfillLoader, SkippedAnchor};
pub use plan::{merge_older, plan_older, plan_skipped, split_skipped, BackfillRequest};
