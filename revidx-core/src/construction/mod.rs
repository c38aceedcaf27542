//! Out-of-core reverse index construction
//!
//! Journal shards become preindexes (word segments plus a flat postings
//! file), preindexes are merged pairwise, and the last one standing is
//! encoded into the final word directory and postings files.

mod budget;
mod constructor;
mod documents;
mod finalize;
mod merge;
mod merge_plan;
mod positions;
mod preindex;
mod reference;
mod word_counter;
mod word_segments;

#[cfg(test)]
mod tests;

pub use budget::{MappingBudget, MappingLease};
pub use constructor::{ConstructionStats, IndexOutputs, ReverseIndexConstructor};
pub use documents::Documents;
pub use finalize::{FinalizeStats, counts_to_offsets};
pub use merge::merge_runs;
pub use merge_plan::{MergeAction, MergePlan, PlanState};
pub use positions::{PositionsFileConstructor, read_positions};
pub use preindex::Preindex;
pub use reference::PreindexReference;
pub use word_counter::WordCounter;
pub use word_segments::WordSegments;
