//! revidx - out-of-core reverse index construction
//!
//! Builds the inverted index of a search engine from a stream of documents:
//! - Journal shards are turned into preindexes in parallel, spilling word
//!   counts to disk so memory stays bounded
//! - Preindexes are merged pairwise in a parallel reduce, streaming through
//!   memory-mapped files with no per-posting allocation
//! - The final preindex is encoded into a b-tree word directory and a
//!   postings file of per-word b-trees or skip lists

pub mod config;
pub mod construction;
pub mod error;
pub mod journal;
pub mod progress;
pub mod reader;
pub mod rewriter;
pub mod storage;
pub mod structures;

/// Word (term) id; word ids sort in signed order
pub type WordId = i64;

/// Document id, after rewriting
pub type DocId = u64;

pub use config::{ConstructionConfig, IndexKind};
pub use construction::{
    ConstructionStats, IndexOutputs, MappingBudget, Preindex, PreindexReference,
    ReverseIndexConstructor,
};
pub use error::{Error, Result};
pub use journal::{
    DocumentHeader, FileJournal, Journal, JournalCursor, JournalTerm, JournalWriter,
    MemoryJournal, TermRecord,
};
pub use progress::{LogProgress, NoProgress, Phase, ProgressSink};
pub use reader::{Posting, ReverseIndexReader};
pub use rewriter::{DocIdRewriter, DomainRankRewriter, IdentityRewriter};
