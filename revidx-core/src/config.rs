//! Configuration for reverse index construction

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::structures::RecordLayout;

/// Which kind of reverse index to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Postings are `(doc_id, meta)`, encoded as embedded b-trees
    #[default]
    Plain,
    /// Postings are `(doc_id, positions_offset, meta)`, encoded as skip lists
    Full,
}

impl IndexKind {
    pub fn layout(self) -> RecordLayout {
        match self {
            IndexKind::Plain => RecordLayout::PLAIN,
            IndexKind::Full => RecordLayout::FULL,
        }
    }
}

/// Smallest mapping budget that still lets one merge run (left, right, destination)
pub const MIN_LIVE_PREINDEXES: usize = 3;

/// Configuration for [`crate::ReverseIndexConstructor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Directory for temporary preindex and spill files
    pub work_dir: PathBuf,
    /// Record layout of the index being built
    pub index_kind: IndexKind,
    /// Word segments with fewer records than this are sorted inline
    /// instead of being dispatched to the thread pool
    pub inline_sort_threshold: usize,
    /// Worker threads for shard construction, sorting and merging
    pub num_threads: usize,
    /// Distinct word ids the word counter keeps in memory before spilling
    pub count_memory_entries: usize,
    /// Max preindexes memory-mapped at once (0 = unbounded)
    pub max_live_preindexes: usize,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            index_kind: IndexKind::Plain,
            inline_sort_threshold: 1024,
            num_threads: num_cpus::get().max(1),
            count_memory_entries: 1_000_000,
            max_live_preindexes: 0,
        }
    }
}

impl ConstructionConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_index_kind(mut self, kind: IndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    pub fn with_inline_sort_threshold(mut self, threshold: usize) -> Self {
        self.inline_sort_threshold = threshold;
        self
    }

    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    pub fn with_count_memory_entries(mut self, entries: usize) -> Self {
        self.count_memory_entries = entries;
        self
    }

    pub fn with_max_live_preindexes(mut self, max: usize) -> Self {
        self.max_live_preindexes = max;
        self
    }

    pub fn layout(&self) -> RecordLayout {
        self.index_kind.layout()
    }

    /// Mapping budget actually enforced, with 0 meaning unbounded
    pub fn effective_live_preindexes(&self) -> usize {
        match self.max_live_preindexes {
            0 => 0,
            n => n.max(MIN_LIVE_PREINDEXES),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::Config("num_threads must be at least 1".into()));
        }
        if self.count_memory_entries == 0 {
            return Err(Error::Config(
                "count_memory_entries must be at least 1".into(),
            ));
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err(Error::Config("work_dir is empty".into()));
        }
        Ok(())
    }
}
