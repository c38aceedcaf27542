//! Reverse index construction from journal shards
//!
//! 1. Every shard becomes a preindex, built in parallel and suspended.
//! 2. The references are merged pairwise by a parallel reduce until one
//!    remains.
//! 3. The survivor is finalized into the output files.
//!
//! Outputs are written next to their final paths with a `.tmp` suffix and
//! renamed into place only once everything succeeded.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use super::budget::MappingBudget;
use super::positions::PositionsFileConstructor;
use super::preindex::Preindex;
use super::reference::PreindexReference;
use crate::config::ConstructionConfig;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::progress::{Phase, ProgressSink};
use crate::rewriter::DocIdRewriter;
use crate::storage::{TempFile, remove_if_exists};

/// Where the finished index goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutputs {
    /// Postings file
    pub docs: PathBuf,
    /// Word directory
    pub words: PathBuf,
    /// Positions file, required for position-aware indexes
    pub positions: Option<PathBuf>,
}

impl IndexOutputs {
    pub fn new(docs: impl Into<PathBuf>, words: impl Into<PathBuf>) -> Self {
        Self {
            docs: docs.into(),
            words: words.into(),
            positions: None,
        }
    }

    pub fn with_positions(mut self, positions: impl Into<PathBuf>) -> Self {
        self.positions = Some(positions.into());
        self
    }
}

/// Summary of a construction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructionStats {
    pub shards: usize,
    pub merges: usize,
    pub words: usize,
    pub postings: usize,
    /// Postings file size in words
    pub docs_size: usize,
    /// Word directory size in words
    pub words_size: usize,
    /// Most preindexes that were mapped at the same time
    pub peak_live_preindexes: usize,
}

pub struct ReverseIndexConstructor {
    config: ConstructionConfig,
    rewriter: Box<dyn DocIdRewriter>,
    progress: Box<dyn ProgressSink>,
    pool: rayon::ThreadPool,
    budget: Arc<MappingBudget>,
}

impl ReverseIndexConstructor {
    pub fn new(
        config: ConstructionConfig,
        rewriter: impl DocIdRewriter + 'static,
        progress: impl ProgressSink + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("revidx-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("thread pool: {}", e)))?;
        let budget = MappingBudget::new(config.effective_live_preindexes());

        Ok(Self {
            config,
            rewriter: Box::new(rewriter),
            progress: Box::new(progress),
            pool,
            budget,
        })
    }

    pub fn config(&self) -> &ConstructionConfig {
        &self.config
    }

    pub fn budget(&self) -> &MappingBudget {
        &self.budget
    }

    /// Build the reverse index of `shards` into `outputs`
    pub fn create_reverse_index<J: Journal>(
        &self,
        shards: &[J],
        outputs: &IndexOutputs,
    ) -> Result<ConstructionStats> {
        self.build_index(shards, outputs).inspect_err(|e| {
            if e.is_fatal() {
                log::error!("Reverse index construction aborted on inconsistent data: {}", e);
            } else {
                log::error!("Reverse index construction failed: {}", e);
            }
        })
    }

    fn build_index<J: Journal>(
        &self,
        shards: &[J],
        outputs: &IndexOutputs,
    ) -> Result<ConstructionStats> {
        let layout = self.config.layout();
        match (layout.has_positions(), &outputs.positions) {
            (true, None) => {
                return Err(Error::Config(
                    "position-aware index needs a positions output".into(),
                ));
            }
            (false, Some(_)) => {
                return Err(Error::Config(
                    "plain index has no positions output".into(),
                ));
            }
            _ => {}
        }

        for path in [&outputs.docs, &outputs.words]
            .into_iter()
            .chain(outputs.positions.as_ref())
        {
            remove_if_exists(path)?;
        }
        std::fs::create_dir_all(&self.config.work_dir)?;

        let docs_tmp = TempFile::adopt(tmp_sibling(&outputs.docs));
        let words_tmp = TempFile::adopt(tmp_sibling(&outputs.words));
        let positions_tmp = outputs
            .positions
            .as_ref()
            .map(|path| TempFile::adopt(tmp_sibling(path)));
        let positions = positions_tmp
            .as_ref()
            .map(|tmp| PositionsFileConstructor::create(tmp.path()))
            .transpose()?;

        self.progress.phase(Phase::SegmentBuild);
        let references = self.build_shards(shards, positions.as_ref())?;

        self.progress.phase(Phase::Merge);
        let merges = references.len().saturating_sub(1);
        let merged = self.merge_all(references)?;

        self.progress.phase(Phase::Finalize);
        let preindex = match merged {
            Some(reference) => reference.resume(self.budget.acquire(1)?)?,
            None => Preindex::empty(&self.config.work_dir, layout, self.budget.acquire(1)?)?,
        };
        let finalized = preindex.finalize(docs_tmp.path(), words_tmp.path())?;

        let mut pending = vec![(docs_tmp, outputs.docs.as_path())];
        pending.push((words_tmp, outputs.words.as_path()));
        if let (Some(positions), Some(tmp), Some(target)) =
            (positions, positions_tmp, outputs.positions.as_deref())
        {
            positions.finish()?;
            pending.push((tmp, target));
        }
        publish(pending)?;

        let stats = ConstructionStats {
            shards: shards.len(),
            merges,
            words: finalized.words,
            postings: finalized.postings,
            docs_size: finalized.docs_size,
            words_size: finalized.words_size,
            peak_live_preindexes: self.budget.peak(),
        };
        log::info!(
            "Reverse index complete: {} shards, {} merges, {} words, {} postings, peak {} live preindexes",
            stats.shards,
            stats.merges,
            stats.words,
            stats.postings,
            stats.peak_live_preindexes
        );
        self.progress.phase(Phase::Finished);
        Ok(stats)
    }

    /// Build and suspend one preindex per shard.
    ///
    /// Shards are built in waves no larger than the mapping budget. A build
    /// waits on the pool while sorting, so it must never have to wait for a
    /// permit as well.
    fn build_shards<J: Journal>(
        &self,
        shards: &[J],
        positions: Option<&PositionsFileConstructor>,
    ) -> Result<Vec<PreindexReference>> {
        let wave = match self.budget.capacity() {
            0 => shards.len().max(1),
            n => n,
        };
        let total = shards.len() as u64;
        let done = AtomicU64::new(0);

        let mut references = Vec::with_capacity(shards.len());
        for chunk in shards.chunks(wave) {
            let built = self.pool.install(|| {
                chunk
                    .par_iter()
                    .map(|journal| {
                        let preindex = Preindex::construct(
                            journal,
                            &self.config,
                            self.rewriter.as_ref(),
                            positions,
                            self.budget.acquire(1)?,
                        )?;
                        let reference = preindex.suspend()?;
                        self.progress
                            .progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                        Ok(reference)
                    })
                    .collect::<Result<Vec<_>>>()
            })?;
            references.extend(built);
        }
        Ok(references)
    }

    /// Pairwise parallel reduce down to a single reference
    fn merge_all(&self, references: Vec<PreindexReference>) -> Result<Option<PreindexReference>> {
        let total = references.len().saturating_sub(1) as u64;
        let done = AtomicU64::new(0);
        self.pool
            .install(|| {
                references
                    .into_par_iter()
                    .map(Ok::<_, Error>)
                    .try_reduce_with(|left, right| {
                        let merged = self.merge_references(left, right)?;
                        self.progress
                            .progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                        Ok(merged)
                    })
            })
            .transpose()
    }

    /// Merge two suspended preindexes into a suspended result.
    ///
    /// All three permits are taken at once, so a waiting merge holds none.
    fn merge_references(
        &self,
        left: PreindexReference,
        right: PreindexReference,
    ) -> Result<PreindexReference> {
        let mut lease = self.budget.acquire(3)?;
        let left = left.resume(lease.split_one()?)?;
        let right = right.resume(lease.split_one()?)?;
        let merged = Preindex::merge(&self.config.work_dir, &left, &right, lease)?;
        left.discard();
        right.discard();
        merged.suspend()
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Rename every scratch file into place, undoing on failure
fn publish(pending: Vec<(TempFile, &Path)>) -> Result<()> {
    let mut published: Vec<&Path> = Vec::with_capacity(pending.len());
    for (tmp, target) in pending {
        if let Err(e) = std::fs::rename(tmp.path(), target) {
            for path in published {
                if let Err(e) = remove_if_exists(path) {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
            return Err(e.into());
        }
        tmp.persist();
        published.push(target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_sibling() {
        assert_eq!(
            tmp_sibling(Path::new("/data/index/rev-docs.dat")),
            PathBuf::from("/data/index/rev-docs.dat.tmp")
        );
    }
}
