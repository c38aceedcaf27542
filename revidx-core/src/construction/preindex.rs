//! Preindex: the unit of construction and merging
//!
//! A preindex pairs a [`WordSegments`] directory with a [`Documents`] file.
//! It is built from one journal shard or merged from two preindexes, and
//! while alive it keeps both mapped and holds one permit of the mapping
//! budget. [`Preindex::suspend`] unmaps it into a [`PreindexReference`];
//! dropping either without finalizing removes the backing files.

use std::path::Path;

use super::budget::MappingLease;
use super::documents::Documents;
use super::finalize::{self, FinalizeStats};
use super::merge;
use super::positions::PositionsFileConstructor;
use super::reference::PreindexReference;
use super::word_segments::WordSegments;
use crate::WordId;
use crate::config::ConstructionConfig;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::rewriter::DocIdRewriter;
use crate::structures::{RecordLayout, RecordView};

#[derive(Debug)]
pub struct Preindex {
    segments: WordSegments,
    documents: Documents,
    // Dropped last: the permit outlives the mapping
    lease: MappingLease,
}

impl Preindex {
    /// Build a preindex from one journal shard
    pub fn construct(
        journal: &dyn Journal,
        config: &ConstructionConfig,
        rewriter: &dyn DocIdRewriter,
        positions: Option<&PositionsFileConstructor>,
        lease: MappingLease,
    ) -> Result<Self> {
        let segments =
            WordSegments::construct(journal, &config.work_dir, config.count_memory_entries)?;
        let documents = Documents::construct(journal, &segments, rewriter, positions, config)?;
        log::info!(
            "Constructed preindex: {} words, {} postings",
            segments.len(),
            documents.len()
        );
        Ok(Self::from_parts(segments, documents, lease))
    }

    /// A preindex with no words
    pub fn empty(work_dir: &Path, layout: RecordLayout, lease: MappingLease) -> Result<Self> {
        Ok(Self::from_parts(
            WordSegments::allocate(work_dir, 0)?,
            Documents::allocate(work_dir, layout, 0)?,
            lease,
        ))
    }

    pub(crate) fn from_parts(
        segments: WordSegments,
        documents: Documents,
        lease: MappingLease,
    ) -> Self {
        Self {
            segments,
            documents,
            lease,
        }
    }

    /// Merge two preindexes into a new one; see [`merge::merge`]
    pub fn merge(
        work_dir: &Path,
        left: &Preindex,
        right: &Preindex,
        lease: MappingLease,
    ) -> Result<Self> {
        merge::merge(work_dir, left, right, lease)
    }

    pub fn segments(&self) -> &WordSegments {
        &self.segments
    }

    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    pub fn layout(&self) -> RecordLayout {
        self.documents.layout()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut WordSegments, &Documents) {
        (&mut self.segments, &self.documents)
    }

    /// Every `(word_id, postings)` pair in word order
    pub fn iter_segments(&self) -> impl Iterator<Item = (WordId, RecordView<'_>)> + '_ {
        let view = self.documents.view();
        let mut start = 0;
        self.segments.iter().map(move |(word_id, count)| {
            let end = start + count as usize;
            let segment = view.segment(start..end);
            start = end;
            (word_id, segment)
        })
    }

    /// The documents file must hold exactly the postings the counts describe
    pub(crate) fn check_sizes(&self) -> Result<()> {
        let counted = self.segments.total_count();
        if counted != self.documents.len() as u64 {
            return Err(Error::Corruption(format!(
                "word segments count {} postings, documents file holds {}",
                counted,
                self.documents.len()
            )));
        }
        Ok(())
    }

    /// Check word order, sizes and per-segment doc order
    pub fn validate(&self) -> Result<()> {
        self.segments.validate()?;
        self.check_sizes()?;
        if let Some((word_id, _)) = self
            .iter_segments()
            .find(|(_, postings)| !postings.is_sorted_by_doc())
        {
            return Err(Error::Corruption(format!(
                "postings of word {} are not sorted by doc id",
                word_id
            )));
        }
        Ok(())
    }

    pub fn force(&self) -> Result<()> {
        self.segments.force()?;
        self.documents.force()
    }

    /// Unmap, returning a path-only reference and the mapping permit
    pub fn suspend(self) -> Result<PreindexReference> {
        let Self {
            segments,
            documents,
            lease,
        } = self;
        let layout = documents.layout();
        let [word_ids, counts] = segments.close()?;
        let documents = documents.close()?;
        drop(lease);
        Ok(PreindexReference::new(word_ids, counts, documents, layout))
    }

    /// Encode into the final index files, then delete the preindex.
    ///
    /// On failure the outputs may be partially written; callers write to
    /// scratch paths and publish only on success. Once the outputs are
    /// written, failing to remove the preindex is only logged.
    pub fn finalize(mut self, docs_out: &Path, words_out: &Path) -> Result<FinalizeStats> {
        let stats = finalize::finalize(&mut self, docs_out, words_out)?;
        self.discard();
        Ok(stats)
    }

    /// Remove the backing files of a preindex that is no longer needed,
    /// logging rather than returning a removal failure
    pub(crate) fn discard(self) {
        if let Err(e) = self.delete() {
            log::warn!("Failed to remove preindex files: {}", e);
        }
    }

    /// Remove the backing files now, reporting failure
    pub fn delete(self) -> Result<()> {
        let Self {
            segments,
            documents,
            lease,
        } = self;
        let [word_ids, counts] = segments.into_files();
        let documents = documents.into_file();
        word_ids.remove()?;
        counts.remove()?;
        documents.remove()?;
        drop(lease);
        Ok(())
    }
}
