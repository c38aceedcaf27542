//! Word segment directory of a preindex
//!
//! Two parallel mapped arrays: the sorted distinct word ids (signed, stored
//! as their bit patterns) and, per word, the number of postings in its
//! segment of the documents file. Segment `i` starts where segment `i - 1`
//! ends, so counts alone locate every segment.

use std::path::Path;

use super::word_counter::WordCounter;
use crate::WordId;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::storage::{LongArray, TempFile};

pub struct WordSegments {
    word_ids: LongArray,
    counts: LongArray,
    // Declared after the arrays so files are unmapped before removal
    files: [TempFile; 2],
}

impl WordSegments {
    /// Count the word occurrences of a journal shard
    pub fn construct(journal: &dyn Journal, work_dir: &Path, memory_entries: usize) -> Result<Self> {
        let files = Self::new_files(work_dir);
        let mut counter = WordCounter::new(work_dir, memory_entries);

        let mut cursor = journal.cursor()?;
        while cursor.next_document()?.is_some() {
            while let Some(term) = cursor.next_term()? {
                counter.add(term.word_id)?;
            }
        }

        let (word_ids, counts) = counter.finish(files[0].path(), files[1].path())?;
        Ok(Self {
            word_ids,
            counts,
            files,
        })
    }

    /// Zeroed directory for `len` words
    pub fn allocate(work_dir: &Path, len: usize) -> Result<Self> {
        let files = Self::new_files(work_dir);
        let word_ids = LongArray::create(files[0].path(), len)?;
        let counts = LongArray::create(files[1].path(), len)?;
        Ok(Self {
            word_ids,
            counts,
            files,
        })
    }

    /// Remap a directory from its files
    pub(crate) fn open(files: [TempFile; 2]) -> Result<Self> {
        let word_ids = LongArray::open(files[0].path())?;
        let counts = LongArray::open(files[1].path())?;
        if word_ids.len() != counts.len() {
            return Err(Error::Corruption(format!(
                "{} word ids but {} counts",
                word_ids.len(),
                counts.len()
            )));
        }
        Ok(Self {
            word_ids,
            counts,
            files,
        })
    }

    /// Flush and unmap, handing back the file guards
    pub(crate) fn close(self) -> Result<[TempFile; 2]> {
        let Self {
            word_ids,
            counts,
            files,
        } = self;
        word_ids.close()?;
        counts.close()?;
        Ok(files)
    }

    /// Unmap without flushing, handing back the file guards
    pub(crate) fn into_files(self) -> [TempFile; 2] {
        self.files
    }

    fn new_files(work_dir: &Path) -> [TempFile; 2] {
        [
            TempFile::new(work_dir, "segment_words", "dat"),
            TempFile::new(work_dir, "segment_counts", "dat"),
        ]
    }

    pub fn len(&self) -> usize {
        self.word_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_ids.is_empty()
    }

    /// Raw word id words; interpret with `as WordId`
    pub fn word_ids(&self) -> &[u64] {
        self.word_ids.as_slice()
    }

    pub(crate) fn word_ids_mut(&mut self) -> &mut [u64] {
        self.word_ids.as_mut_slice()
    }

    #[inline]
    pub fn word_id(&self, index: usize) -> WordId {
        self.word_ids.get(index) as WordId
    }

    pub fn counts(&self) -> &[u64] {
        self.counts.as_slice()
    }

    pub(crate) fn counts_mut(&mut self) -> &mut [u64] {
        self.counts.as_mut_slice()
    }

    pub(crate) fn arrays_mut(&mut self) -> (&[u64], &mut [u64]) {
        (self.word_ids.as_slice(), self.counts.as_mut_slice())
    }

    /// Total postings across all segments
    pub fn total_count(&self) -> u64 {
        self.counts().iter().sum()
    }

    /// Directory index of `word_id`
    pub fn find(&self, word_id: WordId) -> Option<usize> {
        self.word_ids()
            .binary_search_by_key(&word_id, |&w| w as WordId)
            .ok()
    }

    /// Iterate `(word_id, count)` pairs in word order
    pub fn iter(&self) -> impl Iterator<Item = (WordId, u64)> + '_ {
        self.word_ids()
            .iter()
            .map(|&w| w as WordId)
            .zip(self.counts().iter().copied())
    }

    pub fn force(&self) -> Result<()> {
        self.word_ids.force()?;
        self.counts.force()
    }

    /// Word id and count file paths
    pub fn paths(&self) -> [&Path; 2] {
        [self.files[0].path(), self.files[1].path()]
    }

    /// Word ids must be strictly increasing in signed order
    pub fn validate(&self) -> Result<()> {
        let ids = self.word_ids();
        if let Some(i) = (1..ids.len()).find(|&i| ids[i - 1] as WordId >= ids[i] as WordId) {
            return Err(Error::Corruption(format!(
                "word ids out of order at {}: {} then {}",
                i,
                ids[i - 1] as WordId,
                ids[i] as WordId
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WordSegments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordSegments")
            .field("words", &self.len())
            .field("path", &self.files[0].path())
            .finish()
    }
}
