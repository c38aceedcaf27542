//! Documents file of a preindex: every posting, grouped by word segment
//!
//! Postings are scattered into place using one write cursor per word, then
//! each segment is sorted by rewritten doc id. Most words have a handful of
//! postings, so small segments are sorted inline and only large ones are
//! handed to the thread pool.

use std::path::Path;

use super::positions::PositionsFileConstructor;
use super::word_segments::WordSegments;
use crate::config::ConstructionConfig;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::rewriter::DocIdRewriter;
use crate::storage::{LongArray, TempFile};
use crate::structures::{RecordField, RecordLayout, RecordView, RecordViewMut};

pub struct Documents {
    array: LongArray,
    layout: RecordLayout,
    file: TempFile,
}

impl Documents {
    /// Scatter the postings of a journal shard and sort every segment
    pub fn construct(
        journal: &dyn Journal,
        segments: &WordSegments,
        rewriter: &dyn DocIdRewriter,
        positions: Option<&PositionsFileConstructor>,
        config: &ConstructionConfig,
    ) -> Result<Self> {
        let layout = config.layout();
        if layout.has_positions() && positions.is_none() {
            return Err(Error::Config(
                "position-aware index requires a positions file".into(),
            ));
        }

        let records = segments.total_count() as usize;
        let mut documents = Self::allocate(&config.work_dir, layout, records)?;

        let cursor_file = TempFile::new(&config.work_dir, "segment_cursors", "dat");
        let mut cursors = LongArray::create(cursor_file.path(), segments.len())?;
        let mut start = 0;
        for (cursor, &count) in cursors.as_mut_slice().iter_mut().zip(segments.counts()) {
            *cursor = start;
            start += count;
        }

        documents.scatter(journal, segments, cursors.as_mut_slice(), rewriter, positions)?;
        verify_cursors(segments.counts(), cursors.as_slice())?;
        drop(cursors);
        drop(cursor_file);

        documents.sort_segments(segments.counts(), config.inline_sort_threshold);
        Ok(documents)
    }

    fn scatter(
        &mut self,
        journal: &dyn Journal,
        segments: &WordSegments,
        cursors: &mut [u64],
        rewriter: &dyn DocIdRewriter,
        positions: Option<&PositionsFileConstructor>,
    ) -> Result<()> {
        let records = self.len();
        let mut view = self.view_mut();

        let mut cursor = journal.cursor()?;
        while let Some(doc) = cursor.next_document()? {
            let doc_id = rewriter.rewrite(doc.doc_id);
            while let Some(term) = cursor.next_term()? {
                let segment = segments.find(term.word_id).ok_or_else(|| {
                    Error::Corruption(format!(
                        "word {} of document {} was not counted",
                        term.word_id, doc.doc_id
                    ))
                })?;
                let at = cursors[segment] as usize;
                if at >= records {
                    return Err(Error::Corruption(format!(
                        "posting cursor {} beyond {} records",
                        at, records
                    )));
                }

                view.set(at, RecordField::DocId, doc_id);
                view.set(at, RecordField::Meta, term.meta);
                if let Some(positions) = positions {
                    let offset = positions.add(term.positions)?;
                    view.set(at, RecordField::PositionsOffset, offset);
                }
                cursors[segment] += 1;
            }
        }
        Ok(())
    }

    fn sort_segments(&mut self, counts: &[u64], inline_threshold: usize) {
        let mut large = 0usize;
        let view = self.view_mut();
        rayon::scope(|scope| {
            let mut rest = view;
            for &count in counts {
                let (mut segment, tail) = rest.split_at(count as usize);
                rest = tail;
                if segment.len() < inline_threshold {
                    segment.sort_by_doc();
                } else {
                    large += 1;
                    scope.spawn(move |_| segment.sort_by_doc());
                }
            }
        });
        log::debug!(
            "Sorted {} segments, {} on the pool",
            counts.len(),
            large
        );
    }

    /// Zeroed documents file holding `records` records
    pub fn allocate(work_dir: &Path, layout: RecordLayout, records: usize) -> Result<Self> {
        let file = TempFile::new(work_dir, "documents", "dat");
        let array = LongArray::create(file.path(), records * layout.words())?;
        Ok(Self {
            array,
            layout,
            file,
        })
    }

    pub(crate) fn open(file: TempFile, layout: RecordLayout) -> Result<Self> {
        let array = LongArray::open(file.path())?;
        if array.len() % layout.words() != 0 {
            return Err(Error::Corruption(format!(
                "{} holds {} words, not whole {}-word records",
                file.path().display(),
                array.len(),
                layout.words()
            )));
        }
        Ok(Self {
            array,
            layout,
            file,
        })
    }

    pub(crate) fn close(self) -> Result<TempFile> {
        let Self { array, file, .. } = self;
        array.close()?;
        Ok(file)
    }

    pub(crate) fn into_file(self) -> TempFile {
        self.file
    }

    /// Truncate to the first `records` records
    pub(crate) fn shrink(self, records: usize) -> Result<Self> {
        let Self {
            array,
            layout,
            file,
        } = self;
        let before = array.len();
        let array = array.resize(records * layout.words())?;
        log::info!(
            "Shrunk {} from {} to {} words",
            file.path().display(),
            before,
            array.len()
        );
        Ok(Self {
            array,
            layout,
            file,
        })
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.layout.records_in(self.array.len())
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn view(&self) -> RecordView<'_> {
        RecordView::new(self.array.as_slice(), self.layout)
    }

    pub fn view_mut(&mut self) -> RecordViewMut<'_> {
        RecordViewMut::new(self.array.as_mut_slice(), self.layout)
    }

    pub fn force(&self) -> Result<()> {
        self.array.force()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl std::fmt::Debug for Documents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Documents")
            .field("records", &self.len())
            .field("layout", &self.layout)
            .field("path", &self.file.path())
            .finish()
    }
}

/// Every cursor must have advanced exactly to its segment's end
fn verify_cursors(counts: &[u64], cursors: &[u64]) -> Result<()> {
    let mut end = 0;
    for (i, (&count, &cursor)) in counts.iter().zip(cursors).enumerate() {
        end += count;
        if cursor != end {
            return Err(Error::Corruption(format!(
                "segment {} filled to {} but ends at {}",
                i, cursor, end
            )));
        }
    }
    Ok(())
}
