//! Path-only handle to a suspended preindex

use std::path::Path;

use super::budget::MappingLease;
use super::documents::Documents;
use super::preindex::Preindex;
use super::word_segments::WordSegments;
use crate::error::Result;
use crate::storage::TempFile;
use crate::structures::RecordLayout;

/// A preindex whose files are closed and unmapped
///
/// References are cheap to hold in bulk and to move between threads. They
/// own their files: dropping a reference removes them.
#[derive(Debug)]
pub struct PreindexReference {
    word_ids: TempFile,
    counts: TempFile,
    documents: TempFile,
    layout: RecordLayout,
}

impl PreindexReference {
    pub(crate) fn new(
        word_ids: TempFile,
        counts: TempFile,
        documents: TempFile,
        layout: RecordLayout,
    ) -> Self {
        Self {
            word_ids,
            counts,
            documents,
            layout,
        }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Word id, count and documents file paths
    pub fn paths(&self) -> [&Path; 3] {
        [
            self.word_ids.path(),
            self.counts.path(),
            self.documents.path(),
        ]
    }

    /// Map the files again, taking `lease` as the new preindex's permit
    pub fn resume(self, lease: MappingLease) -> Result<Preindex> {
        let Self {
            word_ids,
            counts,
            documents,
            layout,
        } = self;
        let segments = WordSegments::open([word_ids, counts])?;
        let documents = Documents::open(documents, layout)?;
        Ok(Preindex::from_parts(segments, documents, lease))
    }

    /// Remove the backing files now, reporting failure
    pub fn delete(self) -> Result<()> {
        self.word_ids.remove()?;
        self.counts.remove()?;
        self.documents.remove()?;
        Ok(())
    }
}
