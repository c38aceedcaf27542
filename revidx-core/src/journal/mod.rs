//! Journal input: the document stream a reverse index is built from
//!
//! A journal is an ordered sequence of documents, each carrying its id,
//! metadata and term occurrences. Construction reads every shard twice
//! (once to count words, once to scatter postings), so journals hand out
//! fresh cursors on demand.

mod file;
mod memory;

pub use file::{FileJournal, JournalWriter};
pub use memory::MemoryJournal;

use crate::error::Result;
use crate::{DocId, WordId};

/// Per-document header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentHeader {
    pub doc_id: DocId,
    pub meta: u64,
    pub term_count: u32,
}

/// One term occurrence of the current document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermRecord<'a> {
    pub word_id: WordId,
    pub meta: u64,
    /// Encoded positions, empty when the journal carries none
    pub positions: &'a [u8],
}

/// An owned term, used when writing journals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalTerm {
    pub word_id: WordId,
    pub meta: u64,
    pub positions: Vec<u8>,
}

impl JournalTerm {
    pub fn new(word_id: WordId, meta: u64) -> Self {
        Self {
            word_id,
            meta,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(mut self, positions: impl Into<Vec<u8>>) -> Self {
        self.positions = positions.into();
        self
    }
}

/// Forward-only reader over a journal
///
/// `next_term` yields the terms of the document last returned by
/// `next_document`; advancing to the next document skips any unread terms.
pub trait JournalCursor {
    fn next_document(&mut self) -> Result<Option<DocumentHeader>>;
    fn next_term(&mut self) -> Result<Option<TermRecord<'_>>>;
}

/// A re-readable document stream
pub trait Journal: Sync {
    fn cursor(&self) -> Result<Box<dyn JournalCursor + '_>>;

    /// Number of documents, when known up front
    fn document_count(&self) -> Option<u64> {
        None
    }
}

/// Visit every term occurrence of every document in order
pub fn for_each_term<F>(journal: &dyn Journal, mut f: F) -> Result<()>
where
    F: FnMut(&DocumentHeader, &TermRecord<'_>) -> Result<()>,
{
    let mut cursor = journal.cursor()?;
    while let Some(doc) = cursor.next_document()? {
        while let Some(term) = cursor.next_term()? {
            f(&doc, &term)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_term_order() {
        let mut journal = MemoryJournal::new();
        journal.add_document(1, 10, vec![JournalTerm::new(5, 0), JournalTerm::new(-3, 1)]);
        journal.add_document(2, 20, vec![]);
        journal.add_document(3, 30, vec![JournalTerm::new(5, 2)]);

        let mut seen = Vec::new();
        for_each_term(&journal, |doc, term| {
            seen.push((doc.doc_id, term.word_id, term.meta));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(1, 5, 0), (1, -3, 1), (3, 5, 2)]);
    }

    #[test]
    fn test_skipping_unread_terms() {
        let mut journal = MemoryJournal::new();
        journal.add_document(1, 0, vec![JournalTerm::new(1, 0), JournalTerm::new(2, 0)]);
        journal.add_document(2, 0, vec![JournalTerm::new(3, 0)]);

        let mut cursor = journal.cursor().unwrap();
        assert_eq!(cursor.next_document().unwrap().unwrap().doc_id, 1);
        assert_eq!(cursor.next_document().unwrap().unwrap().doc_id, 2);
        assert_eq!(cursor.next_term().unwrap().unwrap().word_id, 3);
        assert!(cursor.next_term().unwrap().is_none());
        assert!(cursor.next_document().unwrap().is_none());
    }
}
