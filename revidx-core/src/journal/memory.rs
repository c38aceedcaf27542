use super::{DocumentHeader, Journal, JournalCursor, JournalTerm, TermRecord};
use crate::DocId;
use crate::error::Result;

#[derive(Debug, Clone)]
struct MemoryDocument {
    doc_id: DocId,
    meta: u64,
    terms: Vec<JournalTerm>,
}

/// Journal held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    documents: Vec<MemoryDocument>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, doc_id: DocId, meta: u64, terms: Vec<JournalTerm>) {
        self.documents.push(MemoryDocument {
            doc_id,
            meta,
            terms,
        });
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Journal for MemoryJournal {
    fn cursor(&self) -> Result<Box<dyn JournalCursor + '_>> {
        Ok(Box::new(MemoryCursor {
            documents: &self.documents,
            next_doc: 0,
            current: None,
            next_term: 0,
        }))
    }

    fn document_count(&self) -> Option<u64> {
        Some(self.documents.len() as u64)
    }
}

struct MemoryCursor<'a> {
    documents: &'a [MemoryDocument],
    next_doc: usize,
    current: Option<&'a MemoryDocument>,
    next_term: usize,
}

impl JournalCursor for MemoryCursor<'_> {
    fn next_document(&mut self) -> Result<Option<DocumentHeader>> {
        self.current = self.documents.get(self.next_doc);
        self.next_term = 0;
        let Some(doc) = self.current else {
            return Ok(None);
        };
        self.next_doc += 1;
        Ok(Some(DocumentHeader {
            doc_id: doc.doc_id,
            meta: doc.meta,
            term_count: doc.terms.len() as u32,
        }))
    }

    fn next_term(&mut self) -> Result<Option<TermRecord<'_>>> {
        let Some(term) = self.current.and_then(|doc| doc.terms.get(self.next_term)) else {
            return Ok(None);
        };
        self.next_term += 1;
        Ok(Some(TermRecord {
            word_id: term.word_id,
            meta: term.meta,
            positions: &term.positions,
        }))
    }
}
