//! Read access to finished index files

use std::path::Path;

use crate::config::IndexKind;
use crate::error::Result;
use crate::storage::LongArray;
use crate::structures::{BTreeReader, DOCS_BTREE, SkipListReader, WORDS_BTREE};
use crate::{DocId, WordId};

/// One decoded posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub meta: u64,
    /// Byte offset into the positions file, 0 for none (always 0 for plain indexes)
    pub positions_offset: u64,
}

/// A finished reverse index: word directory plus postings file
pub struct ReverseIndexReader {
    words: LongArray,
    docs: LongArray,
    kind: IndexKind,
}

impl ReverseIndexReader {
    pub fn open(docs_path: &Path, words_path: &Path, kind: IndexKind) -> Result<Self> {
        let reader = Self {
            words: LongArray::open(words_path)?,
            docs: LongArray::open(docs_path)?,
            kind,
        };
        reader.directory()?;
        Ok(reader)
    }

    fn directory(&self) -> Result<BTreeReader<'_>> {
        BTreeReader::new(self.words.as_slice(), 0, WORDS_BTREE)
    }

    /// Words in the directory
    pub fn word_count(&self) -> Result<usize> {
        Ok(self.directory()?.len())
    }

    /// `(word_id, postings_offset)` for every word, in word order
    pub fn directory_entries(&self) -> Result<Vec<(WordId, u64)>> {
        Ok(self
            .directory()?
            .iter()
            .map(|entry| (entry[0] as WordId, entry[1]))
            .collect())
    }

    /// Offset of the postings of `word_id`, in words
    pub fn postings_offset(&self, word_id: WordId) -> Result<Option<u64>> {
        let directory = self.directory()?;
        Ok(directory
            .find(word_id as u64)
            .map(|index| directory.entry(index)[1]))
    }

    /// Decoded postings of `word_id`, empty if the word is absent
    pub fn postings(&self, word_id: WordId) -> Result<Vec<Posting>> {
        let Some(offset) = self.postings_offset(word_id)? else {
            return Ok(Vec::new());
        };
        let docs = self.docs.as_slice();
        let offset = offset as usize;
        let postings = match self.kind {
            IndexKind::Plain => BTreeReader::new(docs, offset, DOCS_BTREE)?
                .iter()
                .map(|r| Posting {
                    doc_id: r[0],
                    meta: r[1],
                    positions_offset: 0,
                })
                .collect(),
            IndexKind::Full => SkipListReader::new(docs, offset)?
                .iter()
                .map(|r| Posting {
                    doc_id: r[0],
                    positions_offset: r[1],
                    meta: r[2],
                })
                .collect(),
        };
        Ok(postings)
    }
}
