//! Encoding a preindex into the final index files
//!
//! Postings file: one encoded structure per non-empty word segment, a
//! b-tree of `(doc_id, meta)` for plain indexes or a skip list of
//! `(doc_id, positions_offset, meta)` for full ones, laid end to end.
//!
//! Word directory: a b-tree of `(word_id, postings_offset)` keyed by signed
//! word id, offsets in words from the start of the postings file.

use std::path::Path;

use super::preindex::Preindex;
use crate::error::{Error, Result};
use crate::storage::LongArray;
use crate::structures::{
    BTreeContext, BTreeWriter, DOCS_BTREE, RecordLayout, SkipListWriter, WORDS_BTREE, skiplist,
};

/// Sizes of a finalized index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeStats {
    /// Words in the directory
    pub words: usize,
    pub postings: usize,
    /// Postings file size in words
    pub docs_size: usize,
    /// Word directory size in words
    pub words_size: usize,
}

/// How one word segment is encoded
#[derive(Debug, Clone, Copy)]
enum SegmentEncoder {
    BTree(BTreeContext),
    SkipList,
}

impl SegmentEncoder {
    fn for_layout(layout: RecordLayout) -> Self {
        if layout.has_positions() {
            SegmentEncoder::SkipList
        } else {
            SegmentEncoder::BTree(DOCS_BTREE)
        }
    }

    fn calculate_size(self, records: usize) -> usize {
        match self {
            SegmentEncoder::BTree(ctx) => ctx.calculate_size(records),
            SegmentEncoder::SkipList => skiplist::calculate_size(records),
        }
    }

    fn write(self, out: &mut [u64], offset: usize, run: &[u64], records: usize) -> Result<usize> {
        match self {
            SegmentEncoder::BTree(ctx) => {
                BTreeWriter::new(out, ctx).write(offset, records, |data| {
                    data.copy_from_slice(run);
                    Ok(())
                })
            }
            SegmentEncoder::SkipList => SkipListWriter::new(out).write(offset, run),
        }
    }
}

/// Turn per-word counts into cumulative end offsets in words.
///
/// `counts[i]` becomes `record_words * (counts[0] + ... + counts[i])`, so
/// segment `i` spans `counts[i - 1]..counts[i]`. Returns the total.
pub fn counts_to_offsets(counts: &mut [u64], record_words: usize) -> u64 {
    let mut end = 0;
    for value in counts.iter_mut() {
        end += *value * record_words as u64;
        *value = end;
    }
    end
}

pub(super) fn finalize(
    preindex: &mut Preindex,
    docs_out: &Path,
    words_out: &Path,
) -> Result<FinalizeStats> {
    preindex.check_sizes()?;
    let layout = preindex.layout();
    let record_words = layout.words();
    let (segments, documents) = preindex.parts_mut();

    let n_words = segments.len();
    if n_words as u64 > u32::MAX as u64 {
        return Err(Error::TooManyEntries(n_words as u64));
    }

    let total = counts_to_offsets(segments.counts_mut(), record_words);
    let source = documents.view().as_words();
    if total != source.len() as u64 {
        return Err(Error::Corruption(format!(
            "segments end at word {}, documents file has {}",
            total,
            source.len()
        )));
    }

    let encoder = SegmentEncoder::for_layout(layout);
    let mut docs_size = 0;
    let mut non_empty = 0;
    let mut start = 0;
    for &end in segments.counts() {
        let records = (end - start) as usize / record_words;
        if records > 0 {
            docs_size += encoder.calculate_size(records);
            non_empty += 1;
        }
        start = end;
    }

    let mut docs = LongArray::create(docs_out, docs_size)?;
    let (word_ids, offsets) = segments.arrays_mut();
    let mut written = 0;
    let mut start = 0;
    for offset in offsets.iter_mut() {
        let end = *offset as usize;
        let run = &source[start..end];
        start = end;
        if run.is_empty() {
            *offset = u64::MAX;
            continue;
        }
        *offset = written as u64;
        written += encoder.write(docs.as_mut_slice(), written, run, run.len() / record_words)?;
    }
    if written != docs_size {
        return Err(Error::Corruption(format!(
            "wrote {} postings words, sized for {}",
            written, docs_size
        )));
    }
    docs.close()?;

    let words_size = WORDS_BTREE.calculate_size(non_empty);
    let mut words = LongArray::create(words_out, words_size)?;
    BTreeWriter::new(words.as_mut_slice(), WORDS_BTREE).write(0, non_empty, |data| {
        let entries = word_ids
            .iter()
            .zip(offsets.iter())
            .filter(|&(_, &offset)| offset != u64::MAX);
        for (entry, (&word_id, &offset)) in data.chunks_exact_mut(2).zip(entries) {
            entry[0] = word_id;
            entry[1] = offset;
        }
        Ok(())
    })?;
    words.close()?;

    let stats = FinalizeStats {
        words: non_empty,
        postings: source.len() / record_words,
        docs_size,
        words_size,
    };
    log::info!(
        "Finalized index: {} words, {} postings, docs={} words, directory={} words",
        stats.words,
        stats.postings,
        stats.docs_size,
        stats.words_size
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_to_offsets() {
        let mut counts = vec![3, 0, 1, 4];
        let original = counts.clone();
        let total = counts_to_offsets(&mut counts, 2);
        assert_eq!(counts, vec![6, 6, 8, 16]);
        assert_eq!(total, 16);

        // consecutive offsets differ by record size times the count
        for i in 1..counts.len() {
            assert!(counts[i] >= counts[i - 1]);
            assert_eq!(counts[i] - counts[i - 1], 2 * original[i]);
        }
    }

    #[test]
    fn test_counts_to_offsets_empty() {
        let mut counts: Vec<u64> = Vec::new();
        assert_eq!(counts_to_offsets(&mut counts, 3), 0);
    }
}
