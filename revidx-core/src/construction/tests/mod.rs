mod constructor;

use std::path::Path;

use crate::config::{ConstructionConfig, IndexKind};
use crate::construction::{MappingLease, Preindex};
use crate::journal::{JournalTerm, MemoryJournal};
use crate::rewriter::IdentityRewriter;
use crate::{DocId, WordId};

/// Term meta derived from its document and word, so tests can tell
/// which side of a merge a posting came from
fn term_meta(doc_id: DocId, word_id: WordId, tag: u64) -> u64 {
    (doc_id << 24) ^ ((word_id as u64) << 4) ^ tag
}

/// A journal holding `docs`, each term's meta tagged with `tag`
fn journal_of(docs: &[(DocId, &[WordId])], tag: u64) -> MemoryJournal {
    let mut journal = MemoryJournal::new();
    for &(doc_id, words) in docs {
        let terms = words
            .iter()
            .map(|&word| JournalTerm::new(word, term_meta(doc_id, word, tag)))
            .collect();
        journal.add_document(doc_id, 0, terms);
    }
    journal
}

fn plain_preindex(dir: &Path, docs: &[(DocId, &[WordId])], tag: u64) -> Preindex {
    let config = ConstructionConfig::new(dir).with_index_kind(IndexKind::Plain);
    Preindex::construct(
        &journal_of(docs, tag),
        &config,
        &IdentityRewriter,
        None,
        MappingLease::untracked(),
    )
    .unwrap()
}

/// `(word_id, [(doc_id, meta)])` for every segment
fn postings_of(preindex: &Preindex) -> Vec<(WordId, Vec<(u64, u64)>)> {
    preindex
        .iter_segments()
        .map(|(word_id, postings)| {
            let records = postings.iter().map(|r| (r[0], r[r.len() - 1])).collect();
            (word_id, records)
        })
        .collect()
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
