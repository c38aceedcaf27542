use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use super::{files_in, journal_of, term_meta};
use crate::config::{ConstructionConfig, IndexKind};
use crate::construction::{IndexOutputs, ReverseIndexConstructor, read_positions};
use crate::error::Error;
use crate::journal::{FileJournal, JournalTerm, JournalWriter, MemoryJournal};
use crate::progress::{NoProgress, Phase, ProgressSink};
use crate::reader::{Posting, ReverseIndexReader};
use crate::rewriter::IdentityRewriter;
use crate::{DocId, WordId};

struct Fixture {
    work: TempDir,
    out: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            work: TempDir::new().unwrap(),
            out: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> ConstructionConfig {
        ConstructionConfig::new(self.work.path()).with_num_threads(2)
    }

    fn outputs(&self) -> IndexOutputs {
        IndexOutputs::new(
            self.out.path().join("rev-docs.dat"),
            self.out.path().join("rev-words.dat"),
        )
    }

    fn reader(&self, outputs: &IndexOutputs, kind: IndexKind) -> ReverseIndexReader {
        ReverseIndexReader::open(&outputs.docs, &outputs.words, kind).unwrap()
    }
}

/// Records every phase it is told about
#[derive(Clone, Default)]
struct PhaseLog(Arc<Mutex<Vec<Phase>>>);

impl ProgressSink for PhaseLog {
    fn phase(&self, phase: Phase) {
        self.0.lock().unwrap().push(phase);
    }
}

#[test]
fn test_single_posting() {
    let fixture = Fixture::new();
    let mut journal = MemoryJournal::new();
    journal.add_document(100, 0, vec![JournalTerm::new(50, 51)]);

    let constructor =
        ReverseIndexConstructor::new(fixture.config(), IdentityRewriter, NoProgress).unwrap();
    let outputs = fixture.outputs();
    let stats = constructor.create_reverse_index(&[journal], &outputs).unwrap();
    assert_eq!(stats.words, 1);
    assert_eq!(stats.postings, 1);
    assert_eq!(stats.merges, 0);

    let reader = fixture.reader(&outputs, IndexKind::Plain);
    assert_eq!(reader.directory_entries().unwrap(), vec![(50, 0)]);
    assert_eq!(
        reader.postings(50).unwrap(),
        vec![Posting {
            doc_id: 100,
            meta: 51,
            positions_offset: 0
        }]
    );
    assert!(reader.postings(49).unwrap().is_empty());
}

#[test]
fn test_many_shards_bounded_budget() {
    let fixture = Fixture::new();
    let config = fixture
        .config()
        .with_max_live_preindexes(3)
        .with_count_memory_entries(4)
        .with_inline_sort_threshold(2);

    // Eight shards over disjoint document ranges
    let mut expected: BTreeMap<WordId, Vec<(u64, u64)>> = BTreeMap::new();
    let mut shards = Vec::new();
    for shard in 0..8u64 {
        let mut docs: Vec<(DocId, Vec<WordId>)> = Vec::new();
        for i in 0..25u64 {
            let doc_id = 1000 - (shard * 25 + i);
            let words: Vec<WordId> = (-6..12)
                .filter(|w| (doc_id as i64 + w).rem_euclid(3) == 0)
                .collect();
            for &word in &words {
                expected
                    .entry(word)
                    .or_default()
                    .push((doc_id, term_meta(doc_id, word, shard)));
            }
            docs.push((doc_id, words));
        }
        let input: Vec<(DocId, &[WordId])> =
            docs.iter().map(|(d, w)| (*d, w.as_slice())).collect();
        shards.push(journal_of(&input, shard));
    }
    for postings in expected.values_mut() {
        postings.sort_unstable();
    }

    let progress = PhaseLog::default();
    let constructor =
        ReverseIndexConstructor::new(config, IdentityRewriter, progress.clone()).unwrap();
    let outputs = fixture.outputs();
    let stats = constructor.create_reverse_index(&shards, &outputs).unwrap();

    assert_eq!(stats.shards, 8);
    assert_eq!(stats.merges, 7);
    assert!(stats.peak_live_preindexes <= 3, "peak {}", stats.peak_live_preindexes);
    assert_eq!(constructor.budget().live(), 0);
    assert_eq!(
        *progress.0.lock().unwrap(),
        vec![Phase::SegmentBuild, Phase::Merge, Phase::Finalize, Phase::Finished]
    );

    let reader = fixture.reader(&outputs, IndexKind::Plain);
    let words: Vec<WordId> = reader
        .directory_entries()
        .unwrap()
        .into_iter()
        .map(|(w, _)| w)
        .collect();
    assert_eq!(words, expected.keys().copied().collect::<Vec<_>>());
    for (&word, postings) in &expected {
        let actual: Vec<(u64, u64)> = reader
            .postings(word)
            .unwrap()
            .into_iter()
            .map(|p| (p.doc_id, p.meta))
            .collect();
        assert_eq!(&actual, postings, "word {}", word);
    }

    // Only the outputs remain
    assert_eq!(files_in(fixture.work.path()), 0);
    assert_eq!(files_in(fixture.out.path()), 2);
}

#[test]
fn test_no_shards() {
    let fixture = Fixture::new();
    let constructor =
        ReverseIndexConstructor::new(fixture.config(), IdentityRewriter, NoProgress).unwrap();
    let outputs = fixture.outputs();
    let shards: &[MemoryJournal] = &[];
    let stats = constructor.create_reverse_index(shards, &outputs).unwrap();
    assert_eq!(stats.words, 0);
    assert_eq!(stats.merges, 0);

    let reader = fixture.reader(&outputs, IndexKind::Plain);
    assert_eq!(reader.word_count().unwrap(), 0);
    assert!(reader.postings(1).unwrap().is_empty());
}

#[test]
fn test_empty_shards() {
    let fixture = Fixture::new();
    let constructor =
        ReverseIndexConstructor::new(fixture.config(), IdentityRewriter, NoProgress).unwrap();
    let outputs = fixture.outputs();
    let mut no_terms = MemoryJournal::new();
    no_terms.add_document(1, 0, Vec::new());
    let shards = [MemoryJournal::new(), no_terms];

    let stats = constructor.create_reverse_index(&shards, &outputs).unwrap();
    assert_eq!(stats.shards, 2);
    assert_eq!(stats.words, 0);
    assert_eq!(fixture.reader(&outputs, IndexKind::Plain).word_count().unwrap(), 0);
}

#[test]
fn test_full_index_with_positions() {
    let fixture = Fixture::new();
    let config = fixture.config().with_index_kind(IndexKind::Full);
    let outputs = fixture
        .outputs()
        .with_positions(fixture.out.path().join("rev-prio-docs.dat"));

    let mut left = MemoryJournal::new();
    left.add_document(
        20,
        0,
        vec![
            JournalTerm::new(1, 11).with_positions(vec![1, 4]),
            JournalTerm::new(2, 12),
        ],
    );
    let mut right = MemoryJournal::new();
    // Enough postings of word 1 for a skip list with several blocks
    for doc_id in 100..300 {
        right.add_document(
            doc_id,
            0,
            vec![JournalTerm::new(1, doc_id).with_positions(vec![doc_id as u8])],
        );
    }

    let constructor = ReverseIndexConstructor::new(config, IdentityRewriter, NoProgress).unwrap();
    let stats = constructor.create_reverse_index(&[left, right], &outputs).unwrap();
    assert_eq!(stats.postings, 202);

    let reader = fixture.reader(&outputs, IndexKind::Full);
    let positions_path = outputs.positions.as_ref().unwrap();
    let positions = std::fs::read(positions_path).unwrap();

    let word1 = reader.postings(1).unwrap();
    assert_eq!(word1.len(), 201);
    assert_eq!(word1[0].doc_id, 20);
    assert_eq!(word1[0].meta, 11);
    assert_eq!(read_positions(&positions, word1[0].positions_offset).unwrap(), &[1, 4]);
    for posting in &word1[1..] {
        assert_eq!(posting.meta, posting.doc_id);
        assert_eq!(
            read_positions(&positions, posting.positions_offset).unwrap(),
            &[posting.doc_id as u8]
        );
    }
    assert!(word1.windows(2).all(|w| w[0].doc_id < w[1].doc_id));

    let word2 = reader.postings(2).unwrap();
    assert_eq!(
        word2,
        vec![Posting {
            doc_id: 20,
            meta: 12,
            positions_offset: 0
        }]
    );
    assert_eq!(files_in(fixture.out.path()), 3);
}

#[test]
fn test_positions_output_must_match_kind() {
    let fixture = Fixture::new();
    let full = ReverseIndexConstructor::new(
        fixture.config().with_index_kind(IndexKind::Full),
        IdentityRewriter,
        NoProgress,
    )
    .unwrap();
    let result = full.create_reverse_index(&[MemoryJournal::new()], &fixture.outputs());
    assert!(matches!(result, Err(Error::Config(_))));

    let plain =
        ReverseIndexConstructor::new(fixture.config(), IdentityRewriter, NoProgress).unwrap();
    let outputs = fixture
        .outputs()
        .with_positions(fixture.out.path().join("positions.dat"));
    let result = plain.create_reverse_index(&[MemoryJournal::new()], &outputs);
    assert!(matches!(result, Err(Error::Config(_))));

    // Nothing was written
    assert_eq!(files_in(fixture.out.path()), 0);
}

#[test]
fn test_file_journal_input() {
    let fixture = Fixture::new();
    let journal_path = fixture.work.path().join("shard-0.journal");
    let mut writer = JournalWriter::create(&journal_path).unwrap();
    writer
        .write_document(7, 0, &[JournalTerm::new(-2, 70), JournalTerm::new(5, 71)])
        .unwrap();
    writer.write_document(3, 0, &[JournalTerm::new(5, 30)]).unwrap();
    writer.finish().unwrap();

    let journal = FileJournal::open(&journal_path).unwrap();
    let constructor =
        ReverseIndexConstructor::new(fixture.config(), IdentityRewriter, NoProgress).unwrap();
    let outputs = fixture.outputs();
    constructor.create_reverse_index(&[journal], &outputs).unwrap();

    let reader = fixture.reader(&outputs, IndexKind::Plain);
    let docs = |word| -> Vec<(u64, u64)> {
        reader
            .postings(word)
            .unwrap()
            .into_iter()
            .map(|p| (p.doc_id, p.meta))
            .collect()
    };
    assert_eq!(docs(-2), vec![(7, 70)]);
    assert_eq!(docs(5), vec![(3, 30), (7, 71)]);
}

#[test]
fn test_rewriter_applied() {
    let fixture = Fixture::new();
    let journal = journal_of(&[(1, &[4]), (2, &[4])], 0);
    // Reverses document order
    let rewriter = |doc_id: DocId| 10 - doc_id;
    let constructor = ReverseIndexConstructor::new(fixture.config(), rewriter, NoProgress).unwrap();
    let outputs = fixture.outputs();
    constructor.create_reverse_index(&[journal], &outputs).unwrap();

    let docs: Vec<u64> = fixture
        .reader(&outputs, IndexKind::Plain)
        .postings(4)
        .unwrap()
        .iter()
        .map(|p| p.doc_id)
        .collect();
    assert_eq!(docs, vec![8, 9]);
}

#[test]
fn test_stale_outputs_replaced() {
    let fixture = Fixture::new();
    let outputs = fixture.outputs();
    std::fs::write(&outputs.docs, b"stale").unwrap();
    std::fs::write(&outputs.words, b"stale").unwrap();

    let constructor =
        ReverseIndexConstructor::new(fixture.config(), IdentityRewriter, NoProgress).unwrap();
    constructor
        .create_reverse_index(&[journal_of(&[(1, &[2])], 0)], &outputs)
        .unwrap();

    let reader = fixture.reader(&outputs, IndexKind::Plain);
    assert_eq!(reader.word_count().unwrap(), 1);
    assert_eq!(reader.postings(2).unwrap()[0].doc_id, 1);
}
