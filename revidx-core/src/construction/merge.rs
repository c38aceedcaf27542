//! Pairwise preindex merge
//!
//! The destination word list is the union of both inputs' word lists. A
//! [`MergePlan`] then walks all three in step: segments present on one
//! side are copied as is, segments present on both are merge-sorted by doc
//! id. The destination documents file is sized for the worst case (no
//! shared postings) and shrunk afterwards. Apart from the mapped files the
//! merge allocates nothing, so merge cost in memory does not grow with the
//! inputs.

use std::path::Path;

use super::budget::MappingLease;
use super::documents::Documents;
use super::merge_plan::{MergeAction, MergePlan, count_union, merge_union};
use super::preindex::Preindex;
use super::word_segments::WordSegments;
use crate::error::{Error, Result};
use crate::structures::{RecordView, RecordViewMut};

/// Merge two preindexes into a new one; the inputs are left untouched
pub fn merge(
    work_dir: &Path,
    left: &Preindex,
    right: &Preindex,
    lease: MappingLease,
) -> Result<Preindex> {
    let layout = left.layout();
    if right.layout() != layout {
        return Err(Error::Corruption(format!(
            "cannot merge {}-word records with {}-word records",
            layout.words(),
            right.layout().words()
        )));
    }
    left.check_sizes()?;
    right.check_sizes()?;

    let (left_words, right_words) = (left.segments().word_ids(), right.segments().word_ids());
    let mut segments = WordSegments::allocate(work_dir, count_union(left_words, right_words))?;
    {
        let out = segments.word_ids_mut();
        let mut i = 0;
        merge_union(left_words, right_words, |word| {
            out[i] = word;
            i += 1;
        });
    }

    let capacity = left.documents().len() + right.documents().len();
    let mut documents = Documents::allocate(work_dir, layout, capacity)?;
    log::info!(
        "Merging preindexes: {} + {} words, {} + {} postings",
        left_words.len(),
        right_words.len(),
        left.documents().len(),
        right.documents().len()
    );

    let records = merge_segments(&mut segments, &mut documents, left, right)?;
    let documents = if records < capacity {
        documents.shrink(records)?
    } else {
        documents
    };

    log::info!(
        "Merged preindex: {} words, {} postings",
        segments.len(),
        records
    );
    Ok(Preindex::from_parts(segments, documents, lease))
}

/// Fill the destination counts and postings; returns the records written
fn merge_segments(
    segments: &mut WordSegments,
    documents: &mut Documents,
    left: &Preindex,
    right: &Preindex,
) -> Result<usize> {
    let (left_counts, right_counts) = (left.segments().counts(), right.segments().counts());
    let (left_docs, right_docs) = (left.documents().view(), right.documents().view());
    let (dest_words, dest_counts) = segments.arrays_mut();
    let mut out = documents.view_mut();

    let mut left_pos = 0;
    let mut right_pos = 0;
    let mut dest_pos = 0;

    let plan = MergePlan::new(
        dest_words,
        left.segments().word_ids(),
        right.segments().word_ids(),
    );
    for action in plan {
        let (dest, written) = match action? {
            MergeAction::MergeBoth { dest, left, right } => {
                let left_run = left_docs.segment(left_pos..left_pos + left_counts[left] as usize);
                let right_run =
                    right_docs.segment(right_pos..right_pos + right_counts[right] as usize);
                left_pos += left_run.len();
                right_pos += right_run.len();
                (dest, merge_runs(left_run, right_run, &mut out, dest_pos))
            }
            MergeAction::CopyLeft { dest, left } => {
                let run = left_docs.segment(left_pos..left_pos + left_counts[left] as usize);
                left_pos += run.len();
                out.copy_from(dest_pos, run);
                (dest, run.len())
            }
            MergeAction::CopyRight { dest, right } => {
                let run = right_docs.segment(right_pos..right_pos + right_counts[right] as usize);
                right_pos += run.len();
                out.copy_from(dest_pos, run);
                (dest, run.len())
            }
        };
        dest_counts[dest] = written as u64;
        dest_pos += written;
    }

    Ok(dest_pos)
}

/// Merge two runs sorted by doc id into `out` at record `at`, returning
/// the number of records written.
///
/// Records with equal doc ids collapse into the first one seen, and the
/// left run is seen first on ties.
pub fn merge_runs(
    left: RecordView<'_>,
    right: RecordView<'_>,
    out: &mut RecordViewMut<'_>,
    at: usize,
) -> usize {
    let (mut i, mut j, mut k) = (0, 0, at);
    let mut last = None;
    let mut emit = |record: &[u64], k: &mut usize| {
        if last != Some(record[0]) {
            out.put(*k, record);
            *k += 1;
            last = Some(record[0]);
        }
    };

    while i < left.len() && j < right.len() {
        let (a, b) = (left.doc_id(i), right.doc_id(j));
        if a <= b {
            emit(left.record(i), &mut k);
            i += 1;
        } else {
            emit(right.record(j), &mut k);
            j += 1;
        }
    }
    for record in left.segment(i..left.len()).iter() {
        emit(record, &mut k);
    }
    for record in right.segment(j..right.len()).iter() {
        emit(record, &mut k);
    }

    k - at
}
