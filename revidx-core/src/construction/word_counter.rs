//! Bounded-memory word occurrence counting
//!
//! Counts accumulate in a hash map until it holds `memory_entries` distinct
//! words, at which point the map is written out as a sorted run and
//! cleared. `finish` k-way merges the runs, summing counts per word, and
//! streams the result to disk, so memory stays bounded regardless of how
//! many distinct words a shard contains. At most `MAX_MERGE_FAN_IN` runs
//! are open at once; beyond that, batches are first folded into fewer runs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, NativeEndian, ReadBytesExt, WriteBytesExt};
use rustc_hash::FxHashMap;

use crate::WordId;
use crate::error::Result;
use crate::storage::{LongArray, TempFile};

const RUN_BUFFER_SIZE: usize = 256 * 1024;

/// Most runs read at once by a single merge pass
const MAX_MERGE_FAN_IN: usize = 64;

pub struct WordCounter {
    counts: FxHashMap<WordId, u64>,
    runs: Vec<TempFile>,
    work_dir: PathBuf,
    memory_entries: usize,
}

/// Head of one sorted run in the k-way merge
struct RunHead {
    word_id: WordId,
    count: u64,
    run: usize,
}

impl PartialEq for RunHead {
    fn eq(&self, other: &Self) -> bool {
        self.word_id == other.word_id && self.run == other.run
    }
}

impl Eq for RunHead {}

impl PartialOrd for RunHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunHead {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default)
        other
            .word_id
            .cmp(&self.word_id)
            .then_with(|| other.run.cmp(&self.run))
    }
}

impl WordCounter {
    pub fn new(work_dir: &Path, memory_entries: usize) -> Self {
        Self {
            counts: FxHashMap::default(),
            runs: Vec::new(),
            work_dir: work_dir.to_path_buf(),
            memory_entries: memory_entries.max(1),
        }
    }

    pub fn add(&mut self, word_id: WordId) -> Result<()> {
        *self.counts.entry(word_id).or_insert(0) += 1;
        if self.counts.len() >= self.memory_entries {
            self.spill()?;
        }
        Ok(())
    }

    /// Number of sorted runs written to disk so far
    pub fn spilled_runs(&self) -> usize {
        self.runs.len()
    }

    fn drain_sorted(&mut self) -> Vec<(WordId, u64)> {
        let mut entries: Vec<(WordId, u64)> = self.counts.drain().collect();
        entries.sort_unstable_by_key(|&(word_id, _)| word_id);
        entries
    }

    fn spill(&mut self) -> Result<()> {
        let entries = self.drain_sorted();
        let run = TempFile::new(&self.work_dir, "word_count_run", "dat");
        let mut out = BufWriter::with_capacity(RUN_BUFFER_SIZE, File::create(run.path())?);
        for &(word_id, count) in &entries {
            write_entry(&mut out, word_id, count)?;
        }
        out.flush()?;

        log::debug!(
            "Spilled {} word counts to {}",
            entries.len(),
            run.path().display()
        );
        self.runs.push(run);
        Ok(())
    }

    /// Fold runs in batches of `MAX_MERGE_FAN_IN` until a single pass can
    /// read them all
    fn compact_runs(&mut self) -> Result<()> {
        while self.runs.len() > MAX_MERGE_FAN_IN {
            let mut pending = std::mem::take(&mut self.runs);
            let batches = pending.len().div_ceil(MAX_MERGE_FAN_IN);
            log::debug!(
                "Folding {} word count runs into {}",
                pending.len(),
                batches
            );

            while !pending.is_empty() {
                let batch: Vec<TempFile> = pending
                    .drain(..pending.len().min(MAX_MERGE_FAN_IN))
                    .collect();
                let run = TempFile::new(&self.work_dir, "word_count_run", "dat");
                let mut out =
                    BufWriter::with_capacity(RUN_BUFFER_SIZE, File::create(run.path())?);
                merge_runs(&batch, &mut |word_id: WordId, count: u64| {
                    write_entry(&mut out, word_id, count)
                })?;
                out.flush()?;
                // Inputs of the batch are removed here
                drop(batch);
                self.runs.push(run);
            }
        }
        Ok(())
    }

    /// Write the sorted distinct word ids and their counts to the given
    /// paths and map both files
    pub fn finish(mut self, words_path: &Path, counts_path: &Path) -> Result<(LongArray, LongArray)> {
        let mut words_out = BufWriter::new(File::create(words_path)?);
        let mut counts_out = BufWriter::new(File::create(counts_path)?);
        let mut emit = |word_id: WordId, count: u64| -> io::Result<()> {
            words_out.write_u64::<NativeEndian>(word_id as u64)?;
            counts_out.write_u64::<NativeEndian>(count)
        };

        if self.runs.is_empty() {
            for (word_id, count) in self.drain_sorted() {
                emit(word_id, count)?;
            }
        } else {
            if !self.counts.is_empty() {
                self.spill()?;
            }
            self.compact_runs()?;
            merge_runs(&self.runs, &mut emit)?;
        }
        drop(emit);

        words_out.flush()?;
        counts_out.flush()?;
        drop(words_out);
        drop(counts_out);

        Ok((LongArray::open(words_path)?, LongArray::open(counts_path)?))
    }
}

fn write_entry(writer: &mut impl io::Write, word_id: WordId, count: u64) -> io::Result<()> {
    writer.write_i64::<LittleEndian>(word_id)?;
    writer.write_u64::<LittleEndian>(count)
}

fn read_entry(reader: &mut impl io::Read) -> io::Result<Option<(WordId, u64)>> {
    let word_id = match reader.read_i64::<LittleEndian>() {
        Ok(word_id) => word_id,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let count = reader.read_u64::<LittleEndian>()?;
    Ok(Some((word_id, count)))
}

fn merge_runs<F>(runs: &[TempFile], emit: &mut F) -> Result<()>
where
    F: FnMut(WordId, u64) -> io::Result<()>,
{
    let mut readers = runs
        .iter()
        .map(|run| Ok(BufReader::with_capacity(RUN_BUFFER_SIZE, File::open(run.path())?)))
        .collect::<Result<Vec<_>>>()?;

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (run, reader) in readers.iter_mut().enumerate() {
        if let Some((word_id, count)) = read_entry(reader)? {
            heap.push(RunHead {
                word_id,
                count,
                run,
            });
        }
    }

    let mut current: Option<(WordId, u64)> = None;
    while let Some(head) = heap.pop() {
        current = match current {
            Some((word_id, count)) if word_id == head.word_id => Some((word_id, count + head.count)),
            Some((word_id, count)) => {
                emit(word_id, count)?;
                Some((head.word_id, head.count))
            }
            None => Some((head.word_id, head.count)),
        };

        if let Some((word_id, count)) = read_entry(&mut readers[head.run])? {
            heap.push(RunHead {
                word_id,
                count,
                run: head.run,
            });
        }
    }
    if let Some((word_id, count)) = current {
        emit(word_id, count)?;
    }
    Ok(())
}
