//! Block skip list for position-aware postings
//!
//! Layout in 64-bit words, starting at the list's offset:
//!
//! ```text
//! [n_records]
//! block 0: [count][n_forward][forward; MAX_FORWARD][records; count * 3]
//! block 1: ...
//! ```
//!
//! Every block but the last holds exactly [`BLOCK_RECORDS`] records, so
//! block `b` starts at a computable offset. `forward[k]` is the largest doc
//! id of block `b + 2^k`, which lets an intersection skip ahead without
//! touching the blocks in between.

use crate::error::{Error, Result};

/// Records per skip-list block
pub const BLOCK_RECORDS: usize = 64;
/// Forward pointers per block header
pub const MAX_FORWARD: usize = 8;

const RECORD_WORDS: usize = 3;
const LIST_HEADER_WORDS: usize = 1;
const BLOCK_HEADER_WORDS: usize = 2 + MAX_FORWARD;
const FULL_BLOCK_WORDS: usize = BLOCK_HEADER_WORDS + BLOCK_RECORDS * RECORD_WORDS;

/// Words needed to encode `n_records` `(doc_id, positions_offset, meta)` records
pub fn calculate_size(n_records: usize) -> usize {
    LIST_HEADER_WORDS + n_records.div_ceil(BLOCK_RECORDS) * BLOCK_HEADER_WORDS + n_records * RECORD_WORDS
}

/// Writes skip lists into a pre-sized word array
pub struct SkipListWriter<'a> {
    out: &'a mut [u64],
}

impl<'a> SkipListWriter<'a> {
    pub fn new(out: &'a mut [u64]) -> Self {
        Self { out }
    }

    /// Encode `records` (sorted by doc id) at `offset`, returning the words used
    pub fn write(&mut self, offset: usize, records: &[u64]) -> Result<usize> {
        if records.len() % RECORD_WORDS != 0 {
            return Err(Error::Corruption(format!(
                "skip list input of {} words is not whole records",
                records.len()
            )));
        }
        let n_records = records.len() / RECORD_WORDS;
        let size = calculate_size(n_records);
        let region = self.out.get_mut(offset..offset + size).ok_or_else(|| {
            Error::Corruption(format!(
                "skip list of {} records at {} overruns output",
                n_records, offset
            ))
        })?;

        let blocks: Vec<&[u64]> = records.chunks(BLOCK_RECORDS * RECORD_WORDS).collect();
        let block_max = |b: usize| blocks[b][blocks[b].len() - RECORD_WORDS];

        region[0] = n_records as u64;
        let mut prev_doc = None;
        let mut pos = LIST_HEADER_WORDS;
        for (b, block) in blocks.iter().enumerate() {
            for record in block.chunks_exact(RECORD_WORDS) {
                if prev_doc.is_some_and(|prev| prev > record[0]) {
                    return Err(Error::Corruption("skip list records are not sorted".into()));
                }
                prev_doc = Some(record[0]);
            }

            let header = &mut region[pos..pos + BLOCK_HEADER_WORDS];
            header.fill(0);
            header[0] = (block.len() / RECORD_WORDS) as u64;
            let mut n_forward = 0;
            for k in 0..MAX_FORWARD {
                let target = b + (1 << k);
                if target >= blocks.len() {
                    break;
                }
                header[2 + k] = block_max(target);
                n_forward += 1;
            }
            header[1] = n_forward;
            pos += BLOCK_HEADER_WORDS;

            region[pos..pos + block.len()].copy_from_slice(block);
            pos += block.len();
        }

        debug_assert_eq!(pos, size);
        Ok(size)
    }
}

/// Reads a skip list written by [`SkipListWriter`]
pub struct SkipListReader<'a> {
    words: &'a [u64],
    n_records: usize,
}

impl<'a> SkipListReader<'a> {
    pub fn new(words: &'a [u64], offset: usize) -> Result<Self> {
        let n_records = *words
            .get(offset)
            .ok_or_else(|| Error::Corruption(format!("skip list at {} out of range", offset)))?
            as usize;
        let size = calculate_size(n_records);
        let words = words.get(offset..offset + size).ok_or_else(|| {
            Error::Corruption(format!(
                "skip list at {} of {} words overruns input",
                offset, size
            ))
        })?;
        Ok(Self { words, n_records })
    }

    pub fn len(&self) -> usize {
        self.n_records
    }

    pub fn is_empty(&self) -> bool {
        self.n_records == 0
    }

    fn n_blocks(&self) -> usize {
        self.n_records.div_ceil(BLOCK_RECORDS)
    }

    fn block_start(&self, block: usize) -> usize {
        LIST_HEADER_WORDS + block * FULL_BLOCK_WORDS
    }

    fn block_len(&self, block: usize) -> usize {
        self.words[self.block_start(block)] as usize
    }

    fn block_max(&self, block: usize) -> u64 {
        let start = self.block_start(block) + BLOCK_HEADER_WORDS;
        self.words[start + (self.block_len(block) - 1) * RECORD_WORDS]
    }

    /// Record `index` as `[doc_id, positions_offset, meta]`
    pub fn record(&self, index: usize) -> &'a [u64] {
        let block = index / BLOCK_RECORDS;
        let start =
            self.block_start(block) + BLOCK_HEADER_WORDS + (index % BLOCK_RECORDS) * RECORD_WORDS;
        let words = self.words;
        &words[start..start + RECORD_WORDS]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u64]> + '_ {
        (0..self.n_records).map(move |i| self.record(i))
    }

    /// Index of the first record with doc id `>= doc_id`
    pub fn seek_ge(&self, doc_id: u64) -> Option<usize> {
        let n_blocks = self.n_blocks();
        let mut block = 0;
        while block < n_blocks && self.block_max(block) < doc_id {
            let header = self.block_start(block);
            let n_forward = self.words[header + 1] as usize;
            let skip = (0..n_forward)
                .rev()
                .find(|&k| self.words[header + 2 + k] < doc_id);
            block += match skip {
                Some(k) => 1 << k,
                None => 1,
            };
        }
        if block >= n_blocks {
            return None;
        }

        let first = block * BLOCK_RECORDS;
        let in_block = (0..self.block_len(block))
            .find(|&i| self.record(first + i)[0] >= doc_id)
            .unwrap_or(0);
        Some(first + in_block)
    }
}
