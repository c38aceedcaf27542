//! Static b-tree over sorted fixed-size entries
//!
//! Layout, in 64-bit words, starting at the tree's offset:
//!
//! ```text
//! [n_entries][n_layers][index layers, top first][entries]
//! ```
//!
//! Each index layer holds one key per block of the layer below it: the
//! largest key of that block. A tree with at most `block_size` entries has
//! no index layers and is just a header over a sorted run, which keeps the
//! long tail of rare words cheap.

use std::cmp::Ordering;
use std::ops::Range;

use crate::error::{Error, Result};

const HEADER_WORDS: usize = 2;

/// How keys compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    Unsigned,
    /// Keys are `i64` bit patterns
    Signed,
}

/// Shape parameters of a b-tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeContext {
    /// Words per entry; the key is the first word
    pub entry_size: usize,
    /// Keys per index block, entries per data block
    pub block_size: usize,
    pub key_order: KeyOrder,
}

impl BTreeContext {
    pub const fn new(entry_size: usize, block_size: usize, key_order: KeyOrder) -> Self {
        Self {
            entry_size,
            block_size,
            key_order,
        }
    }

    #[inline]
    pub fn compare(&self, a: u64, b: u64) -> Ordering {
        match self.key_order {
            KeyOrder::Unsigned => a.cmp(&b),
            KeyOrder::Signed => (a as i64).cmp(&(b as i64)),
        }
    }

    /// Index layer sizes, bottom layer first
    fn layer_sizes(&self, n_entries: usize) -> Vec<usize> {
        let mut sizes = Vec::new();
        let mut below = n_entries;
        while below > self.block_size {
            below = below.div_ceil(self.block_size);
            sizes.push(below);
        }
        sizes
    }

    /// Words needed to encode `n_entries` entries
    pub fn calculate_size(&self, n_entries: usize) -> usize {
        let mut size = HEADER_WORDS + n_entries * self.entry_size;
        let mut below = n_entries;
        while below > self.block_size {
            below = below.div_ceil(self.block_size);
            size += below;
        }
        size
    }
}

/// Writes b-trees into a pre-sized word array
pub struct BTreeWriter<'a> {
    out: &'a mut [u64],
    ctx: BTreeContext,
}

impl<'a> BTreeWriter<'a> {
    pub fn new(out: &'a mut [u64], ctx: BTreeContext) -> Self {
        Self { out, ctx }
    }

    /// Write a tree of `n_entries` at `offset`, returning the words used.
    ///
    /// `fill` receives the entry region and must leave it sorted by key;
    /// the index layers are derived from it afterwards.
    pub fn write<F>(&mut self, offset: usize, n_entries: usize, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut [u64]) -> Result<()>,
    {
        let ctx = self.ctx;
        let size = ctx.calculate_size(n_entries);
        let end = offset + size;
        if end > self.out.len() {
            return Err(Error::Corruption(format!(
                "b-tree of {} entries at {} overruns output of {} words",
                n_entries,
                offset,
                self.out.len()
            )));
        }

        let region = &mut self.out[offset..end];
        let layers = ctx.layer_sizes(n_entries);
        region[0] = n_entries as u64;
        region[1] = layers.len() as u64;

        let data_start = size - n_entries * ctx.entry_size;
        let (head, data) = region.split_at_mut(data_start);
        fill(&mut *data)?;

        let keys = data.iter().step_by(ctx.entry_size);
        let unsorted = keys
            .clone()
            .zip(keys.skip(1))
            .any(|(a, b)| ctx.compare(*a, *b) == Ordering::Greater);
        if unsorted {
            return Err(Error::Corruption("b-tree entries are not sorted".into()));
        }

        // Layers are stored top first, so the bottom layer ends where the
        // data begins.
        let index = &mut head[HEADER_WORDS..];
        let mut layer_end = index.len();
        for (depth, &layer_len) in layers.iter().enumerate() {
            let layer_start = layer_end - layer_len;
            for j in 0..layer_len {
                index[layer_start + j] = if depth == 0 {
                    let last = ((j + 1) * ctx.block_size).min(n_entries) - 1;
                    data[last * ctx.entry_size]
                } else {
                    let below_len = layers[depth - 1];
                    let last = ((j + 1) * ctx.block_size).min(below_len) - 1;
                    index[layer_end + last]
                };
            }
            layer_end = layer_start;
        }

        Ok(size)
    }
}

/// Reads a b-tree written by [`BTreeWriter`]
pub struct BTreeReader<'a> {
    ctx: BTreeContext,
    n_entries: usize,
    /// Index layers, top first, as ranges into `words`
    layers: Vec<Range<usize>>,
    words: &'a [u64],
    data_start: usize,
}

impl<'a> BTreeReader<'a> {
    pub fn new(words: &'a [u64], offset: usize, ctx: BTreeContext) -> Result<Self> {
        let header = words
            .get(offset..offset + HEADER_WORDS)
            .ok_or_else(|| Error::Corruption(format!("b-tree header at {} out of range", offset)))?;
        let n_entries = header[0] as usize;
        let sizes = ctx.layer_sizes(n_entries);
        if header[1] as usize != sizes.len() {
            return Err(Error::Corruption(format!(
                "b-tree at {} claims {} layers, expected {}",
                offset,
                header[1],
                sizes.len()
            )));
        }

        let size = ctx.calculate_size(n_entries);
        if offset + size > words.len() {
            return Err(Error::Corruption(format!(
                "b-tree at {} of {} words overruns {} words",
                offset,
                size,
                words.len()
            )));
        }

        let mut layers = Vec::with_capacity(sizes.len());
        let mut pos = offset + HEADER_WORDS;
        for &len in sizes.iter().rev() {
            layers.push(pos..pos + len);
            pos += len;
        }

        Ok(Self {
            ctx,
            n_entries,
            layers,
            words,
            data_start: pos,
        })
    }

    pub fn len(&self) -> usize {
        self.n_entries
    }

    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    pub fn entry(&self, index: usize) -> &'a [u64] {
        let start = self.data_start + index * self.ctx.entry_size;
        let words = self.words;
        &words[start..start + self.ctx.entry_size]
    }

    #[inline]
    fn key(&self, index: usize) -> u64 {
        self.words[self.data_start + index * self.ctx.entry_size]
    }

    /// Index of the first entry with key `key`
    pub fn find(&self, key: u64) -> Option<usize> {
        let ctx = self.ctx;
        let mut lo = 0;
        let mut hi = self.layers.first().map_or(self.n_entries, |l| l.len());

        for (depth, layer) in self.layers.iter().enumerate() {
            let keys = &self.words[layer.clone()];
            let idx = lo + keys[lo..hi].partition_point(|&k| ctx.compare(k, key) == Ordering::Less);
            if idx == hi {
                return None;
            }
            let below_len = self
                .layers
                .get(depth + 1)
                .map_or(self.n_entries, |l| l.len());
            lo = idx * ctx.block_size;
            hi = (lo + ctx.block_size).min(below_len);
        }

        let mut left = lo;
        let mut right = hi;
        while left < right {
            let mid = left + (right - left) / 2;
            if ctx.compare(self.key(mid), key) == Ordering::Less {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        (left < hi && self.key(left) == key).then_some(left)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u64]> + '_ {
        (0..self.n_entries).map(move |i| self.entry(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: BTreeContext = BTreeContext::new(2, 4, KeyOrder::Unsigned);

    fn build(ctx: BTreeContext, entries: &[u64], offset: usize) -> Vec<u64> {
        let n = entries.len() / ctx.entry_size;
        let mut out = vec![0u64; offset + ctx.calculate_size(n)];
        let written = BTreeWriter::new(&mut out, ctx)
            .write(offset, n, |data| {
                data.copy_from_slice(entries);
                Ok(())
            })
            .unwrap();
        assert_eq!(written, ctx.calculate_size(n));
        out
    }

    #[test]
    fn test_calculate_size() {
        assert_eq!(CTX.calculate_size(0), 2);
        assert_eq!(CTX.calculate_size(4), 2 + 8);
        // 5 entries: 2 data blocks, one index layer of 2 keys
        assert_eq!(CTX.calculate_size(5), 2 + 2 + 10);
        // 17 entries: 5 blocks, then 2, so two layers
        assert_eq!(CTX.calculate_size(17), 2 + 5 + 2 + 34);
    }

    #[test]
    fn test_single_block_lookup() {
        let out = build(CTX, &[3, 30, 7, 70, 9, 90], 0);
        let reader = BTreeReader::new(&out, 0, CTX).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.find(7), Some(1));
        assert_eq!(reader.entry(1), &[7, 70]);
        assert_eq!(reader.find(8), None);
        assert_eq!(reader.find(10), None);
    }

    #[test]
    fn test_multi_layer_lookup() {
        let entries: Vec<u64> = (0..100u64).flat_map(|i| [i * 3, i]).collect();
        let out = build(CTX, &entries, 5);
        let reader = BTreeReader::new(&out, 5, CTX).unwrap();

        for i in 0..100u64 {
            assert_eq!(reader.find(i * 3), Some(i as usize), "key {}", i * 3);
            assert_eq!(reader.find(i * 3 + 1), None);
        }
        assert_eq!(reader.find(1000), None);
        assert_eq!(reader.iter().count(), 100);
    }

    #[test]
    fn test_signed_keys() {
        let ctx = BTreeContext::new(2, 2, KeyOrder::Signed);
        let entries = [(-100i64) as u64, 0, (-5i64) as u64, 1, 10, 2, 1 << 33, 3, 1 << 40, 4];
        let out = build(ctx, &entries, 0);
        let reader = BTreeReader::new(&out, 0, ctx).unwrap();
        assert_eq!(reader.find((-100i64) as u64), Some(0));
        assert_eq!(reader.find((-5i64) as u64), Some(1));
        assert_eq!(reader.find(1 << 40), Some(4));
        assert_eq!(reader.find(7), None);
    }

    #[test]
    fn test_duplicate_keys_find_first() {
        let out = build(CTX, &[1, 0, 2, 0, 2, 1, 2, 2, 2, 3, 5, 0], 0);
        let reader = BTreeReader::new(&out, 0, CTX).unwrap();
        assert_eq!(reader.find(2), Some(1));
        assert_eq!(reader.find(5), Some(5));
    }

    #[test]
    fn test_rejects_unsorted() {
        let mut out = vec![0u64; CTX.calculate_size(2)];
        let result = BTreeWriter::new(&mut out, CTX).write(0, 2, |data| {
            data.copy_from_slice(&[5, 0, 4, 0]);
            Ok(())
        });
        assert!(matches!(result, Err(Error::Corruption(_))));
    }

    #[test]
    fn test_rejects_overrun() {
        let mut out = vec![0u64; 3];
        let result = BTreeWriter::new(&mut out, CTX).write(0, 2, |_| Ok(()));
        assert!(matches!(result, Err(Error::Corruption(_))));
    }
}
