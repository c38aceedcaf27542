//! Memory-mapped arrays of 64-bit words
//!
//! Every intermediate construction artifact (word ids, counts, postings)
//! is a flat file of native-endian `u64` words mapped read-write. The OS
//! page cache does the buffering, so walking a mapped array sequentially
//! costs no heap memory regardless of file size.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::{Error, Result};

const WORD_BYTES: u64 = std::mem::size_of::<u64>() as u64;

/// A file-backed, memory-mapped `[u64]`
///
/// Zero-length arrays hold no mapping at all.
pub struct LongArray {
    path: PathBuf,
    mmap: Option<MmapMut>,
    len: usize,
}

impl LongArray {
    /// Create (or truncate) `path` to hold exactly `len` zeroed words
    pub fn create(path: impl AsRef<Path>, len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(len as u64 * WORD_BYTES)?;
        Self::map(path, &file, len)
    }

    /// Map an existing file read-write
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let bytes = file.metadata()?.len();
        if bytes % WORD_BYTES != 0 {
            return Err(Error::Corruption(format!(
                "{} is {} bytes, not a whole number of words",
                path.display(),
                bytes
            )));
        }
        Self::map(path, &file, (bytes / WORD_BYTES) as usize)
    }

    fn map(path: PathBuf, file: &File, len: usize) -> Result<Self> {
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { MmapMut::map_mut(file)? })
        };
        Ok(Self { path, mmap, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length in words
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u64] {
        match &self.mmap {
            // Mappings are page aligned, which satisfies u64 alignment.
            Some(mmap) => unsafe {
                std::slice::from_raw_parts(mmap.as_ptr() as *const u64, self.len)
            },
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        match &mut self.mmap {
            Some(mmap) => unsafe {
                std::slice::from_raw_parts_mut(mmap.as_mut_ptr() as *mut u64, self.len)
            },
            None => &mut [],
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        self.as_slice()[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        self.as_mut_slice()[index] = value;
    }

    /// Flush dirty pages to the backing file
    pub fn force(&self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }

    /// Flush and unmap, returning the backing file path
    pub fn close(self) -> Result<PathBuf> {
        self.force()?;
        Ok(self.path)
    }

    /// Shrink (or grow) the backing file to `len` words and remap it
    pub fn resize(mut self, len: usize) -> Result<Self> {
        if len == self.len {
            return Ok(self);
        }
        self.force()?;
        self.mmap = None;

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.set_len(len as u64 * WORD_BYTES)?;
        Self::map(self.path, &file, len)
    }
}

impl std::fmt::Debug for LongArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongArray")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish()
    }
}
