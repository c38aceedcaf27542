//! Shared positions file for position-aware indexes
//!
//! Each term's position blob is appended as `len(u32 LE) bytes[len]`; the
//! posting stores the byte offset of the length prefix. The file opens with
//! a fixed header so that offset 0 never addresses a blob and can stand for
//! "no positions".

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;

use crate::error::{Error, Result};

const POSITIONS_HEADER: [u8; 8] = *b"RVPOS\0\0\x01";

struct PositionsWriter {
    out: BufWriter<File>,
    offset: u64,
}

/// Appends position blobs from any number of shard builders
pub struct PositionsFileConstructor {
    path: PathBuf,
    writer: Mutex<PositionsWriter>,
}

impl PositionsFileConstructor {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&POSITIONS_HEADER)?;
        Ok(Self {
            path,
            writer: Mutex::new(PositionsWriter {
                out,
                offset: POSITIONS_HEADER.len() as u64,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a blob, returning its offset; empty blobs are not stored
    pub fn add(&self, positions: &[u8]) -> Result<u64> {
        if positions.is_empty() {
            return Ok(0);
        }
        let len = u32::try_from(positions.len())
            .map_err(|_| Error::Journal(format!("position blob of {} bytes", positions.len())))?;

        let mut writer = self.writer.lock();
        let offset = writer.offset;
        writer.out.write_u32::<LittleEndian>(len)?;
        writer.out.write_all(positions)?;
        writer.offset += 4 + positions.len() as u64;
        Ok(offset)
    }

    /// Bytes written so far, header included
    pub fn size(&self) -> u64 {
        self.writer.lock().offset
    }

    /// Flush and close, returning the file path
    pub fn finish(self) -> Result<PathBuf> {
        let mut writer = self.writer.into_inner();
        writer.out.flush()?;
        writer.out.get_ref().sync_all()?;
        Ok(self.path)
    }
}

/// Read the blob stored at `offset` of a positions file's bytes
pub fn read_positions(data: &[u8], offset: u64) -> Result<&[u8]> {
    if offset == 0 {
        return Ok(&[]);
    }
    let start = offset as usize;
    let len_bytes: [u8; 4] = data
        .get(start..start + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::Corruption(format!("positions offset {} out of range", offset)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    data.get(start + 4..start + 4 + len)
        .ok_or_else(|| Error::Corruption(format!("positions blob at {} truncated", offset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let positions = PositionsFileConstructor::create(dir.path().join("positions.dat")).unwrap();

        assert_eq!(positions.add(&[]).unwrap(), 0);
        let a = positions.add(&[1, 2, 3]).unwrap();
        let b = positions.add(&[9]).unwrap();
        assert_eq!(a, 8);
        assert_eq!(b, 8 + 4 + 3);
        assert_eq!(positions.size(), b + 5);

        let path = positions.finish().unwrap();
        let data = std::fs::read(path).unwrap();
        assert_eq!(read_positions(&data, a).unwrap(), &[1, 2, 3]);
        assert_eq!(read_positions(&data, b).unwrap(), &[9]);
        assert!(read_positions(&data, 0).unwrap().is_empty());
        assert!(read_positions(&data, 1000).is_err());
    }

    #[test]
    fn test_concurrent_appends() {
        let dir = TempDir::new().unwrap();
        let positions = PositionsFileConstructor::create(dir.path().join("positions.dat")).unwrap();

        let offsets: Vec<(u8, u64)> = std::thread::scope(|s| {
            let handles: Vec<_> = (1..=8u8)
                .map(|i| {
                    let positions = &positions;
                    s.spawn(move || (i, positions.add(&vec![i; i as usize]).unwrap()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let data = std::fs::read(positions.finish().unwrap()).unwrap();
        for (i, offset) in offsets {
            assert_eq!(read_positions(&data, offset).unwrap(), vec![i; i as usize].as_slice());
        }
    }
}
