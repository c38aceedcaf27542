//! Binary journal files
//!
//! ```text
//! header:   magic(u32) version(u32) doc_count(u64)
//! document: doc_id(u64) meta(u64) term_count(u32)
//! term:     word_id(i64) meta(u64) positions_len(u32) positions[positions_len]
//! ```
//!
//! All integers are little-endian.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;

use super::{DocumentHeader, Journal, JournalCursor, JournalTerm, TermRecord};
use crate::DocId;
use crate::error::{Error, Result};

/// "RVJ1"
pub const JOURNAL_MAGIC: u32 = 0x314A_5652;
pub const JOURNAL_VERSION: u32 = 1;
const HEADER_BYTES: usize = 16;

/// Writes a journal file
pub struct JournalWriter<W: Write + Seek> {
    inner: W,
    doc_count: u64,
}

impl JournalWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write + Seek> JournalWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        inner.write_u32::<LittleEndian>(JOURNAL_MAGIC)?;
        inner.write_u32::<LittleEndian>(JOURNAL_VERSION)?;
        inner.write_u64::<LittleEndian>(0)?;
        Ok(Self {
            inner,
            doc_count: 0,
        })
    }

    pub fn write_document(&mut self, doc_id: DocId, meta: u64, terms: &[JournalTerm]) -> Result<()> {
        let term_count = u32::try_from(terms.len())
            .map_err(|_| Error::Journal(format!("document {} has too many terms", doc_id)))?;
        self.inner.write_u64::<LittleEndian>(doc_id)?;
        self.inner.write_u64::<LittleEndian>(meta)?;
        self.inner.write_u32::<LittleEndian>(term_count)?;
        for term in terms {
            let len = u32::try_from(term.positions.len())
                .map_err(|_| Error::Journal(format!("positions of word {} too long", term.word_id)))?;
            self.inner.write_i64::<LittleEndian>(term.word_id)?;
            self.inner.write_u64::<LittleEndian>(term.meta)?;
            self.inner.write_u32::<LittleEndian>(len)?;
            self.inner.write_all(&term.positions)?;
        }
        self.doc_count += 1;
        Ok(())
    }

    /// Patch the document count into the header and flush
    pub fn finish(mut self) -> Result<W> {
        self.inner.seek(SeekFrom::Start(8))?;
        self.inner.write_u64::<LittleEndian>(self.doc_count)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Memory-mapped journal file
pub struct FileJournal {
    mmap: Mmap,
    doc_count: u64,
}

impl FileJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if (file.metadata()?.len() as usize) < HEADER_BYTES {
            return Err(Error::Journal(format!(
                "{} is too short for a journal header",
                path.display()
            )));
        }
        let mmap = unsafe { Mmap::map(&file)? };

        let mut header = &mmap[..HEADER_BYTES];
        let magic = header.read_u32::<LittleEndian>()?;
        if magic != JOURNAL_MAGIC {
            return Err(Error::Journal(format!("bad journal magic: 0x{:08x}", magic)));
        }
        let version = header.read_u32::<LittleEndian>()?;
        if version != JOURNAL_VERSION {
            return Err(Error::Journal(format!(
                "unsupported journal version {}",
                version
            )));
        }
        let doc_count = header.read_u64::<LittleEndian>()?;
        // The count is patched in last, so data behind a zero count means the
        // writer never finished
        if doc_count == 0 && mmap.len() > HEADER_BYTES {
            return Err(Error::Journal(format!(
                "{} holds {} bytes of documents but no document count; the writer did not finish",
                path.display(),
                mmap.len() - HEADER_BYTES
            )));
        }
        Ok(Self { mmap, doc_count })
    }
}

impl Journal for FileJournal {
    fn cursor(&self) -> Result<Box<dyn JournalCursor + '_>> {
        Ok(Box::new(FileCursor {
            data: &self.mmap[HEADER_BYTES..],
            docs_left: self.doc_count,
            terms_left: 0,
        }))
    }

    fn document_count(&self) -> Option<u64> {
        Some(self.doc_count)
    }
}

struct FileCursor<'a> {
    data: &'a [u8],
    docs_left: u64,
    terms_left: u32,
}

fn truncated(e: io::Error) -> Error {
    Error::Journal(format!("truncated journal: {}", e))
}

impl<'a> FileCursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() < len {
            return Err(Error::Journal(format!(
                "truncated journal: need {} bytes, {} left",
                len,
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }
}

impl JournalCursor for FileCursor<'_> {
    fn next_document(&mut self) -> Result<Option<DocumentHeader>> {
        while self.next_term()?.is_some() {}
        if self.docs_left == 0 {
            return Ok(None);
        }

        let doc_id = self.data.read_u64::<LittleEndian>().map_err(truncated)?;
        let meta = self.data.read_u64::<LittleEndian>().map_err(truncated)?;
        let term_count = self.data.read_u32::<LittleEndian>().map_err(truncated)?;
        self.docs_left -= 1;
        self.terms_left = term_count;
        Ok(Some(DocumentHeader {
            doc_id,
            meta,
            term_count,
        }))
    }

    fn next_term(&mut self) -> Result<Option<TermRecord<'_>>> {
        if self.terms_left == 0 {
            return Ok(None);
        }
        let word_id = self.data.read_i64::<LittleEndian>().map_err(truncated)?;
        let meta = self.data.read_u64::<LittleEndian>().map_err(truncated)?;
        let len = self.data.read_u32::<LittleEndian>().map_err(truncated)?;
        let positions = self.take(len as usize)?;
        self.terms_left -= 1;
        Ok(Some(TermRecord {
            word_id,
            meta,
            positions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::for_each_term;
    use tempfile::TempDir;

    fn write_sample(path: &Path) {
        let mut writer = JournalWriter::create(path).unwrap();
        writer
            .write_document(
                100,
                101,
                &[
                    JournalTerm::new(50, 51).with_positions(vec![1, 2, 3]),
                    JournalTerm::new(-7, 0),
                ],
            )
            .unwrap();
        writer.write_document(200, 0, &[]).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.bin");
        write_sample(&path);

        let journal = FileJournal::open(&path).unwrap();
        assert_eq!(journal.document_count(), Some(2));

        let mut cursor = journal.cursor().unwrap();
        let doc = cursor.next_document().unwrap().unwrap();
        assert_eq!(
            doc,
            DocumentHeader {
                doc_id: 100,
                meta: 101,
                term_count: 2
            }
        );
        let term = cursor.next_term().unwrap().unwrap();
        assert_eq!((term.word_id, term.meta, term.positions), (50, 51, &[1u8, 2, 3][..]));
        // remaining term is skipped
        assert_eq!(cursor.next_document().unwrap().unwrap().doc_id, 200);
        assert!(cursor.next_term().unwrap().is_none());
        assert!(cursor.next_document().unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.bin");
        std::fs::write(&path, [0u8; 32]).unwrap();
        assert!(matches!(FileJournal::open(&path), Err(Error::Journal(_))));

        std::fs::write(&path, [0u8; 4]).unwrap();
        assert!(matches!(FileJournal::open(&path), Err(Error::Journal(_))));
    }

    #[test]
    fn test_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.bin");
        write_sample(&path);
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 10).unwrap();
        drop(file);

        let journal = FileJournal::open(&path).unwrap();
        let result = for_each_term(&journal, |_, _| Ok(()));
        assert!(matches!(result, Err(Error::Journal(_))));
    }

    #[test]
    fn test_rejects_unfinished_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.bin");
        let mut writer = JournalWriter::create(&path).unwrap();
        writer.write_document(1, 0, &[JournalTerm::new(3, 4)]).unwrap();
        // Dropped without finish: documents are flushed, the count never is
        drop(writer);

        assert!(matches!(FileJournal::open(&path), Err(Error::Journal(_))));
    }

    #[test]
    fn test_finished_empty_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.bin");
        JournalWriter::create(&path).unwrap().finish().unwrap();

        let journal = FileJournal::open(&path).unwrap();
        assert_eq!(journal.document_count(), Some(0));
        assert!(journal.cursor().unwrap().next_document().unwrap().is_none());
    }
}
