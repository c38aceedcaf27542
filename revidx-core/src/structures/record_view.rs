//! Typed views over flat arrays of fixed-size posting records
//!
//! A postings file is a `[u64]` where every record occupies
//! [`RecordLayout::words`] consecutive words. The views here address
//! records by index and fields by name, so offset arithmetic lives in one
//! place and every access is bounds checked.

use std::ops::Range;

/// A named field of a posting record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    DocId,
    PositionsOffset,
    Meta,
}

/// Size and field placement of a posting record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordLayout {
    words: usize,
}

impl RecordLayout {
    /// `(doc_id, meta)`
    pub const PLAIN: Self = Self { words: 2 };
    /// `(doc_id, positions_offset, meta)`
    pub const FULL: Self = Self { words: 3 };

    #[inline]
    pub const fn words(self) -> usize {
        self.words
    }

    pub fn has_positions(self) -> bool {
        self.words == Self::FULL.words
    }

    /// Word index of `field` within a record, `None` if the layout lacks it
    #[inline]
    pub fn field_index(self, field: RecordField) -> Option<usize> {
        match (field, self.has_positions()) {
            (RecordField::DocId, _) => Some(0),
            (RecordField::PositionsOffset, true) => Some(1),
            (RecordField::PositionsOffset, false) => None,
            (RecordField::Meta, true) => Some(2),
            (RecordField::Meta, false) => Some(1),
        }
    }

    fn require(self, field: RecordField) -> usize {
        match self.field_index(field) {
            Some(idx) => idx,
            None => panic!("{:?} records have no {:?} field", self, field),
        }
    }

    /// Number of records held by `len_words` words
    pub fn records_in(self, len_words: usize) -> usize {
        len_words / self.words
    }
}

/// Read-only view of a run of records
#[derive(Clone, Copy)]
pub struct RecordView<'a> {
    data: &'a [u64],
    layout: RecordLayout,
}

impl<'a> RecordView<'a> {
    pub fn new(data: &'a [u64], layout: RecordLayout) -> Self {
        debug_assert_eq!(data.len() % layout.words(), 0);
        Self { data, layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.layout.words()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All words of record `index`
    #[inline]
    pub fn record(&self, index: usize) -> &'a [u64] {
        let w = self.layout.words();
        let data = self.data;
        &data[index * w..(index + 1) * w]
    }

    #[inline]
    pub fn get(&self, index: usize, field: RecordField) -> u64 {
        self.record(index)[self.layout.require(field)]
    }

    #[inline]
    pub fn doc_id(&self, index: usize) -> u64 {
        self.record(index)[0]
    }

    /// Sub-view of the records in `range`
    pub fn segment(&self, range: Range<usize>) -> RecordView<'a> {
        let w = self.layout.words();
        let data = self.data;
        RecordView::new(&data[range.start * w..range.end * w], self.layout)
    }

    pub fn as_words(&self) -> &'a [u64] {
        self.data
    }

    pub fn iter(&self) -> std::slice::ChunksExact<'a, u64> {
        let data = self.data;
        data.chunks_exact(self.layout.words())
    }

    pub fn is_sorted_by_doc(&self) -> bool {
        self.iter()
            .zip(self.iter().skip(1))
            .all(|(a, b)| a[0] <= b[0])
    }
}

/// Mutable view of a run of records
pub struct RecordViewMut<'a> {
    data: &'a mut [u64],
    layout: RecordLayout,
}

impl<'a> RecordViewMut<'a> {
    pub fn new(data: &'a mut [u64], layout: RecordLayout) -> Self {
        debug_assert_eq!(data.len() % layout.words(), 0);
        Self { data, layout }
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.layout.words()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_view(&self) -> RecordView<'_> {
        RecordView::new(&*self.data, self.layout)
    }

    #[inline]
    pub fn set(&mut self, index: usize, field: RecordField, value: u64) {
        let w = self.layout.words();
        let field = self.layout.require(field);
        self.data[index * w..(index + 1) * w][field] = value;
    }

    /// Overwrite record `index` with `record`
    #[inline]
    pub fn put(&mut self, index: usize, record: &[u64]) {
        let w = self.layout.words();
        self.data[index * w..(index + 1) * w].copy_from_slice(record);
    }

    /// Copy every record of `src` into place starting at record `index`
    pub fn copy_from(&mut self, index: usize, src: RecordView<'_>) {
        debug_assert_eq!(src.layout(), self.layout);
        let w = self.layout.words();
        let words = src.as_words();
        self.data[index * w..index * w + words.len()].copy_from_slice(words);
    }

    /// Split into the first `records` records and the rest
    pub fn split_at(self, records: usize) -> (RecordViewMut<'a>, RecordViewMut<'a>) {
        let (head, tail) = self.data.split_at_mut(records * self.layout.words());
        (
            RecordViewMut::new(head, self.layout),
            RecordViewMut::new(tail, self.layout),
        )
    }

    /// Stable sort by doc id; records with equal ids keep their order
    pub fn sort_by_doc(&mut self) {
        match self.layout.words() {
            2 => sort_fixed::<2>(self.data),
            3 => sort_fixed::<3>(self.data),
            w => unreachable!("unsupported record size {}", w),
        }
    }
}

fn sort_fixed<const N: usize>(data: &mut [u64]) {
    let len = data.len() / N;
    // [u64; N] has the alignment of u64 and no padding.
    let records: &mut [[u64; N]] =
        unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut [u64; N], len) };
    records.sort_by_key(|r| r[0]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_placement() {
        assert_eq!(RecordLayout::PLAIN.field_index(RecordField::Meta), Some(1));
        assert_eq!(
            RecordLayout::PLAIN.field_index(RecordField::PositionsOffset),
            None
        );
        assert_eq!(
            RecordLayout::FULL.field_index(RecordField::PositionsOffset),
            Some(1)
        );
        assert_eq!(RecordLayout::FULL.field_index(RecordField::Meta), Some(2));
    }

    #[test]
    fn test_get_set() {
        let mut data = vec![0u64; 6];
        let mut view = RecordViewMut::new(&mut data, RecordLayout::FULL);
        view.set(1, RecordField::DocId, 7);
        view.set(1, RecordField::PositionsOffset, 8);
        view.set(1, RecordField::Meta, 9);
        assert_eq!(data, vec![0, 0, 0, 7, 8, 9]);

        let view = RecordView::new(&data, RecordLayout::FULL);
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(1, RecordField::Meta), 9);
        assert_eq!(view.segment(1..2).doc_id(0), 7);
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds_record() {
        let data = vec![1u64, 2];
        RecordView::new(&data, RecordLayout::PLAIN).get(1, RecordField::DocId);
    }

    #[test]
    #[should_panic]
    fn test_missing_field() {
        let data = vec![1u64, 2];
        RecordView::new(&data, RecordLayout::PLAIN).get(0, RecordField::PositionsOffset);
    }

    #[test]
    fn test_stable_sort_by_doc() {
        let mut data = vec![5, 50, 1, 10, 5, 51, 3, 30];
        let mut view = RecordViewMut::new(&mut data, RecordLayout::PLAIN);
        view.sort_by_doc();
        assert_eq!(data, vec![1, 10, 3, 30, 5, 50, 5, 51]);

        let mut data = vec![9, 1, 2, 4, 1, 2];
        RecordViewMut::new(&mut data, RecordLayout::FULL).sort_by_doc();
        assert_eq!(data, vec![4, 1, 2, 9, 1, 2]);
    }
}
