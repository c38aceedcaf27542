//! On-disk data structures: posting record views and the final encoders

mod btree;
mod record_view;
pub mod skiplist;

pub use btree::{BTreeContext, BTreeReader, BTreeWriter, KeyOrder};
pub use record_view::{RecordField, RecordLayout, RecordView, RecordViewMut};
pub use skiplist::{SkipListReader, SkipListWriter};

/// Word directory: `(word_id, postings_offset)` keyed by signed word id
pub const WORDS_BTREE: BTreeContext = BTreeContext::new(2, 256, KeyOrder::Signed);

/// Plain postings segment: `(doc_id, meta)` keyed by doc id
pub const DOCS_BTREE: BTreeContext = BTreeContext::new(2, 128, KeyOrder::Unsigned);
