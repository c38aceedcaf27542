//! Document id rewriting
//!
//! Postings are laid out by rewritten id, not by crawl-time id. Packing a
//! domain's rank into the high bits makes documents of well ranked domains
//! sort to the front of every posting list.

use rustc_hash::FxHashMap;

use crate::DocId;

/// Maps a raw document id to the id stored in the index
pub trait DocIdRewriter: Send + Sync {
    fn rewrite(&self, doc_id: DocId) -> DocId;
}

/// Leaves ids untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRewriter;

impl DocIdRewriter for IdentityRewriter {
    #[inline]
    fn rewrite(&self, doc_id: DocId) -> DocId {
        doc_id
    }
}

impl<F> DocIdRewriter for F
where
    F: Fn(DocId) -> DocId + Send + Sync,
{
    #[inline]
    fn rewrite(&self, doc_id: DocId) -> DocId {
        self(doc_id)
    }
}

const ORDINAL_BITS: u32 = 26;
const DOMAIN_MASK: u64 = 0x7FFF_FFFF;
const RANK_SHIFT: u32 = 57;
/// Largest encodable rank; also the rank of unknown domains
pub const MAX_RANK: u8 = 0x3F;

/// Stores the owning domain's sort rank in bits 57..63 of the doc id
///
/// Doc ids are `[rank:6][domain:31][ordinal:26]`. Lower ranks sort first.
#[derive(Debug, Clone, Default)]
pub struct DomainRankRewriter {
    ranks: FxHashMap<u32, u8>,
}

impl DomainRankRewriter {
    pub fn new(ranks: FxHashMap<u32, u8>) -> Self {
        Self { ranks }
    }

    pub fn domain_of(doc_id: DocId) -> u32 {
        ((doc_id >> ORDINAL_BITS) & DOMAIN_MASK) as u32
    }

    pub fn rank_of(&self, domain: u32) -> u8 {
        self.ranks.get(&domain).map_or(MAX_RANK, |&r| r.min(MAX_RANK))
    }
}

impl DocIdRewriter for DomainRankRewriter {
    fn rewrite(&self, doc_id: DocId) -> DocId {
        let rank = self.rank_of(Self::domain_of(doc_id)) as u64;
        let stripped = doc_id & !((MAX_RANK as u64) << RANK_SHIFT);
        stripped | (rank << RANK_SHIFT)
    }
}
