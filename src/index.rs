//! GenomeIndex: immutable tile → position index with two physical layouts.
//!
//! - **Direct**: the tile key indexes a prefix-sum table into one packed array of
//!   concatenated offsets. Overused tiles own a zero-length slice.
//! - **Segmented**: long tiles are split; the head key indexes the table and each
//!   posting carries its tail next to the offset. Lookups scan the head bucket.
//!
//! The layout is picked once at build time. Hot loops are generic over
//! [`TileLookup`] and are dispatched once per query, never per tile.

use crate::encode::{Alphabet, TileCodec};
use crate::source::SequenceSourceTable;

/// Search parameters resolved at build time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchParams {
    pub alphabet: Alphabet,
    pub tile_size: usize,
    /// Stride between indexed tiles.
    pub step_size: usize,
    pub min_match: usize,
    pub max_gap: u32,
    /// Tiles seen more often than this are dropped. `u32::MAX` disables the filter.
    pub rep_match: u32,
    pub allow_one_mismatch: bool,
}

/// Posting of the segmented layout: tail key stored with the offset.
#[repr(C, packed(2))]
#[derive(Clone, Copy)]
pub struct TailPosting {
    /// Key of the tile tail.
    pub tail: u16,
    /// Concatenated offset of the tile start.
    pub offset: u32,
}

/// Read access shared by both layouts.
pub trait TileLookup {
    /// Length of the posting list under `head`.
    fn bucket_len(&self, head: u32) -> usize;

    /// Offsets of tiles whose head is `head` and tail is `tail`.
    fn matches(&self, head: u32, tail: u32) -> impl Iterator<Item = u32> + '_;
}

/// Direct layout: one offset per posting.
pub struct DirectLayout {
    starts: Vec<u32>,
    postings: Vec<u32>,
    overused: Vec<u64>,
}

impl DirectLayout {
    pub(crate) fn new(starts: Vec<u32>, postings: Vec<u32>, overused: Vec<u64>) -> Self {
        Self {
            starts,
            postings,
            overused,
        }
    }

    /// Posting list for `key`; empty for overused or absent tiles.
    #[inline]
    pub fn postings(&self, key: u32) -> &[u32] {
        let k = key as usize;
        match (self.starts.get(k), self.starts.get(k + 1)) {
            (Some(&s), Some(&e)) => &self.postings[s as usize..e as usize],
            _ => &[],
        }
    }

    /// Whether `key` was dropped by overuse filtering.
    #[inline]
    pub fn is_overused(&self, key: u32) -> bool {
        let k = key as usize;
        self.overused
            .get(k / 64)
            .is_some_and(|w| (w >> (k % 64)) & 1 == 1)
    }

    pub fn overused_count(&self) -> usize {
        self.overused.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn posting_count(&self) -> usize {
        self.postings.len()
    }
}

impl TileLookup for DirectLayout {
    #[inline]
    fn bucket_len(&self, head: u32) -> usize {
        self.postings(head).len()
    }

    #[inline]
    fn matches(&self, head: u32, _tail: u32) -> impl Iterator<Item = u32> + '_ {
        self.postings(head).iter().copied()
    }
}

/// Segmented layout: head-indexed buckets of `(tail, offset)` records.
pub struct SegmentedLayout {
    starts: Vec<u32>,
    postings: Vec<TailPosting>,
}

impl SegmentedLayout {
    pub(crate) fn new(starts: Vec<u32>, postings: Vec<TailPosting>) -> Self {
        Self { starts, postings }
    }

    /// All records under `head`.
    #[inline]
    pub fn bucket(&self, head: u32) -> &[TailPosting] {
        let k = head as usize;
        match (self.starts.get(k), self.starts.get(k + 1)) {
            (Some(&s), Some(&e)) => &self.postings[s as usize..e as usize],
            _ => &[],
        }
    }

    pub fn posting_count(&self) -> usize {
        self.postings.len()
    }
}

impl TileLookup for SegmentedLayout {
    #[inline]
    fn bucket_len(&self, head: u32) -> usize {
        self.bucket(head).len()
    }

    #[inline]
    fn matches(&self, head: u32, tail: u32) -> impl Iterator<Item = u32> + '_ {
        self.bucket(head)
            .iter()
            .filter(move |p| p.tail as u32 == tail)
            .map(|p| p.offset)
    }
}

/// Physical layout, chosen by tile size at build time.
pub enum TileLayout {
    Direct(DirectLayout),
    Segmented(SegmentedLayout),
}

/// Immutable tile index over a set of target sequences.
///
/// Safe for unsynchronized concurrent reads: nothing mutates it after build.
pub struct GenomeIndex {
    params: SearchParams,
    codec: TileCodec,
    layout: TileLayout,
    sources: SequenceSourceTable,
}

impl GenomeIndex {
    pub(crate) fn from_parts(
        params: SearchParams,
        codec: TileCodec,
        layout: TileLayout,
        sources: SequenceSourceTable,
    ) -> Self {
        Self {
            params,
            codec,
            layout,
            sources,
        }
    }

    #[inline]
    pub fn params(&self) -> &SearchParams {
        &self.params
    }
    #[inline]
    pub fn codec(&self) -> &TileCodec {
        &self.codec
    }
    #[inline]
    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }
    #[inline]
    pub fn sources(&self) -> &SequenceSourceTable {
        &self.sources
    }
    #[inline]
    pub fn tile_size(&self) -> usize {
        self.params.tile_size
    }
    #[inline]
    pub fn is_protein(&self) -> bool {
        self.params.alphabet == Alphabet::Protein
    }
    #[inline]
    pub fn is_segmented(&self) -> bool {
        matches!(self.layout, TileLayout::Segmented(_))
    }

    /// Size of concatenated target space.
    pub fn total_size(&self) -> u32 {
        self.sources.total_size()
    }

    /// Total postings stored.
    pub fn posting_count(&self) -> usize {
        match &self.layout {
            TileLayout::Direct(d) => d.posting_count(),
            TileLayout::Segmented(s) => s.posting_count(),
        }
    }

    /// Tiles dropped by overuse filtering (always zero when segmented).
    pub fn overused_count(&self) -> usize {
        match &self.layout {
            TileLayout::Direct(d) => d.overused_count(),
            TileLayout::Segmented(_) => 0,
        }
    }

    /// Sorted concatenated offsets where `tile` is indexed. Empty for invalid,
    /// absent or overused tiles.
    pub fn tile_postings(&self, tile: &[u8]) -> Vec<u32> {
        if tile.len() != self.codec.tile_size() {
            return Vec::new();
        }
        let codec = self.codec.unmasked();
        let (Some(head), Some(tail)) = (codec.encode_head(tile, 0), codec.encode_tail(tile, 0))
        else {
            return Vec::new();
        };
        let mut out: Vec<u32> = match &self.layout {
            TileLayout::Direct(d) => d.matches(head, tail).collect(),
            TileLayout::Segmented(s) => s.matches(head, tail).collect(),
        };
        out.sort_unstable();
        out
    }

    /// Whether `tile` was dropped by overuse filtering.
    pub fn is_overused(&self, tile: &[u8]) -> bool {
        match &self.layout {
            TileLayout::Direct(d) => self
                .codec
                .unmasked()
                .encode(tile, 0)
                .filter(|_| tile.len() == self.codec.tile_size())
                .is_some_and(|k| d.is_overused(k)),
            TileLayout::Segmented(_) => false,
        }
    }
}

/// Six-frame protein index over translated DNA targets, `[strand][frame]`.
pub struct TranslatedIndex {
    frames: [[GenomeIndex; 3]; 2],
    /// Untranslated size of each target, in source order.
    dna_sizes: Vec<u32>,
}

impl TranslatedIndex {
    pub(crate) fn new(frames: [[GenomeIndex; 3]; 2], dna_sizes: Vec<u32>) -> Self {
        Self { frames, dna_sizes }
    }

    /// Index for `strand` (0 = forward, 1 = reverse complement) and `frame` (0..3).
    #[inline]
    pub fn frame(&self, strand: usize, frame: usize) -> &GenomeIndex {
        &self.frames[strand][frame]
    }

    /// All six indexes with their `(strand, frame)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &GenomeIndex)> {
        self.frames.iter().enumerate().flat_map(|(strand, row)| {
            row.iter()
                .enumerate()
                .map(move |(frame, gf)| (strand, frame, gf))
        })
    }

    /// Parameters shared by all frames.
    pub fn params(&self) -> &SearchParams {
        self.frames[0][0].params()
    }

    /// Source table of one frame; names are identical across frames.
    pub fn sources(&self) -> &SequenceSourceTable {
        self.frames[0][0].sources()
    }

    /// Nucleotide length of target `id`.
    pub fn dna_size(&self, id: usize) -> Option<u32> {
        self.dna_sizes.get(id).copied()
    }

    /// Total untranslated bases indexed.
    pub fn total_bases(&self) -> u64 {
        self.dna_sizes.iter().map(|&s| s as u64).sum()
    }
}
