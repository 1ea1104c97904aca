//! HitFinder: every occurrence of every query tile.
//!
//! The query is scanned at every offset; the index itself was sampled at its
//! step size, so each target position is looked up once per phase. Windows with
//! an invalid symbol are skipped. With one-mismatch enabled each window also
//! looks up every single-symbol substitution, computed as key deltas.

use crate::budget::SearchBudget;
use crate::encode::TileCodec;
use crate::error::SearchError;
use crate::index::{GenomeIndex, TileLayout, TileLookup};

/// One query tile found in the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Hit {
    /// Query offset of the tile.
    pub q_start: u32,
    /// Target offset of the tile (concatenated or local, depending on the caller).
    pub t_start: u32,
    /// `t_start + query_size - q_start`; constant along an ungapped alignment.
    pub diagonal: u64,
}

impl Hit {
    #[inline]
    pub fn new(q_start: u32, t_start: u32, query_size: usize) -> Self {
        Self {
            q_start,
            t_start,
            diagonal: t_start as u64 + query_size as u64 - q_start as u64,
        }
    }
}

/// All hits of `query` against `index`, in concatenated target coordinates.
pub fn find_hits(
    index: &GenomeIndex,
    query: &[u8],
    budget: &mut SearchBudget,
) -> Result<Vec<Hit>, SearchError> {
    let codec = index.codec().unmasked();
    let one_mismatch = index.params().allow_one_mismatch;
    let mut hits = Vec::new();
    // Single dispatch on the layout; the loops below are monomorphized.
    match index.layout() {
        TileLayout::Direct(d) => scan(d, &codec, query, one_mismatch, budget, &mut hits)?,
        TileLayout::Segmented(s) => scan(s, &codec, query, one_mismatch, budget, &mut hits)?,
    }
    Ok(hits)
}

/// Hits of `query` falling entirely inside `[t_min, t_max)` of source `source`,
/// with `t_start` local to that source.
pub fn find_hits_in_region(
    index: &GenomeIndex,
    query: &[u8],
    source: usize,
    t_min: u32,
    t_max: u32,
    budget: &mut SearchBudget,
) -> Result<Vec<Hit>, SearchError> {
    let Some(src) = index.sources().get(source) else {
        return Ok(Vec::new());
    };
    let tile = index.tile_size() as u32;
    let lo = src.start.saturating_add(t_min);
    let hi = src.start.saturating_add(t_max.min(src.len()));
    let mut out = Vec::new();
    for h in find_hits(index, query, budget)? {
        if h.t_start >= lo && h.t_start + tile <= hi {
            budget.push(&mut out, Hit::new(h.q_start, h.t_start - src.start, query.len()))?;
        }
    }
    Ok(out)
}

fn scan<L: TileLookup>(
    layout: &L,
    codec: &TileCodec,
    query: &[u8],
    one_mismatch: bool,
    budget: &mut SearchBudget,
    hits: &mut Vec<Hit>,
) -> Result<(), SearchError> {
    let tile = codec.tile_size();
    if query.len() < tile {
        return Ok(());
    }
    let qsize = query.len();
    for q in 0..=qsize - tile {
        let (Some(head), Some(tail)) = (codec.encode_head(query, q), codec.encode_tail(query, q))
        else {
            continue;
        };
        collect(layout, head, tail, q, qsize, budget, hits)?;
        if one_mismatch {
            for_each_variant(codec, &query[q..q + tile], head, tail, |h, t| {
                collect(layout, h, t, q, qsize, budget, hits)
            })?;
        }
    }
    Ok(())
}

#[inline]
fn collect<L: TileLookup>(
    layout: &L,
    head: u32,
    tail: u32,
    q: usize,
    qsize: usize,
    budget: &mut SearchBudget,
    hits: &mut Vec<Hit>,
) -> Result<(), SearchError> {
    let n = layout.bucket_len(head);
    if n == 0 {
        return Ok(());
    }
    budget.reserve(hits, n)?;
    hits.extend(layout.matches(head, tail).map(|t| Hit::new(q as u32, t, qsize)));
    Ok(())
}

/// Call `f(head, tail)` for every key differing from `window` in exactly one
/// symbol.
fn for_each_variant<F>(
    codec: &TileCodec,
    window: &[u8],
    head: u32,
    tail: u32,
    mut f: F,
) -> Result<(), SearchError>
where
    F: FnMut(u32, u32) -> Result<(), SearchError>,
{
    let size = codec.alphabet().size();
    let head_len = codec.head_size();
    let tail_len = codec.tail_size();
    for (pos, &b) in window.iter().enumerate() {
        let Some(orig) = codec.symbol(b) else {
            continue;
        };
        let in_head = pos < head_len;
        let weight = if in_head {
            codec.weight(pos, head_len)
        } else {
            codec.weight(pos - head_len, tail_len)
        };
        let base_head = if in_head { head - orig * weight } else { head };
        let base_tail = if in_head { tail } else { tail - orig * weight };
        for sym in 0..size {
            if sym == orig {
                continue;
            }
            if in_head {
                f(base_head + sym * weight, tail)?;
            } else {
                f(head, base_tail + sym * weight)?;
            }
        }
    }
    Ok(())
}
