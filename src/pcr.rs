//! In-silico PCR over a nucleotide index.
//!
//! Primers are given 5'→3' on opposite strands. The reverse primer is
//! reverse-complemented so both are searched on the indexed strand; every
//! forward tile hit followed, in the same source, by a reverse tile hit within
//! the distance window yields a product interval. Overlapping intervals of one
//! source are merged.

use log::debug;
use std::collections::BTreeMap;

use crate::budget::SearchBudget;
use crate::encode::reverse_complement;
use crate::error::SearchError;
use crate::index::{GenomeIndex, TileLayout};
use crate::search::Strand;

/// One merged product region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcrMatch {
    pub source: usize,
    /// Local start of the forward primer tile.
    pub t_start: u32,
    /// Local end of the reverse primer tile.
    pub t_end: u32,
    pub strand: Strand,
}

/// Product regions for `f_primer` and `r_primer`, forward strand only.
/// Matches are ordered by source then start.
pub fn pcr_clumps(
    index: &GenomeIndex,
    f_primer: &[u8],
    r_primer: &[u8],
    min_distance: u32,
    max_distance: u32,
    budget: &mut SearchBudget,
) -> Result<Vec<PcrMatch>, SearchError> {
    if index.is_protein() {
        return Err(SearchError::Unsupported(
            "can't do PCR on a protein or translated index",
        ));
    }
    let TileLayout::Direct(direct) = index.layout() else {
        return Err(SearchError::Unsupported("can't do PCR on large tile sizes"));
    };
    let codec = index.codec().unmasked();
    let tile = codec.tile_size();
    let f_primer = f_primer.to_ascii_lowercase();
    let r_primer = reverse_complement(&r_primer.to_ascii_lowercase());

    let tiles_of = |p: &[u8]| -> Vec<Option<u32>> {
        if p.len() < tile {
            return Vec::new();
        }
        (0..=p.len() - tile).map(|i| codec.encode(p, i)).collect()
    };
    let r_tiles: Vec<u32> = tiles_of(&r_primer)
        .into_iter()
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(|| {
            SearchError::BadSequence(format!(
                "bad char in reverse primer {}",
                String::from_utf8_lossy(&r_primer)
            ))
        })?;

    let sources = index.sources();
    // source id -> start -> end, kept non-overlapping
    let mut merged: BTreeMap<usize, BTreeMap<u32, u32>> = BTreeMap::new();
    let mut pairs = 0usize;
    for f_key in tiles_of(&f_primer).into_iter().flatten() {
        for &f_pos in direct.postings(f_key) {
            let Some((id, _)) = sources.locate(f_pos) else {
                continue;
            };
            let Some(src) = sources.get(id) else {
                continue;
            };
            for &r_key in &r_tiles {
                for &r_pos in direct.postings(r_key) {
                    if r_pos <= f_pos || r_pos >= src.end {
                        continue;
                    }
                    let distance = r_pos - f_pos;
                    if distance < min_distance || distance > max_distance {
                        continue;
                    }
                    pairs += 1;
                    budget.charge(std::mem::size_of::<(u32, u32)>())?;
                    let end = (r_pos + tile as u32).min(src.end) - src.start;
                    merge_add(merged.entry(id).or_default(), f_pos - src.start, end);
                }
            }
        }
    }
    debug!("PCR: {pairs} primer pairs");

    let mut out = Vec::new();
    for (source, intervals) in merged {
        for (t_start, t_end) in intervals {
            budget.push(
                &mut out,
                PcrMatch {
                    source,
                    t_start,
                    t_end,
                    strand: Strand::Forward,
                },
            )?;
        }
    }
    Ok(out)
}

/// Both orientations: `+` runs the primers as given, `-` with them swapped.
pub fn pcr_both_strands(
    index: &GenomeIndex,
    f_primer: &[u8],
    r_primer: &[u8],
    max_distance: u32,
    budget: &mut SearchBudget,
) -> Result<Vec<PcrMatch>, SearchError> {
    let mut out = pcr_clumps(index, f_primer, r_primer, 0, max_distance, budget)?;
    let minus = pcr_clumps(index, r_primer, f_primer, 0, max_distance, budget)?;
    out.extend(minus.into_iter().map(|m| PcrMatch {
        strand: Strand::Reverse,
        ..m
    }));
    Ok(out)
}

/// Insert `[start, end)` into a set of disjoint intervals, absorbing every
/// interval it overlaps.
fn merge_add(set: &mut BTreeMap<u32, u32>, mut start: u32, mut end: u32) {
    let overlapping: Vec<u32> = set
        .range(..end)
        .rev()
        .take_while(|&(_, &e)| e > start)
        .map(|(&s, _)| s)
        .collect();
    for s in overlapping {
        if let Some(e) = set.remove(&s) {
            start = start.min(s);
            end = end.max(e);
        }
    }
    set.insert(start, end);
}
