//! ClumpAssembler: hits → candidate alignment regions.
//!
//! 1. Partition hits by target offset into 64 Ki buckets and sort each by diagonal.
//! 2. Cut a run wherever neighbouring diagonals differ by more than `max_gap`.
//!    Runs reaching into the last `near_enough` positions of their bucket are
//!    carried into the next bucket instead of being closed.
//! 3. Drop runs below `min_match`, split the rest where hits are more than
//!    `near_enough` apart in the target, then split by source.
//! 4. Bound each clump, measure query coverage, sort best first.

use std::cmp::Reverse;

use crate::budget::SearchBudget;
use crate::error::SearchError;
use crate::hits::Hit;
use crate::index::GenomeIndex;
use crate::radix::{radix_sort_hits, sort_by_diagonal};
use crate::source::SequenceSourceTable;

/// Hits are partitioned on `t_start >> BUCKET_SHIFT`.
pub const BUCKET_SHIFT: u32 = 16;

/// Largest target distance between neighbouring hits of one clump.
pub const NEAR_ENOUGH_DNA: u32 = 300;
pub const NEAR_ENOUGH_PROTEIN: u32 = 100;

/// One candidate local alignment, bound to a single source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clump {
    pub q_start: u32,
    /// One past the end of the last query tile.
    pub q_end: u32,
    /// Source id in the index's [`SequenceSourceTable`].
    pub source: usize,
    /// Concatenated target start.
    pub t_start: u32,
    /// One past the end of the last target tile.
    pub t_end: u32,
    pub hit_count: usize,
    /// Query positions covered by at least one hit tile.
    pub query_coverage: u32,
    /// Member hits ordered by query then target offset.
    pub hits: Vec<Hit>,
}

impl Clump {
    /// Target range relative to the start of its source.
    pub fn local_target(&self, sources: &SequenceSourceTable) -> (u32, u32) {
        let base = sources.get(self.source).map_or(0, |s| s.start);
        (self.t_start - base, self.t_end - base)
    }

    /// Source name.
    pub fn target_name<'a>(&self, sources: &'a SequenceSourceTable) -> &'a str {
        sources.get(self.source).map_or("", |s| s.name.as_str())
    }
}

/// Knobs for one assembly run.
#[derive(Clone, Copy, Debug)]
pub struct ClumpParams {
    pub tile_size: u32,
    pub max_gap: u64,
    pub min_match: usize,
    pub near_enough: u32,
}

impl ClumpParams {
    pub fn for_index(index: &GenomeIndex) -> Self {
        let p = index.params();
        Self {
            tile_size: p.tile_size as u32,
            max_gap: p.max_gap as u64,
            min_match: p.min_match.max(1),
            near_enough: if index.is_protein() {
                NEAR_ENOUGH_PROTEIN
            } else {
                NEAR_ENOUGH_DNA
            },
        }
    }
}

/// Group `hits` (concatenated coordinates) into clumps against `index`.
pub fn assemble(
    hits: Vec<Hit>,
    index: &GenomeIndex,
    budget: &mut SearchBudget,
) -> Result<Vec<Clump>, SearchError> {
    assemble_with(hits, index.sources(), ClumpParams::for_index(index), budget)
}

/// [`assemble`] with explicit parameters.
pub fn assemble_with(
    mut hits: Vec<Hit>,
    sources: &SequenceSourceTable,
    params: ClumpParams,
    budget: &mut SearchBudget,
) -> Result<Vec<Clump>, SearchError> {
    let mut clumps = Vec::new();
    if hits.is_empty() {
        return Ok(clumps);
    }
    let mut scratch = Vec::new();
    budget.reserve(&mut scratch, hits.len())?;

    // Bucket order first; stable, so diagonals sorted later stay grouped.
    radix_sort_hits(&mut hits, &mut scratch, |h| {
        (h.t_start >> BUCKET_SHIFT) as u64
    });

    let bucket_size = 1u64 << BUCKET_SHIFT;
    let mut carry: Vec<Hit> = Vec::new();
    let mut i = 0;
    while i < hits.len() {
        let bucket = (hits[i].t_start >> BUCKET_SHIFT) as u64;
        let mut j = i;
        while j < hits.len() && (hits[j].t_start >> BUCKET_SHIFT) as u64 == bucket {
            j += 1;
        }
        let last_bucket = j == hits.len();

        let mut list = std::mem::take(&mut carry);
        budget.reserve(&mut list, j - i)?;
        list.extend_from_slice(&hits[i..j]);
        sort_by_diagonal(&mut list, &mut scratch);

        // Runs still open this close to the bucket end may continue in the next.
        let boundary = (bucket + 1) * bucket_size - params.near_enough as u64;
        for run in diagonal_runs(&list, params.max_gap) {
            let max_t = run.iter().map(|h| h.t_start).max().unwrap_or(0) as u64;
            if !last_bucket && max_t > boundary {
                budget.reserve(&mut carry, run.len())?;
                carry.extend_from_slice(run);
            } else if run.len() >= params.min_match {
                split_near(run, sources, &params, budget, &mut clumps)?;
            }
        }
        i = j;
    }

    clumps.sort_by_key(|c| {
        (
            Reverse(c.hit_count),
            Reverse(c.query_coverage),
            c.source,
            c.t_start,
            c.q_start,
        )
    });
    Ok(clumps)
}

/// Maximal slices of diagonal-sorted `hits` with no step above `max_gap`.
fn diagonal_runs(hits: &[Hit], max_gap: u64) -> impl Iterator<Item = &[Hit]> {
    hits.chunk_by(move |a, b| b.diagonal - a.diagonal <= max_gap)
}

/// Re-partition one diagonal run by physical target distance.
fn split_near(
    run: &[Hit],
    sources: &SequenceSourceTable,
    params: &ClumpParams,
    budget: &mut SearchBudget,
    out: &mut Vec<Clump>,
) -> Result<(), SearchError> {
    let mut by_target: Vec<Hit> = Vec::new();
    budget.reserve(&mut by_target, run.len())?;
    by_target.extend_from_slice(run);
    by_target.sort_by_key(|h| (h.t_start, h.q_start));

    let near = params.near_enough;
    for group in by_target.chunk_by(|a, b| b.t_start - a.t_start <= near) {
        if group.len() >= params.min_match {
            split_by_source(group, sources, params, budget, out)?;
        }
    }
    Ok(())
}

/// Emit one clump per source touched by `group` (target-sorted).
fn split_by_source(
    group: &[Hit],
    sources: &SequenceSourceTable,
    params: &ClumpParams,
    budget: &mut SearchBudget,
    out: &mut Vec<Clump>,
) -> Result<(), SearchError> {
    let mut rest = group;
    while let Some(first) = rest.first() {
        let Some(id) = sources.find(first.t_start) else {
            break;
        };
        let end = sources.get(id).map_or(u32::MAX, |s| s.end);
        let n = rest.iter().take_while(|h| h.t_start < end).count();
        let (mine, tail) = rest.split_at(n);
        if mine.len() >= params.min_match {
            let clump = make_clump(mine, id, params.tile_size, budget)?;
            budget.push(out, clump)?;
        }
        rest = tail;
    }
    Ok(())
}

fn make_clump(
    hits: &[Hit],
    source: usize,
    tile: u32,
    budget: &mut SearchBudget,
) -> Result<Clump, SearchError> {
    let mut members = Vec::new();
    budget.reserve(&mut members, hits.len())?;
    members.extend_from_slice(hits);
    members.sort_by_key(|h| (h.q_start, h.t_start));

    let (mut q_start, mut q_end) = (u32::MAX, 0);
    let (mut t_start, mut t_end) = (u32::MAX, 0);
    for h in &members {
        q_start = q_start.min(h.q_start);
        q_end = q_end.max(h.q_start);
        t_start = t_start.min(h.t_start);
        t_end = t_end.max(h.t_start);
    }
    Ok(Clump {
        q_start,
        q_end: q_end + tile,
        source,
        t_start,
        t_end: t_end + tile,
        hit_count: members.len(),
        query_coverage: query_coverage(&members, tile),
        hits: members,
    })
}

/// Length of the union of `[q_start, q_start + tile)` over query-sorted hits.
pub fn query_coverage(hits: &[Hit], tile: u32) -> u32 {
    let mut covered = 0u32;
    let mut reach = 0u32;
    for h in hits {
        let (s, e) = (h.q_start.max(reach), h.q_start + tile);
        if e > s {
            covered += e - s;
            reach = e;
        }
    }
    covered
}
