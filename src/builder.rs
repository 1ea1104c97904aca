//! Index builders: count, allocate, fill.
//!
//! Postings live in one contiguous array per index. The count pass sizes every
//! tile first so the fill pass never grows anything:
//! 1. count tiles at `step_size` stride, saturating one past the overuse threshold;
//! 2. prefix-sum the surviving counts into slice starts (overused tiles get none);
//! 3. re-scan and write each offset at its tile's cursor.

use log::{debug, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::encode::{Alphabet, TileCodec, check_tile_size, reverse_complement};
use crate::error::IndexError;
use crate::index::{
    DirectLayout, GenomeIndex, SearchParams, SegmentedLayout, TailPosting, TileLayout,
    TranslatedIndex,
};
use crate::ooc::read_ooc;
use crate::source::{MAX_TOTAL_BASES, SequenceSourceTable};
use crate::translate::translate_frames;

/// One named target sequence handed to the builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetSeq {
    pub name: String,
    pub seq: Vec<u8>,
}

impl TargetSeq {
    pub fn new(name: impl Into<String>, seq: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            seq: seq.into(),
        }
    }
}

/// Build-time configuration.
#[derive(Clone, Debug)]
pub struct IndexParams {
    alphabet: Alphabet,
    tile_size: usize,
    step_size: usize,
    min_match: usize,
    max_gap: u32,
    rep_match: Option<u32>,
    allow_one_mismatch: bool,
    mask_upper: bool,
    mask_simple_repeats: bool,
    ooc: Option<PathBuf>,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self::dna()
    }
}

impl IndexParams {
    /// Nucleotide defaults: tile 11, min match 2, max gap 2.
    pub fn dna() -> Self {
        Self {
            alphabet: Alphabet::Dna,
            tile_size: 11,
            step_size: 0,
            min_match: 2,
            max_gap: 2,
            rep_match: None,
            allow_one_mismatch: false,
            mask_upper: false,
            mask_simple_repeats: true,
            ooc: None,
        }
    }

    /// Protein defaults: tile 5, min match 1, max gap 0.
    pub fn protein() -> Self {
        Self {
            alphabet: Alphabet::Protein,
            tile_size: 5,
            min_match: 1,
            max_gap: 0,
            ..Self::dna()
        }
    }

    /// Defaults for the six-frame translated index: tile 4, min match 2, max gap 0.
    pub fn translated() -> Self {
        Self {
            tile_size: 4,
            min_match: 2,
            ..Self::protein()
        }
    }

    /// Tile length in symbols.
    pub fn tile_size(mut self, n: usize) -> Self {
        self.tile_size = n;
        self
    }
    /// Stride between indexed tiles. 0 means tile size.
    pub fn step_size(mut self, n: usize) -> Self {
        self.step_size = n;
        self
    }
    /// Hits a clump needs to be reported.
    pub fn min_match(mut self, n: usize) -> Self {
        self.min_match = n;
        self
    }
    /// Largest diagonal delta between neighbouring hits of one clump.
    pub fn max_gap(mut self, n: u32) -> Self {
        self.max_gap = n;
        self
    }
    /// Overuse threshold. Unset means [`default_rep_match`].
    pub fn rep_match(mut self, n: u32) -> Self {
        self.rep_match = Some(n);
        self
    }
    /// Look up every one-symbol variant of each query tile.
    pub fn allow_one_mismatch(mut self, yes: bool) -> Self {
        self.allow_one_mismatch = yes;
        self
    }
    /// Leave upper-case (soft-masked) DNA unindexed.
    pub fn mask_upper(mut self, yes: bool) -> Self {
        self.mask_upper = yes;
        self
    }
    /// Drop period-1 and period-2 tiles (default: true).
    pub fn mask_simple_repeats(mut self, yes: bool) -> Self {
        self.mask_simple_repeats = yes;
        self
    }
    /// Pre-mark tiles listed in an overused-tile file.
    pub fn ooc(mut self, path: impl Into<PathBuf>) -> Self {
        self.ooc = Some(path.into());
        self
    }

    pub fn alphabet_kind(&self) -> Alphabet {
        self.alphabet
    }
    pub(crate) fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }
    pub(crate) fn mask_upper_flag(&self) -> bool {
        self.mask_upper
    }
    pub(crate) fn ooc_path(&self) -> Option<&Path> {
        self.ooc.as_deref()
    }

    /// Effective stride.
    pub fn effective_step(&self) -> usize {
        if self.step_size == 0 {
            self.tile_size
        } else {
            self.step_size
        }
    }

    /// Validate and resolve defaults.
    pub fn resolve(&self) -> Result<SearchParams, IndexError> {
        check_tile_size(self.tile_size, self.alphabet)?;
        let step = self.effective_step();
        let segmented = self.tile_size > self.alphabet.max_head();
        let rep_match = if segmented {
            u32::MAX
        } else {
            match self.rep_match {
                Some(n) => n,
                None => default_rep_match(self.tile_size, step, self.alphabet),
            }
        };
        Ok(SearchParams {
            alphabet: self.alphabet,
            tile_size: self.tile_size,
            step_size: step,
            min_match: self.min_match.max(1),
            max_gap: self.max_gap,
            rep_match,
            allow_one_mismatch: self.allow_one_mismatch,
        })
    }
}

/// Default overuse threshold for a tile size, scaled by `tile / step`.
///
/// Halving the step doubles the postings of a repeated tile, so the threshold
/// follows.
pub fn default_rep_match(tile_size: usize, step_size: usize, alphabet: Alphabet) -> u32 {
    let base: u64 = match alphabet {
        Alphabet::Protein => match tile_size {
            0..=3 => 600_000,
            4 => 30_000,
            5 => 1_500,
            6 => 75,
            _ => 10,
        },
        Alphabet::Dna => match tile_size {
            18.. => 2,
            17 => 4,
            16 => 8,
            15 => 16,
            14 => 32,
            13 => 128,
            12 => 256,
            11 => 1024,
            10 => 4096,
            9 => 16_384,
            8 => 65_536,
            7 => 262_144,
            _ => 1_048_576,
        },
    };
    let scaled = base * tile_size as u64 / step_size.max(1) as u64;
    scaled.clamp(1, u32::MAX as u64 - 1) as u32
}

// ---- Count pass ----

/// Count tiles of `seq` at `step` stride into `counts`, saturating at `cap`.
pub(crate) fn count_tiles(codec: &TileCodec, seq: &[u8], step: usize, counts: &mut [u32], cap: u32) {
    let tile = codec.tile_size();
    if seq.len() < tile {
        return;
    }
    let mut i = 0;
    while i + tile <= seq.len() {
        if let Some(key) = codec.encode_head(seq, i) {
            let c = &mut counts[key as usize];
            if *c < cap {
                *c += 1;
            }
        }
        i += step;
    }
}

/// Mark tiles of period one or two (`xxxx`, `xyxy`) as overused.
pub(crate) fn mark_simple_repeats(counts: &mut [u32], codec: &TileCodec, cap: u32) {
    let size = codec.alphabet().size();
    let n = codec.head_size();
    for i in 0..size {
        for j in 0..size {
            let mut key = 0u32;
            for k in 0..n {
                key = key * size + if k & 1 == 1 { j } else { i };
            }
            counts[key as usize] = cap;
        }
    }
}

fn check_total(targets: &[TargetSeq]) -> Result<(), IndexError> {
    if targets.is_empty() || targets.iter().all(|t| t.seq.is_empty()) {
        return Err(IndexError::NoTargets);
    }
    let total: u64 = targets.iter().map(|t| t.seq.len() as u64).sum();
    if total > MAX_TOTAL_BASES {
        return Err(IndexError::TooLarge {
            limit: MAX_TOTAL_BASES,
            total,
        });
    }
    Ok(())
}

/// Build an index over `targets` in order.
pub fn build_index(targets: &[TargetSeq], params: &IndexParams) -> Result<GenomeIndex, IndexError> {
    check_total(targets)?;
    let resolved = params.resolve()?;
    let codec = TileCodec::new(resolved.alphabet, resolved.tile_size, params.mask_upper_flag())?;
    let sources =
        SequenceSourceTable::from_lengths(targets.iter().map(|t| (t.name.as_str(), t.seq.len())))?;

    let layout = if codec.is_segmented() {
        if params.ooc_path().is_some() {
            return Err(IndexError::OocOnSegmented(resolved.tile_size));
        }
        TileLayout::Segmented(build_segmented(targets, &codec, resolved.step_size))
    } else {
        let premarked = match params.ooc_path() {
            Some(path) => read_ooc(path, resolved.tile_size)?,
            None => Vec::new(),
        };
        TileLayout::Direct(build_direct(
            targets,
            &codec,
            &resolved,
            &premarked,
            params.mask_simple_repeats || resolved.alphabet == Alphabet::Protein,
        ))
    };

    let index = GenomeIndex::from_parts(resolved, codec, layout, sources);
    info!(
        "Indexed {} {} sequences ({} positions): {} postings, {} overused tiles",
        index.sources().len(),
        index.params().alphabet.name(),
        index.total_size(),
        index.posting_count(),
        index.overused_count()
    );
    Ok(index)
}

fn build_direct(
    targets: &[TargetSeq],
    codec: &TileCodec,
    params: &SearchParams,
    premarked: &[u32],
    mask_repeats: bool,
) -> DirectLayout {
    let space = codec.head_space();
    let step = params.step_size;
    // One past the threshold flags overuse.
    let cap = params.rep_match.saturating_add(1);

    let mut counts = vec![0u32; space];
    if mask_repeats {
        mark_simple_repeats(&mut counts, codec, cap);
    }
    for &key in premarked {
        if let Some(c) = counts.get_mut(key as usize) {
            *c = cap;
        }
    }
    for t in targets {
        debug!("Counting tiles in {}", t.name);
        count_tiles(codec, &t.seq, step, &mut counts, cap);
    }

    // Allocate: prefix sums over non-overused tiles.
    let mut overused = vec![0u64; space.div_ceil(64)];
    let mut starts = Vec::with_capacity(space + 1);
    let mut total: u32 = 0;
    for (key, &c) in counts.iter().enumerate() {
        starts.push(total);
        if c > params.rep_match {
            overused[key / 64] |= 1 << (key % 64);
        } else {
            total += c;
        }
    }
    starts.push(total);
    let mut postings = vec![0u32; total as usize];

    // Fill.
    let mut cursor: Vec<u32> = starts[..space].to_vec();
    let tile = codec.tile_size();
    let mut offset: u32 = 0;
    for t in targets {
        debug!("Adding tiles in {}", t.name);
        let seq = &t.seq;
        let mut i = 0;
        while i + tile <= seq.len() {
            if let Some(key) = codec.encode(seq, i) {
                let k = key as usize;
                if counts[k] <= params.rep_match {
                    postings[cursor[k] as usize] = offset + i as u32;
                    cursor[k] += 1;
                }
            }
            i += step;
        }
        offset += seq.len() as u32;
    }
    DirectLayout::new(starts, postings, overused)
}

fn build_segmented(targets: &[TargetSeq], codec: &TileCodec, step: usize) -> SegmentedLayout {
    let space = codec.head_space();
    let tile = codec.tile_size();

    // Count whole tiles per head; a head alone can be valid while the tail is not.
    let mut counts = vec![0u32; space];
    for t in targets {
        let seq = &t.seq;
        let mut i = 0;
        while i + tile <= seq.len() {
            if let (Some(head), Some(_)) = (codec.encode_head(seq, i), codec.encode_tail(seq, i)) {
                counts[head as usize] += 1;
            }
            i += step;
        }
    }

    let mut starts = Vec::with_capacity(space + 1);
    let mut total: u32 = 0;
    for &c in &counts {
        starts.push(total);
        total += c;
    }
    starts.push(total);

    let mut postings = vec![TailPosting { tail: 0, offset: 0 }; total as usize];
    let mut cursor: Vec<u32> = starts[..space].to_vec();
    let mut offset: u32 = 0;
    for t in targets {
        let seq = &t.seq;
        let mut i = 0;
        while i + tile <= seq.len() {
            if let (Some(head), Some(tail)) = (codec.encode_head(seq, i), codec.encode_tail(seq, i))
            {
                let h = head as usize;
                postings[cursor[h] as usize] = TailPosting {
                    tail: tail as u16,
                    offset: offset + i as u32,
                };
                cursor[h] += 1;
            }
            i += step;
        }
        offset += seq.len() as u32;
    }
    SegmentedLayout::new(starts, postings)
}

/// Build the six-frame translated index over DNA `targets`.
///
/// Each `(strand, frame)` pair gets its own protein index, built in parallel.
/// Source names match `targets`; coordinates are in amino acids of that frame.
pub fn build_translated_index(
    targets: &[TargetSeq],
    params: &IndexParams,
) -> Result<TranslatedIndex, IndexError> {
    check_total(targets)?;
    let params = params.clone().with_alphabet(Alphabet::Protein);
    params.resolve()?;

    // frames[strand][frame] target lists
    let per_frame: Vec<Vec<Vec<TargetSeq>>> = [false, true]
        .iter()
        .map(|&rc| {
            let mut frames: Vec<Vec<TargetSeq>> = vec![Vec::new(), Vec::new(), Vec::new()];
            for t in targets {
                let dna = if rc {
                    reverse_complement(&t.seq)
                } else {
                    t.seq.clone()
                };
                for (f, pep) in translate_frames(&dna).into_iter().enumerate() {
                    frames[f].push(TargetSeq::new(t.name.clone(), pep));
                }
            }
            frames
        })
        .collect();

    let jobs: Vec<(usize, usize, &Vec<TargetSeq>)> = per_frame
        .iter()
        .enumerate()
        .flat_map(|(s, row)| row.iter().enumerate().map(move |(f, ts)| (s, f, ts)))
        .collect();

    let mut built: Vec<(usize, usize, GenomeIndex)> = jobs
        .into_par_iter()
        .map(|(s, f, ts)| build_frame(ts, &params).map(|gf| (s, f, gf)))
        .collect::<Result<_, _>>()?;
    built.sort_by_key(|(s, f, _)| (*s, *f));

    let mut it = built.into_iter().map(|(_, _, gf)| gf);
    let mut next = || it.next().ok_or(IndexError::NoTargets);
    let frames = [
        [next()?, next()?, next()?],
        [next()?, next()?, next()?],
    ];
    let dna_sizes = targets.iter().map(|t| t.seq.len() as u32).collect();
    info!("Built translated index over {} targets", targets.len());
    Ok(TranslatedIndex::new(frames, dna_sizes))
}

/// A frame of a short target can translate to nothing; still index the rest.
fn build_frame(targets: &[TargetSeq], params: &IndexParams) -> Result<GenomeIndex, IndexError> {
    if targets.iter().all(|t| t.seq.is_empty()) {
        let resolved = params.resolve()?;
        let codec = TileCodec::new(resolved.alphabet, resolved.tile_size, false)?;
        let sources = SequenceSourceTable::from_lengths(
            targets.iter().map(|t| (t.name.as_str(), t.seq.len())),
        )?;
        let space = codec.head_space();
        let layout = if codec.is_segmented() {
            TileLayout::Segmented(SegmentedLayout::new(vec![0; space + 1], Vec::new()))
        } else {
            TileLayout::Direct(DirectLayout::new(
                vec![0; space + 1],
                Vec::new(),
                vec![0; space.div_ceil(64)],
            ))
        };
        return Ok(GenomeIndex::from_parts(resolved, codec, layout, sources));
    }
    build_index(targets, params)
}
