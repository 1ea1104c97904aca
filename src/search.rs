//! In-process search entry points and query preparation.
//!
//! Every entry point takes a [`SearchBudget`]; the server hands in a bounded one,
//! in-process callers may use [`SearchBudget::unlimited`].

use log::debug;

use crate::budget::SearchBudget;
use crate::clump::{Clump, assemble};
use crate::encode::{AA_LUT, INVALID};
use crate::error::SearchError;
use crate::hits::find_hits;
use crate::index::{GenomeIndex, TranslatedIndex};
use crate::translate::translate_frames;

/// Target strand of a translated clump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_index(i: usize) -> Self {
        if i == 0 { Strand::Forward } else { Strand::Reverse }
    }

    pub fn index(self) -> usize {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Reverse),
            _ => None,
        }
    }
}

/// Clump found in one frame of a [`TranslatedIndex`]. Coordinates are in amino
/// acids of that frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramedClump {
    pub strand: Strand,
    /// Query frame for translated queries, `None` for protein queries.
    pub q_frame: Option<usize>,
    pub t_frame: usize,
    pub clump: Clump,
}

/// Clumps of `query` against a nucleotide or protein index, best first.
pub fn find_clumps(
    index: &GenomeIndex,
    query: &[u8],
    budget: &mut SearchBudget,
) -> Result<Vec<Clump>, SearchError> {
    let hits = find_hits(index, query, budget)?;
    debug!("{} hits for {}-symbol query", hits.len(), query.len());
    assemble(hits, index, budget)
}

/// Clumps of a protein `query` against all six frames of `tindex`.
pub fn find_clumps_translated(
    tindex: &TranslatedIndex,
    protein: &[u8],
    budget: &mut SearchBudget,
) -> Result<Vec<FramedClump>, SearchError> {
    let mut out = Vec::new();
    for (strand, frame, gf) in tindex.iter() {
        for clump in find_clumps(gf, protein, budget)? {
            budget.push(
                &mut out,
                FramedClump {
                    strand: Strand::from_index(strand),
                    q_frame: None,
                    t_frame: frame,
                    clump,
                },
            )?;
        }
    }
    Ok(out)
}

/// Clumps of nucleotide `dna`, translated in three frames, against all six
/// frames of `tindex`. The query is used as given; callers wanting the other
/// query strand reverse-complement and ask again.
pub fn find_clumps_trans_trans(
    tindex: &TranslatedIndex,
    dna: &[u8],
    budget: &mut SearchBudget,
) -> Result<Vec<FramedClump>, SearchError> {
    let q_frames = translate_frames(dna);
    let mut out = Vec::new();
    for (strand, t_frame, gf) in tindex.iter() {
        for (q_frame, pep) in q_frames.iter().enumerate() {
            for clump in find_clumps(gf, pep, budget)? {
                budget.push(
                    &mut out,
                    FramedClump {
                        strand: Strand::from_index(strand),
                        q_frame: Some(q_frame),
                        t_frame,
                        clump,
                    },
                )?;
            }
        }
    }
    Ok(out)
}

// ---- Query preparation ----

/// Normalize nucleotide input: letters lower-cased, `u` → `t`, other letters
/// → `n`, everything else dropped.
pub fn filter_dna(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .filter(|b| b.is_ascii_alphabetic())
        .map(|b| match b.to_ascii_lowercase() {
            b @ (b'a' | b'c' | b'g' | b't') => b,
            b'u' => b't',
            _ => b'n',
        })
        .collect()
}

/// Normalize protein input: letters upper-cased, unknown residues → `X`,
/// everything else dropped.
pub fn filter_protein(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .filter(|b| b.is_ascii_alphabetic())
        .map(|b| {
            let up = b.to_ascii_uppercase();
            if AA_LUT[up as usize] == INVALID {
                b'X'
            } else {
                up
            }
        })
        .collect()
}

/// Truncate `seq` to `max` symbols; true if anything was cut.
pub fn trim_query(seq: &mut Vec<u8>, max: usize) -> bool {
    if seq.len() > max {
        seq.truncate(max);
        true
    } else {
        false
    }
}
