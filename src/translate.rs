//! Standard-code translation of nucleotide sequence into reading frames.
//!
//! Codons with a base outside ACGT translate to `X`, which the protein tile
//! table treats as invalid, so such windows are never indexed.

use crate::encode::DNA_LUT;

/// Standard genetic code, codons in ACGT order (`AAA`, `AAC`, `AAG`, `AAT`, `ACA`, ...).
const STANDARD_CODE: &[u8; 64] =
    b"KNKNTTTTRSRSIIMIQHQHPPPPRRRRLLLLEDEDAAAAGGGGVVVV*Y*YSSSS*CWCLFLF";

/// Amino acid for one codon.
#[inline]
pub fn translate_codon(codon: &[u8]) -> u8 {
    let mut idx = 0usize;
    for &b in &codon[..3] {
        let v = DNA_LUT[b as usize];
        if v > 3 {
            return b'X';
        }
        idx = idx * 4 + v as usize;
    }
    STANDARD_CODE[idx]
}

/// Translate `dna` from its first base; trailing partial codons are dropped.
pub fn translate(dna: &[u8]) -> Vec<u8> {
    dna.chunks_exact(3).map(translate_codon).collect()
}

/// Translations of frames 0, 1 and 2 of `dna`.
pub fn translate_frames(dna: &[u8]) -> [Vec<u8>; 3] {
    let frame = |f: usize| dna.get(f..).map(translate).unwrap_or_default();
    [frame(0), frame(1), frame(2)]
}
