#![allow(dead_code)]

use tilefind::*;

/// Deterministic pseudo-random nucleotides (lower case).
pub fn random_dna(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"acgt"[((state >> 33) & 3) as usize]
        })
        .collect()
}

/// Substitute one base with a different one.
pub fn mutate(b: u8) -> u8 {
    match b.to_ascii_lowercase() {
        b'a' => b'c',
        b'c' => b'g',
        b'g' => b't',
        _ => b'a',
    }
}

pub fn chr1() -> Vec<u8> {
    random_dna(1000, 1)
}

/// Single 1000-base target named `chr1`.
pub fn chr1_index(params: &IndexParams) -> GenomeIndex {
    build_index(&[TargetSeq::new("chr1", chr1())], params).unwrap()
}

/// Two 1000-base targets, `chrA` then `chrB`.
pub fn two_source_index() -> GenomeIndex {
    let targets = [
        TargetSeq::new("chrA", random_dna(1000, 11)),
        TargetSeq::new("chrB", random_dna(1000, 12)),
    ];
    build_index(&targets, &IndexParams::dna()).unwrap()
}

pub fn clumps(index: &GenomeIndex, query: &[u8]) -> Vec<Clump> {
    find_clumps(index, query, &mut SearchBudget::unlimited()).unwrap()
}

/// Random open reading frame of `codons` codons: frame 0 translates without stops.
pub fn coding_dna(codons: usize, seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(codons * 3);
    let mut pool = random_dna(codons * 6, seed).into_iter();
    while out.len() < codons * 3 {
        let codon: Vec<u8> = pool.by_ref().take(3).collect();
        if codon.len() < 3 {
            pool = random_dna(codons * 6, seed.wrapping_add(out.len() as u64)).into_iter();
            continue;
        }
        if !matches!(&codon[..], b"taa" | b"tag" | b"tga") {
            out.extend_from_slice(&codon);
        }
    }
    out
}
