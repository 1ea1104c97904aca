mod common;

use common::*;
use tilefind::*;

/// Target with `x` written at six aligned blocks and `y` at five.
fn overuse_target(x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut seq = random_dna(40 * 11, 7);
    for block in [2, 5, 8, 11, 14, 17] {
        seq[block * 11..block * 11 + 11].copy_from_slice(x);
    }
    for block in [20, 23, 26, 29, 32] {
        seq[block * 11..block * 11 + 11].copy_from_slice(y);
    }
    seq
}

#[test]
fn test_overuse_threshold_is_exclusive() {
    let x = b"acgtacgatcg";
    let y = b"ttgcaggctaa";
    let params = IndexParams::dna().step_size(11).rep_match(5);
    let index = build_index(&[TargetSeq::new("chr1", overuse_target(x, y))], &params).unwrap();

    assert!(index.tile_postings(x).is_empty());
    assert!(index.is_overused(x));
    assert_eq!(
        index.tile_postings(y),
        vec![20 * 11, 23 * 11, 26 * 11, 29 * 11, 32 * 11]
    );
    assert!(!index.is_overused(y));
    assert!(index.overused_count() >= 1);
}

#[test]
fn test_postings_locate_back_to_source() {
    let index = two_source_index();
    assert_eq!(index.sources().len(), 2);
    assert_eq!(index.total_size(), 2000);

    let chr_b = random_dna(1000, 12);
    let tile = &chr_b[77..88];
    let postings = index.tile_postings(tile);
    assert_eq!(postings, vec![1077]);
    assert_eq!(index.sources().locate(1077), Some((1, 77)));
}

#[test]
fn test_step_size_samples_target() {
    let target = chr1();
    let index = chr1_index(&IndexParams::dna().step_size(11));
    // aligned
    assert_eq!(index.tile_postings(&target[33..44]), vec![33]);
    // not on the stride
    assert!(index.tile_postings(&target[34..45]).is_empty());

    let dense = chr1_index(&IndexParams::dna().step_size(1));
    assert_eq!(dense.tile_postings(&target[34..45]), vec![34]);
    assert_eq!(dense.params().step_size, 1);
}

#[test]
fn test_simple_repeats_never_indexed() {
    let mut target = random_dna(500, 3);
    target[110..132].copy_from_slice(&[b'a'; 22]);
    target[220..242].copy_from_slice(b"acacacacacacacacacacac");
    let index = build_index(&[TargetSeq::new("chr1", target)], &IndexParams::dna()).unwrap();
    assert!(index.tile_postings(b"aaaaaaaaaaa").is_empty());
    assert!(index.tile_postings(b"acacacacaca").is_empty());

    let unmasked = build_index(
        &[TargetSeq::new("chr1", random_dna(500, 3))],
        &IndexParams::dna().mask_simple_repeats(false),
    )
    .unwrap();
    assert!(!unmasked.is_overused(b"aaaaaaaaaaa"));
}

#[test]
fn test_mask_upper_skips_upper_case() {
    let mut target = chr1();
    target[200..400].make_ascii_uppercase();
    let params = IndexParams::dna().step_size(11).mask_upper(true);
    let index = build_index(&[TargetSeq::new("chr1", target.clone())], &params).unwrap();
    assert!(index.tile_postings(&target[209..220]).is_empty());
    assert_eq!(index.tile_postings(&target[99..110]), vec![99]);

    let plain = build_index(&[TargetSeq::new("chr1", target.clone())], &IndexParams::dna()).unwrap();
    assert_eq!(plain.tile_postings(&target[209..220]), vec![209]);
}

#[test]
fn test_segmented_layout_dna() {
    let target = chr1();
    let index = chr1_index(&IndexParams::dna().tile_size(13).step_size(13));
    assert!(index.is_segmented());
    assert_eq!(index.overused_count(), 0);
    assert_eq!(index.tile_postings(&target[130..143]), vec![130]);
    // head matches, tail does not
    let mut other = target[130..143].to_vec();
    other[12] = mutate(other[12]);
    assert!(index.tile_postings(&other).is_empty());

    let query = &target[260..330];
    let clumps = clumps(&index, query);
    assert_eq!(clumps.len(), 1);
    assert_eq!((clumps[0].t_start, clumps[0].t_end), (260, 325));
}

#[test]
fn test_segmented_layout_protein() {
    let pep: Vec<u8> = random_dna(900, 5)
        .chunks_exact(3)
        .map(tilefind::translate::translate_codon)
        .map(|aa| if aa == b'*' { b'W' } else { aa })
        .collect();
    let params = IndexParams::protein().tile_size(6).step_size(1);
    let index = build_index(&[TargetSeq::new("p1", pep.clone())], &params).unwrap();
    assert!(index.is_segmented());
    assert!(index.tile_postings(&pep[40..46]).contains(&40));

    let clumps = clumps(&index, &pep[100..140]);
    assert_eq!(clumps[0].t_start, 100);
    assert_eq!(clumps[0].t_end, 140);
    assert_eq!(clumps[0].hit_count, 35);
}

#[test]
fn test_build_errors() {
    assert!(matches!(
        build_index(&[], &IndexParams::dna()),
        Err(IndexError::NoTargets)
    ));
    assert!(matches!(
        build_index(&[TargetSeq::new("a", Vec::new())], &IndexParams::dna()),
        Err(IndexError::NoTargets)
    ));
    let targets = [
        TargetSeq::new("a", random_dna(100, 1)),
        TargetSeq::new("a", random_dna(100, 2)),
    ];
    assert!(matches!(
        build_index(&targets, &IndexParams::dna()),
        Err(IndexError::DuplicateSource(_))
    ));
    let one = [TargetSeq::new("a", random_dna(100, 1))];
    assert!(matches!(
        build_index(&one, &IndexParams::dna().tile_size(4)),
        Err(IndexError::BadTileSize { .. })
    ));
    assert!(matches!(
        build_index(&one, &IndexParams::protein().tile_size(9)),
        Err(IndexError::BadTileSize { .. })
    ));
}

#[test]
fn test_default_rep_match_scales_with_step() {
    assert_eq!(default_rep_match(11, 11, Alphabet::Dna), 1024);
    assert_eq!(default_rep_match(12, 6, Alphabet::Dna), 512);
    assert_eq!(default_rep_match(12, 12, Alphabet::Dna), 256);
    assert_eq!(default_rep_match(5, 5, Alphabet::Protein), 1500);
    assert!(default_rep_match(11, 1, Alphabet::Dna) > default_rep_match(11, 11, Alphabet::Dna));
    let p = IndexParams::dna().resolve().unwrap();
    assert_eq!((p.tile_size, p.step_size, p.rep_match), (11, 11, 1024));
    // segmented layouts never filter
    let p = IndexParams::dna().tile_size(15).resolve().unwrap();
    assert_eq!(p.rep_match, u32::MAX);
}

#[test]
fn test_translated_index_frames() {
    let dna = random_dna(600, 21);
    let tindex =
        build_translated_index(&[TargetSeq::new("chr1", dna.clone())], &IndexParams::translated())
            .unwrap();
    assert_eq!(tindex.iter().count(), 6);
    assert_eq!(tindex.dna_size(0), Some(600));
    assert_eq!(tindex.total_bases(), 600);
    assert_eq!(tindex.sources().get(0).unwrap().name, "chr1");
    assert!(tindex.frame(0, 0).is_protein());
    assert_eq!(tindex.frame(0, 1).total_size(), 199);
    assert_eq!(tindex.frame(1, 2).total_size(), 199);

    // a frame-1 peptide on the reverse strand
    let rc = reverse_complement(&dna);
    let pep = tilefind::translate::translate(&rc[1..]);
    let offset = (0..pep.len() - 4)
        .step_by(4)
        .find(|&i| pep[i..i + 4].iter().all(|&a| a != b'*'))
        .unwrap();
    let tile = &pep[offset..offset + 4];
    let gf = tindex.frame(1, 1);
    if !gf.is_overused(tile) {
        assert!(gf.tile_postings(tile).contains(&(offset as u32)));
    }
}
