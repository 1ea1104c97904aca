mod common;

use common::*;
use std::io::Write;
use tempfile::tempdir;
use tilefind::ooc::*;
use tilefind::*;

#[test]
fn test_ooc_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("11.ooc");
    let keys = vec![3u32, 17, 4_000_000];
    OocWriter::new(&keys, 11).write_to(&path).unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 + 3 * 4);
    assert_eq!(read_ooc(&path, 11).unwrap(), keys);
}

#[test]
fn test_ooc_other_byte_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("swapped.ooc");
    let mut f = std::fs::File::create(&path).unwrap();
    for v in [OOC_SIG, 11, 42, 7] {
        f.write_all(&v.swap_bytes().to_ne_bytes()).unwrap();
    }
    drop(f);
    assert_eq!(read_ooc(&path, 11).unwrap(), vec![42, 7]);
}

#[test]
fn test_ooc_rejects_bad_files() {
    let dir = tempdir().unwrap();

    let path = dir.path().join("12.ooc");
    OocWriter::new(&[1, 2], 12).write_to(&path).unwrap();
    assert!(matches!(read_ooc(&path, 11), Err(IndexError::Ooc { .. })));

    let path = dir.path().join("garbage.ooc");
    std::fs::write(&path, b"not an ooc file").unwrap();
    assert!(matches!(read_ooc(&path, 11), Err(IndexError::Ooc { .. })));

    let path = dir.path().join("short.ooc");
    std::fs::write(&path, b"abc").unwrap();
    assert!(matches!(read_ooc(&path, 11), Err(IndexError::Ooc { .. })));

    let path = dir.path().join("ragged.ooc");
    let mut bytes = Vec::new();
    OocHeader { sig: OOC_SIG, tile_size: 11 }.write_to(&mut bytes).unwrap();
    bytes.extend_from_slice(&[1, 2, 3]);
    std::fs::write(&path, bytes).unwrap();
    assert!(matches!(read_ooc(&path, 11), Err(IndexError::Ooc { .. })));

    assert!(matches!(
        read_ooc(&dir.path().join("missing.ooc"), 11),
        Err(IndexError::Io(_))
    ));
}

#[test]
fn test_ooc_premarks_tiles() {
    let target = chr1();
    let tile = &target[55..66];
    let key = TileCodec::new(Alphabet::Dna, 11, false)
        .unwrap()
        .encode(tile, 0)
        .unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("11.ooc");
    OocWriter::new(&[key], 11).write_to(&path).unwrap();

    let plain = chr1_index(&IndexParams::dna());
    assert_eq!(plain.tile_postings(tile), vec![55]);

    let marked = chr1_index(&IndexParams::dna().ooc(&path));
    assert!(marked.tile_postings(tile).is_empty());
    assert!(marked.is_overused(tile));
    assert_eq!(marked.tile_postings(&target[66..77]), vec![66]);
}

#[test]
fn test_ooc_with_wrong_layout_or_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("11.ooc");
    OocWriter::new(&[], 11).write_to(&path).unwrap();

    let one = [TargetSeq::new("chr1", chr1())];
    assert!(matches!(
        build_index(&one, &IndexParams::dna().tile_size(13).ooc(&path)),
        Err(IndexError::OocOnSegmented(13))
    ));
    assert!(matches!(
        build_index(&one, &IndexParams::dna().tile_size(10).ooc(&path)),
        Err(IndexError::Ooc { .. })
    ));
}

#[test]
fn test_make_ooc_counts_repeats() {
    let x = b"acgtacgatcg";
    let mut seq = random_dna(40 * 11, 7);
    for block in [2, 5, 8, 11, 14, 17] {
        seq[block * 11..block * 11 + 11].copy_from_slice(x);
    }
    let lonely = seq[33..44].to_vec();
    let targets = [TargetSeq::new("chr1", seq)];
    let params = IndexParams::dna().rep_match(5);

    let keys = make_ooc(&targets, &params, OocSource::Dna).unwrap();
    let codec = TileCodec::new(Alphabet::Dna, 11, false).unwrap();
    let x_key = codec.encode(x, 0).unwrap();
    assert!(keys.contains(&x_key));
    assert!(!keys.contains(&codec.encode(&lonely, 0).unwrap()));
    assert!(keys.windows(2).all(|w| w[0] < w[1]));

    // a list made at one threshold feeds an index built at a higher one
    let dir = tempdir().unwrap();
    let path = dir.path().join("11.ooc");
    OocWriter::new(&keys, 11).write_to(&path).unwrap();
    let index = build_index(&targets, &IndexParams::dna().rep_match(100).ooc(&path)).unwrap();
    assert!(index.tile_postings(x).is_empty());
    assert_eq!(index.tile_postings(&lonely), vec![33]);

    assert!(matches!(
        make_ooc(&targets, &IndexParams::dna().tile_size(14), OocSource::Dna),
        Err(IndexError::OocOnSegmented(14))
    ));
}

#[test]
fn test_make_ooc_translated() {
    // the same codon run on every frame-0 position
    let dna = b"atgaaacccggg".repeat(40);
    let targets = [TargetSeq::new("chr1", dna)];
    let params = IndexParams::translated().rep_match(5);
    let keys = make_ooc(&targets, &params, OocSource::TranslatedDna).unwrap();
    let codec = TileCodec::new(Alphabet::Protein, 4, false).unwrap();
    assert!(keys.contains(&codec.encode(b"MKPG", 0).unwrap()));

    let prot = [TargetSeq::new("p1", b"MKPG".repeat(40))];
    let keys = make_ooc(&prot, &IndexParams::protein().tile_size(4).rep_match(5), OocSource::Protein)
        .unwrap();
    assert_eq!(keys, vec![codec.encode(b"MKPG", 0).unwrap()]);
}
