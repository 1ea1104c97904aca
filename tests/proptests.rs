use proptest::prelude::*;
use std::collections::HashMap;
use tilefind::*;

/// Aligned windows of every target, counted naively: key -> concatenated offsets.
fn naive_postings(targets: &[Vec<u8>], tile: usize, step: usize) -> HashMap<Vec<u8>, Vec<u32>> {
    let mut h = HashMap::<Vec<u8>, Vec<u32>>::new();
    let mut base = 0u32;
    for seq in targets {
        let mut i = 0;
        while i + tile <= seq.len() {
            let w = &seq[i..i + tile];
            if w.iter().all(|b| b"acgt".contains(b)) {
                h.entry(w.to_vec()).or_default().push(base + i as u32);
            }
            i += step;
        }
        base += seq.len() as u32;
    }
    h
}

fn targets_of(seqs: &[Vec<u8>]) -> Vec<TargetSeq> {
    seqs.iter()
        .enumerate()
        .map(|(i, s)| TargetSeq::new(format!("t{i}"), s.clone()))
        .collect()
}

fn dna_strategy(alphabet: &'static [u8]) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(alphabet.to_vec()), 0..300),
        1..4,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Every aligned valid window is posted exactly once and maps back to its source.
    #[test]
    fn prop_postings_cover_aligned_tiles(
        tile in 6usize..=9,
        step_off in 0usize..9,
        seqs in dna_strategy(b"acgtn"),
    ) {
        prop_assume!(seqs.iter().any(|s| !s.is_empty()));
        let step = 1 + step_off % tile;
        let params = IndexParams::dna()
            .tile_size(tile)
            .step_size(step)
            .rep_match(u32::MAX)
            .mask_simple_repeats(false);
        let index = build_index(&targets_of(&seqs), &params).unwrap();

        let expected = naive_postings(&seqs, tile, step);
        let mut total = 0;
        for (window, offsets) in &expected {
            prop_assert_eq!(&index.tile_postings(window), offsets);
            total += offsets.len();
            for &p in offsets {
                let (id, local) = index.sources().locate(p).unwrap();
                prop_assert_eq!(&seqs[id][local as usize..local as usize + tile], &window[..]);
            }
        }
        prop_assert_eq!(index.posting_count(), total);
    }

    // A tile seen more than rep_match times has no postings; otherwise all of them.
    #[test]
    fn prop_overused_tiles_are_dropped_whole(
        rep in 1u32..5,
        seqs in dna_strategy(b"ac"),
    ) {
        prop_assume!(seqs.iter().any(|s| !s.is_empty()));
        let params = IndexParams::dna()
            .tile_size(6)
            .step_size(2)
            .rep_match(rep)
            .mask_simple_repeats(false);
        let index = build_index(&targets_of(&seqs), &params).unwrap();

        for (window, offsets) in naive_postings(&seqs, 6, 2) {
            let got = index.tile_postings(&window);
            if offsets.len() as u32 > rep {
                prop_assert!(got.is_empty());
                prop_assert!(index.is_overused(&window));
            } else {
                prop_assert_eq!(got, offsets);
                prop_assert!(!index.is_overused(&window));
            }
        }
    }

    // Clumps stay inside one source, bound their hits, and meet min_match.
    #[test]
    fn prop_clumps_are_bounded(
        seed in any::<u64>(),
        start in 0usize..400,
        len in 20usize..200,
        min_match in 1usize..4,
        mutations in prop::collection::vec(0usize..200, 0..6),
    ) {
        let seqs = vec![random_dna(600, seed), random_dna(500, seed ^ 0xabcdef)];
        let params = IndexParams::dna().step_size(5).min_match(min_match);
        let index = build_index(&targets_of(&seqs), &params).unwrap();

        let joined: Vec<u8> = seqs.concat();
        let mut query = joined[start..(start + len).min(joined.len())].to_vec();
        for m in mutations {
            if let Some(b) = query.get_mut(m) {
                *b = if *b == b'a' { b'c' } else { b'a' };
            }
        }

        let mut budget = SearchBudget::unlimited();
        let clumps = find_clumps(&index, &query, &mut budget).unwrap();
        let tile = index.tile_size() as u32;
        for c in &clumps {
            let src = index.sources().get(c.source).unwrap();
            prop_assert!(c.hit_count >= min_match);
            prop_assert_eq!(c.hit_count, c.hits.len());
            prop_assert!(c.q_end as usize <= query.len());
            prop_assert!(c.t_start >= src.start && c.t_end <= src.end);
            for h in &c.hits {
                prop_assert!(src.contains(h.t_start));
                prop_assert!(c.q_start <= h.q_start && h.q_start + tile <= c.q_end);
                prop_assert!(c.t_start <= h.t_start && h.t_start + tile <= c.t_end);
            }
            prop_assert_eq!(c.hits.iter().map(|h| h.t_start).min(), Some(c.t_start));
            prop_assert_eq!(c.hits.iter().map(|h| h.t_start).max(), Some(c.t_end - tile));
        }

        // Same inputs, same answer.
        let again = find_clumps(&index, &query, &mut SearchBudget::unlimited()).unwrap();
        prop_assert_eq!(clumps, again);
    }

    // Clumps come out best first.
    #[test]
    fn prop_clumps_sorted_by_hit_count(seed in any::<u64>()) {
        let target = random_dna(3000, seed);
        let index = build_index(&[TargetSeq::new("t", target.clone())], &IndexParams::dna().step_size(3))
            .unwrap();
        // two copies of different pieces with a junk spacer
        let mut query = target[100..260].to_vec();
        query.extend_from_slice(&random_dna(40, seed.wrapping_add(1)));
        query.extend_from_slice(&target[2000..2060]);
        let clumps = find_clumps(&index, &query, &mut SearchBudget::unlimited()).unwrap();
        for pair in clumps.windows(2) {
            prop_assert!(pair[0].hit_count >= pair[1].hit_count);
        }
    }

    #[test]
    fn prop_radix_sort_matches_stable_sort(
        diags in prop::collection::vec(any::<u64>(), 0..200),
    ) {
        let mut hits: Vec<Hit> = diags
            .iter()
            .enumerate()
            .map(|(i, &d)| Hit { q_start: i as u32, t_start: 0, diagonal: d })
            .collect();
        let mut expected = hits.clone();
        expected.sort_by_key(|h| h.diagonal);
        sort_by_diagonal(&mut hits, &mut Vec::new());
        prop_assert_eq!(hits, expected);
    }
}

fn random_dna(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"acgt"[((state >> 33) & 3) as usize]
        })
        .collect()
}
