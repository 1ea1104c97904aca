//! LSD radix sort of hits by a `u64` key.
//! 8-bit passes, only as many as the largest key needs. Stable via counting + prefix sums.

use crate::hits::Hit;

/// Sort `hits` ascending by `key`, keeping equal keys in input order.
/// `scratch` is resized to `hits.len()` and reused across passes.
pub fn radix_sort_hits<F>(hits: &mut [Hit], scratch: &mut Vec<Hit>, key: F)
where
    F: Fn(&Hit) -> u64,
{
    let n = hits.len();
    if n <= 1 {
        return;
    }
    let max = hits.iter().map(&key).max().unwrap_or(0);
    let passes = (u64::BITS - max.leading_zeros()).div_ceil(8);

    scratch.clear();
    scratch.resize(n, Hit::default());

    for pass in 0..passes {
        let shift = pass * 8;
        let mut counts = [0usize; 256];

        // Count occurrences
        for h in hits.iter() {
            counts[((key(h) >> shift) & 0xFF) as usize] += 1;
        }

        // Prefix sums -> positions
        let mut sum = 0usize;
        for c in counts.iter_mut() {
            let tmp = *c;
            *c = sum;
            sum += tmp;
        }

        // Scatter (stable)
        for h in hits.iter() {
            let b = ((key(h) >> shift) & 0xFF) as usize;
            scratch[counts[b]] = *h;
            counts[b] += 1;
        }

        hits.copy_from_slice(scratch);
    }
}

/// Sort by diagonal.
#[inline]
pub fn sort_by_diagonal(hits: &mut [Hit], scratch: &mut Vec<Hit>) {
    radix_sort_hits(hits, scratch, |h| h.diagonal);
}
