//! Deterministic seeded sampler for "random" pagination
//!
//! A caller-supplied seed selects a reproducible pseudorandom ordering
//! of row numbers. The same seed yields a bit-identical draw stream on
//! every call and on every process, which is the whole contract: two
//! clients paging through the same seed see the same pages.
//!
//! Pagination works by discarding draws. Page N+1 reseeds the stream
//! and skips exactly `offset` draws, picking up where page N left off.
//! Cost is therefore linear in `offset`; acceptable for bounded
//! offsets.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// Draw `limit` distinct row numbers in `[1, population]` (or
/// `[1, limit]` when the population is smaller, so the draw loop always
/// terminates with enough distinct values).
///
/// Seed 0 is reserved by the caller to mean natural storage order and
/// must not reach the sampler. Duplicate draws are discarded and
/// redrawn; the returned order is draw order.
pub fn sample(seed: u64, limit: usize, offset: usize, population: i64) -> Vec<i64> {
    let range = population.max(limit as i64);
    if limit == 0 || range == 0 {
        return Vec::new();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for _ in 0..offset {
        let _: f64 = rng.gen();
    }

    let mut seen = HashSet::with_capacity(limit);
    let mut row_nums = Vec::with_capacity(limit);
    while row_nums.len() < limit {
        let draw: f64 = rng.gen();
        // gen::<f64>() is [0, 1), so row_num is in [1, range]
        let row_num = (draw * range as f64) as i64 + 1;
        if seen.insert(row_num) {
            row_nums.push(row_num);
        }
    }
    row_nums
}
