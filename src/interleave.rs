//! Host-fair interleaving of a batch of queue entries (C2).
//!
//! Groups entries by normalized host, then repeatedly draws from a
//! weighted-random bucket (weight `ln(remaining + 1)`) until every bucket is
//! drained. This is the master's defense against one host dominating the
//! head of the queue: a bucket of 10 000 still loses weight as it's drawn
//! down, while a singleton bucket keeps a nonzero chance of being picked
//! every round.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::entry::Entry;
use crate::host::normalize;

/// Number of items pulled from the front of the chosen bucket per round.
pub const DEFAULT_HOST_TAKE_PER_ROUND: usize = 1;

/// Interleave `entries` using a freshly seeded RNG (not reproducible; use
/// [`interleave_seeded`] in tests).
#[must_use]
pub fn interleave(entries: Vec<Entry>, host_take_per_round: usize) -> Vec<Entry> {
    let mut rng = StdRng::from_os_rng();
    interleave_with(entries, host_take_per_round, &mut rng)
}

/// Interleave `entries` deterministically from `seed`, for reproducible
/// tests and for any caller that wants repeatable ordering across runs.
#[must_use]
pub fn interleave_seeded(entries: Vec<Entry>, host_take_per_round: usize, seed: u64) -> Vec<Entry> {
    let mut rng = StdRng::seed_from_u64(seed);
    interleave_with(entries, host_take_per_round, &mut rng)
}

fn interleave_with(entries: Vec<Entry>, host_take_per_round: usize, rng: &mut StdRng) -> Vec<Entry> {
    let take = host_take_per_round.max(1);
    let total = entries.len();

    // Stable per-bucket order: a VecDeque per host, buckets walked in
    // first-seen order only for building the weight vector, not for draws.
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, std::collections::VecDeque<Entry>> = HashMap::new();
    for entry in entries {
        let host = normalize(&entry.url);
        if !buckets.contains_key(&host) {
            order.push(host.clone());
        }
        buckets.entry(host).or_default().push_back(entry);
    }

    let mut out = Vec::with_capacity(total);
    let mut live: Vec<String> = order.into_iter().filter(|h| !buckets[h].is_empty()).collect();

    while !live.is_empty() {
        let weights: Vec<f64> = live
            .iter()
            .map(|h| ((buckets[h].len() as f64) + 1.0).ln())
            .collect();
        let total_weight: f64 = weights.iter().sum();
        let pick = if total_weight <= 0.0 {
            0
        } else {
            let mut r: f64 = rng.random_range(0.0..total_weight);
            let mut idx = live.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if r < *w {
                    idx = i;
                    break;
                }
                r -= w;
            }
            idx
        };

        let host = &live[pick];
        let bucket = buckets.get_mut(host).expect("bucket must exist for live host");
        for _ in 0..take {
            match bucket.pop_front() {
                Some(entry) => out.push(entry),
                None => break,
            }
        }
        if bucket.is_empty() {
            live.remove(pick);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_for(host: &str, count: usize, start_id: u64) -> Vec<Entry> {
        (0..count)
            .map(|i| Entry::new(start_id + i as u64, 1, format!("https://{host}/p{i}")))
            .collect()
    }

    #[test]
    fn preserves_multiset_and_length() {
        let mut input = entries_for("a.com", 5, 0);
        input.extend(entries_for("b.com", 3, 100));
        let out = interleave_seeded(input.clone(), 1, 42);
        assert_eq!(out.len(), input.len());

        let mut in_ids: Vec<u64> = input.iter().map(|e| e.base_id).collect();
        let mut out_ids: Vec<u64> = out.iter().map(|e| e.base_id).collect();
        in_ids.sort_unstable();
        out_ids.sort_unstable();
        assert_eq!(in_ids, out_ids);
    }

    #[test]
    fn preserves_intra_host_order() {
        let mut input = entries_for("a.com", 5, 0);
        input.extend(entries_for("b.com", 4, 100));
        let out = interleave_seeded(input.clone(), 1, 7);

        let a_expected: Vec<u64> = input
            .iter()
            .filter(|e| e.url.contains("a.com"))
            .map(|e| e.base_id)
            .collect();
        let a_actual: Vec<u64> = out
            .iter()
            .filter(|e| e.url.contains("a.com"))
            .map(|e| e.base_id)
            .collect();
        assert_eq!(a_expected, a_actual);
    }

    #[test]
    fn same_seed_same_input_is_deterministic() {
        let input = {
            let mut v = entries_for("a.com", 10, 0);
            v.extend(entries_for("b.com", 10, 100));
            v
        };
        let out1 = interleave_seeded(input.clone(), 1, 99);
        let out2 = interleave_seeded(input, 1, 99);
        assert_eq!(out1, out2);
    }

    #[test]
    fn small_bucket_appears_in_early_prefix_against_large_one() {
        let mut input = entries_for("rare.com", 1, 0);
        input.extend(entries_for("common.com", 1000, 1));
        let out = interleave_seeded(input, 1, 12345);
        let prefix_has_rare = out.iter().take(50).any(|e| e.url.contains("rare.com"));
        assert!(prefix_has_rare, "rare host must surface in the first 50");
    }
}
