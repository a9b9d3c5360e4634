//! Shard router (C8): picks the target document-store database for a task id.

/// Compute the shard index for `task_id` under `threshold`.
///
/// A plain numeric id shards by `id / threshold`. A run-prefixed id
/// (`"<run>-<base_id>"`) shards by the numeric suffix after the first `-`,
/// so ids from the same run land across shards exactly as bare ids would.
#[must_use]
pub fn shard_index(task_id: &str, threshold: u64) -> u64 {
    let numeric = match task_id.split_once('-') {
        Some((_, suffix)) => suffix,
        None => task_id,
    };
    let id: u64 = numeric.parse().unwrap_or(0);
    id / threshold.max(1)
}

/// Compute the full shard database name for `task_id`.
#[must_use]
pub fn shard_name(task_id: &str, threshold: u64, prefix: &str) -> String {
    format!("{prefix}{}", shard_index(task_id, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ids_shard_by_integer_division() {
        assert_eq!(shard_index("0", 500_000), 0);
        assert_eq!(shard_index("499999", 500_000), 0);
        assert_eq!(shard_index("500000", 500_000), 1);
        assert_eq!(shard_index("999999", 500_000), 1);
    }

    #[test]
    fn run_prefixed_ids_shard_by_suffix() {
        assert_eq!(shard_index("7-500000", 500_000), 1);
        assert_eq!(shard_index("7-1", 500_000), 0);
    }

    #[test]
    fn full_range_uses_exactly_two_shards() {
        let mut seen = std::collections::HashSet::new();
        for id in 0u64..1_000_000 {
            seen.insert(shard_index(&id.to_string(), 500_000));
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn shard_name_applies_prefix() {
        assert_eq!(shard_name("3", 500_000, "crawl_shard_"), "crawl_shard_0");
    }
}
