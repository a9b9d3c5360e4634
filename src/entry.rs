//! Queue entry codec (C1).
//!
//! Wire format is ASCII text: `"<base_id>#<attempt> <url>"`, with the legacy
//! `"<base_id> <url>"` form (no `#`) read as `attempt = 1` for backward
//! compatibility. Implementations must parse defensively and drop malformed
//! entries rather than error; the legacy form must remain accepted
//! indefinitely (see DESIGN.md).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub base_id: u64,
    pub attempt: u32,
    pub url: String,
}

impl Entry {
    #[must_use]
    pub fn new(base_id: u64, attempt: u32, url: impl Into<String>) -> Self {
        Self {
            base_id,
            attempt,
            url: url.into(),
        }
    }

    /// Re-encode this entry with `attempt + 1`, for the C7 retry path.
    #[must_use]
    pub fn with_next_attempt(&self) -> Self {
        Self {
            base_id: self.base_id,
            attempt: self.attempt + 1,
            url: self.url.clone(),
        }
    }
}

/// Encode `(base_id, attempt, url)` into the wire format.
#[must_use]
pub fn encode(base_id: u64, attempt: u32, url: &str) -> Vec<u8> {
    format!("{base_id}#{attempt} {url}").into_bytes()
}

#[must_use]
pub fn encode_entry(entry: &Entry) -> Vec<u8> {
    encode(entry.base_id, entry.attempt, &entry.url)
}

/// Decode a raw queue item. Returns `None` for anything that doesn't match
/// either the current or legacy positional format — callers drop such
/// entries rather than propagate an error (§7, taxonomy (e)).
#[must_use]
pub fn decode(raw: &[u8]) -> Option<Entry> {
    let text = std::str::from_utf8(raw).ok()?;
    let (head, url) = text.split_once(' ')?;
    if url.is_empty() {
        return None;
    }

    if let Some((base_str, attempt_str)) = head.split_once('#') {
        let base_id: u64 = base_str.parse().ok()?;
        let attempt: u32 = attempt_str.parse().ok()?;
        if attempt == 0 {
            return None;
        }
        Some(Entry::new(base_id, attempt, url))
    } else {
        let base_id: u64 = head.parse().ok()?;
        Some(Entry::new(base_id, 1, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_current_format() {
        let encoded = encode(42, 3, "https://example.com/page");
        let decoded = decode(&encoded).expect("must decode");
        assert_eq!(decoded.base_id, 42);
        assert_eq!(decoded.attempt, 3);
        assert_eq!(decoded.url, "https://example.com/page");
    }

    #[test]
    fn legacy_format_defaults_to_attempt_one() {
        let decoded = decode(b"7 https://example.com").expect("must decode legacy form");
        assert_eq!(decoded.base_id, 7);
        assert_eq!(decoded.attempt, 1);
        assert_eq!(decoded.url, "https://example.com");
    }

    #[test]
    fn url_may_contain_spaces() {
        let encoded = encode(1, 1, "https://example.com/a b c");
        let decoded = decode(&encoded).expect("must decode");
        assert_eq!(decoded.url, "https://example.com/a b c");
    }

    #[test]
    fn malformed_entries_are_dropped() {
        assert!(decode(b"not-a-valid-entry").is_none());
        assert!(decode(b"abc 1 https://example.com").is_none());
        assert!(decode(b"1#0 https://example.com").is_none());
        assert!(decode(b"").is_none());
        assert!(decode(b"5").is_none());
    }

    #[test]
    fn with_next_attempt_increments_only_attempt() {
        let entry = Entry::new(1, 1, "https://example.com");
        let next = entry.with_next_attempt();
        assert_eq!(next.base_id, 1);
        assert_eq!(next.attempt, 2);
        assert_eq!(next.url, entry.url);
    }
}
