//! Host extraction shared by the interleaver, the per-host semaphore pool,
//! and the record writer.
//!
//! Grounded on the crawl engine's `extract_domain`. Two flavors are exposed:
//! [`normalize`] (lowercased, `www.`-stripped, port dropped) for anything
//! that buckets URLs together — the interleaver's host-fairness guarantee
//! and the per-host semaphore key both depend on two URLs differing only by
//! scheme, case, or a leading `www.` bucketing identically — and
//! [`raw_authority`] (case and port preserved, as received) for the `host`
//! field stored on success/failure records, which the data model specifies
//! as "the authority component of the URL as received".

use url::Url;

/// Bucket used for URLs whose host can't be determined at all. Keeping it
/// a stable non-empty sentinel rather than the empty string means it still
/// sorts and hashes predictably alongside real hosts.
pub const UNKNOWN_HOST: &str = "(unknown)";

/// Extract and normalize the host bucket for `url_str`.
///
/// Never fails: a URL that can't be parsed, or has no host, buckets into
/// [`UNKNOWN_HOST`] rather than being rejected here — malformed-URL
/// handling is the fetcher's job (C5), not the host bucketer's.
///
/// For bucketing/limiting only — do not use this for a stored record's
/// `host` field; use [`raw_authority`] there.
#[must_use]
pub fn normalize(url_str: &str) -> String {
    let Ok(parsed) = Url::parse(url_str) else {
        return UNKNOWN_HOST.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return UNKNOWN_HOST.to_string();
    };
    let lower = host.to_ascii_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

/// Extract the authority component of `url_str` exactly as received: case
/// and an explicit port are preserved, no `www.` stripping. This is what
/// success/failure records store as `host`.
///
/// Never fails: a URL that can't be parsed, or has no host, falls back to
/// [`UNKNOWN_HOST`].
#[must_use]
pub fn raw_authority(url_str: &str) -> String {
    let Ok(parsed) = Url::parse(url_str) else {
        return UNKNOWN_HOST.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return UNKNOWN_HOST.to_string();
    };
    match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
