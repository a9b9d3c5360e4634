//! Retry classifier (C6): maps a fetch outcome's HTTP status to a decision.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    TerminalFail,
    Success,
}

/// Classify `(status, attempt)` per the fixed status-code table. `status`
/// is `None` when the fetcher observed no response at all (timeout, DNS,
/// TLS, connection reset). `attempt` gates whether a `Retry` decision is
/// actually honored: once `attempt >= max_retries` the task is terminal
/// regardless of status.
#[must_use]
pub fn classify(ok: bool, status: Option<u16>, attempt: u32, max_retries: u32) -> Decision {
    if ok {
        return Decision::Success;
    }

    let wants_retry = match status {
        None => true,
        Some(s) if matches!(s, 400 | 401 | 403 | 404 | 410 | 451) => false,
        Some(s) if matches!(s, 408 | 425 | 429) => true,
        Some(s) if (500..=504).contains(&s) => true,
        Some(s) if (521..=526).contains(&s) => true,
        Some(_) => false,
    };

    if wants_retry && attempt < max_retries {
        Decision::Retry
    } else {
        Decision::TerminalFail
    }
}
