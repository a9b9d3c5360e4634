//! Fetcher (C5): one HTTP attempt per call, returning `(ok, status, payload)`
//! rather than propagating transport errors — a failed fetch is data for
//! the classifier (C6), not a `CrawlError`.

use std::time::Duration;

use async_trait::async_trait;

const SOFT_404_MARKERS: [&str; 2] = ["404 Not Found", "<title>404"];

#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Len(usize),
    Empty,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub ok: bool,
    pub status: Option<u16>,
    pub payload: Payload,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Real fetcher backed by `reqwest`.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    light_mode: bool,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, light_mode: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
            )
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;
        Ok(Self { client, light_mode })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(_) => {
                return FetchOutcome {
                    ok: false,
                    status: None,
                    payload: Payload::Empty,
                };
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(_) => {
                return FetchOutcome {
                    ok: false,
                    status: None,
                    payload: Payload::Empty,
                };
            }
        };

        let looks_404 = status < 400
            && SOFT_404_MARKERS
                .iter()
                .any(|marker| body_contains(&body, marker));
        let ok = status < 400 && !looks_404;

        if !ok {
            return FetchOutcome {
                ok: false,
                status: Some(status),
                payload: Payload::Empty,
            };
        }

        if self.light_mode {
            FetchOutcome {
                ok: true,
                status: Some(status),
                payload: Payload::Len(body.len()),
            }
        } else {
            let text = decode_body(&body, content_type.as_deref());
            FetchOutcome {
                ok: true,
                status: Some(status),
                payload: Payload::Text(text),
            }
        }
    }
}

fn body_contains(body: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    body.windows(needle.len()).any(|w| w == needle)
}

/// Decode `body` using the charset advertised in a `Content-Type` header, or
/// `utf-8` when none is present or recognized. Never raises: malformed byte
/// sequences are replaced, matching §4.4's "decoding errors are replaced, not
/// raised".
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .find_map(|param| param.trim().strip_prefix("charset="))
        .map(|v| v.trim_matches('"'))
}

pub mod stub {
    //! Scripted `Fetcher` for end-to-end tests: replays a fixed outcome
    //! sequence per URL, repeating the last outcome once the script is
    //! exhausted. Plain `pub`, not `#[cfg(test)]`, so integration tests in
    //! `tests/` can use it.
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    pub struct ScriptedFetcher {
        scripts: Mutex<HashMap<String, Vec<FetchOutcome>>>,
    }

    impl ScriptedFetcher {
        #[must_use]
        pub fn new(scripts: HashMap<String, Vec<FetchOutcome>>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
            }
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> FetchOutcome {
            let mut scripts = self.scripts.lock().await;
            let Some(script) = scripts.get_mut(url) else {
                return FetchOutcome {
                    ok: false,
                    status: None,
                    payload: Payload::Empty,
                };
            };
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }
}
