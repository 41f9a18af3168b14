//! Asynchronous URL archiving.
//!
//! Fetches a list of URLs with a bounded number of in-flight requests
//! on a single-threaded cooperative loop, and archives 200-responses
//! as WARC `response` records carrying the original headers. Other
//! statuses are counted but not archived. Timeouts and connection
//! errors are retried with exponential backoff; anything else fails
//! the URL immediately.
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, StreamExt};
use log::{debug, error, info, warn};
use reqwest::Client;
use tokio::time::sleep;

use crate::error::Error;
use crate::io::writer::response_sink;

/// In-flight request ceiling.
pub const TOTAL_CONCURRENT_REQUESTS: usize = 32;
/// Whole-request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Connection establishment deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Attempts per URL, first try included.
const MAX_ATTEMPTS: u32 = 3;

/// Everything a fetch produced, error included.
#[derive(Debug)]
pub struct FetchResult {
    pub url: String,
    pub status: Option<u16>,
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub content: Bytes,
    pub error: Option<String>,
}

impl FetchResult {
    fn failure(url: String, error: String) -> Self {
        Self {
            url,
            status: None,
            status_line: String::new(),
            headers: Vec::new(),
            content: Bytes::new(),
            error: Some(error),
        }
    }
}

/// Tally of a fetch run.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Fetcher {
    urls: Vec<String>,
    concurrent: usize,
}

impl Fetcher {
    /// Read URLs from a file, one per line. Blank lines and `#`
    /// comments are skipped.
    pub fn from_urls_file(path: &Path, concurrent: usize) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let urls: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();

        debug!("got {} urls from {:?}", urls.len(), path);
        Ok(Self { urls, concurrent })
    }

    /// Fetch one URL, retrying timeouts and connection failures with
    /// `1s * 2^attempt` backoff. Invalid URLs fail without retrying.
    async fn fetch(client: &Client, url: String) -> FetchResult {
        if let Err(e) = url::Url::parse(&url) {
            return FetchResult::failure(url, format!("invalid url: {}", e));
        }

        let mut attempt = 0u32;
        loop {
            match client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers: Vec<(String, String)> = response
                        .headers()
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.to_string(),
                                String::from_utf8_lossy(value.as_bytes()).into_owned(),
                            )
                        })
                        .collect();

                    match response.bytes().await {
                        Ok(content) => {
                            return FetchResult {
                                url,
                                status: Some(status.as_u16()),
                                status_line: format!(
                                    "{} {}",
                                    status.as_u16(),
                                    status.canonical_reason().unwrap_or("")
                                )
                                .trim()
                                .to_string(),
                                headers,
                                content,
                                error: None,
                            };
                        }
                        Err(e) if e.is_timeout() && attempt + 1 < MAX_ATTEMPTS => {
                            let backoff = Duration::from_secs(1 << attempt);
                            warn!("retrying {} in {:?}: {}", url, backoff, e);
                            sleep(backoff).await;
                            attempt += 1;
                        }
                        Err(e) => return FetchResult::failure(url, e.to_string()),
                    }
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt + 1 < MAX_ATTEMPTS => {
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!("retrying {} in {:?}: {}", url, backoff, e);
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return FetchResult::failure(url, e.to_string()),
            }
        }
    }

    /// Drain every URL through the bounded in-flight set, writing
    /// archived responses as they complete. The sink is the single
    /// writer of the output file.
    pub async fn run(&self, dst: &Path) -> Result<FetchReport, Error> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let mut sink = response_sink(dst)?;
        let mut report = FetchReport::default();

        // clone client per task to share its connection pool
        let mut results = stream::iter(self.urls.iter().cloned().map(|url| {
            let client = client.clone();
            async move { Self::fetch(&client, url).await }
        }))
        .buffer_unordered(self.concurrent);

        while let Some(result) = results.next().await {
            if let Some(e) = &result.error {
                error!("failed to fetch {}: {}", result.url, e);
                report.failed += 1;
                continue;
            }
            match result.status {
                Some(200) => {
                    sink.write(
                        &result.url,
                        &result.status_line,
                        &result.headers,
                        &result.content,
                    )?;
                    report.archived += 1;
                }
                status => {
                    warn!("non-200 status for {}: {:?}", result.url, status);
                    report.skipped += 1;
                }
            }
        }

        info!(
            "archived {}/{} urls ({} non-200, {} failed)",
            report.archived,
            self.urls.len(),
            report.skipped,
            report.failed
        );
        Ok(report)
    }
}
