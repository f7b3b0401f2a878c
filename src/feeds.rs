//! Feed Providers
//!
//! Supply the three raw explorer feeds for a wallet:
//! - `JsonDirFeed`: `txlist.json`, `tokentx.json`, `txlistinternal.json` in a directory
//! - `ExplorerClient`: Etherscan-compatible HTTP API with an optional SQLite response cache
//!
//! ## Explorer endpoint
//! `GET https://api.<endpoint>/api?module=account&action=<action>&address=<wallet>
//! &startblock=<n>&endblock=99999999&page=1&offset=10000&sort=desc&apikey=<key>`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::Feed;
use crate::models::{ExplorerResponse, RawInternalTransfer, RawTokenTransfer, RawTransaction};
use crate::persistence::{write_json, ResponseCache, DEFAULT_CACHE_TTL};

pub const END_BLOCK: u64 = 99_999_999;
pub const PAGE_SIZE: u32 = 10_000;

/// The three raw feeds of one wallet
#[derive(Debug, Clone, Default)]
pub struct FeedSet {
    pub transactions: Vec<RawTransaction>,
    pub token_transfers: Vec<RawTokenTransfer>,
    pub internal_transfers: Vec<RawInternalTransfer>,
}

/// Source of raw feeds. Token and internal feeds may be empty; an unusable
/// transaction feed must be an error.
pub trait FeedProvider {
    fn fetch(&self, wallet: &str, start_block: u64) -> Result<FeedSet>;
}

impl Feed {
    /// File the feed is saved under in a `JsonDirFeed` directory
    pub fn file_name(&self) -> String {
        format!("{}.json", self.action())
    }
}

/// Rows of an explorer body; accepts the full envelope or a bare array.
/// An error envelope (rate limit, invalid key) fails instead of reading as empty.
fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    let value: serde_json::Value = serde_json::from_str(body).context("Invalid JSON")?;
    if value.is_array() {
        return serde_json::from_value(value).context("Failed to parse feed rows");
    }

    let response: ExplorerResponse =
        serde_json::from_value(value).context("Failed to parse explorer response")?;
    if let Some(message) = response.error_message() {
        bail!("Explorer API error: {}", message);
    }
    response.into_rows().context("Failed to parse feed rows")
}

// ============================================================================
// Directory of JSON files
// ============================================================================

/// Feeds previously saved as JSON files in one directory
#[derive(Debug, Clone)]
pub struct JsonDirFeed {
    dir: PathBuf,
}

impl JsonDirFeed {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_feed<T: DeserializeOwned>(&self, feed: Feed, required: bool) -> Result<Vec<T>> {
        let path = self.dir.join(feed.file_name());
        if !path.exists() {
            if required {
                bail!("Feed file {} not found", path.display());
            }
            debug!(path = %path.display(), "Optional feed file missing, using empty feed");
            return Ok(Vec::new());
        }

        let body = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_rows(&body).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Save `feeds` as bare JSON arrays, one file per feed
    pub fn save(&self, feeds: &FeedSet) -> Result<()> {
        write_json(self.dir.join(Feed::Transactions.file_name()), &feeds.transactions)?;
        write_json(self.dir.join(Feed::TokenTransfers.file_name()), &feeds.token_transfers)?;
        write_json(self.dir.join(Feed::InternalTransfers.file_name()), &feeds.internal_transfers)?;
        Ok(())
    }
}

impl FeedProvider for JsonDirFeed {
    /// The directory holds a single wallet's history; `start_block` filters rows
    fn fetch(&self, wallet: &str, start_block: u64) -> Result<FeedSet> {
        let mut feeds = FeedSet {
            transactions: self.read_feed(Feed::Transactions, true)?,
            token_transfers: self.read_feed(Feed::TokenTransfers, false)?,
            internal_transfers: self.read_feed(Feed::InternalTransfers, false)?,
        };

        if start_block > 0 {
            let keep = |block: &str| block.trim().parse::<u64>().map_or(true, |b| b >= start_block);
            feeds.transactions.retain(|r| keep(&r.block_number));
            feeds.token_transfers.retain(|r| keep(&r.block_number));
            feeds.internal_transfers.retain(|r| keep(&r.block_number));
        }

        info!(
            wallet,
            dir = %self.dir.display(),
            transactions = feeds.transactions.len(),
            token_transfers = feeds.token_transfers.len(),
            internal_transfers = feeds.internal_transfers.len(),
            "Loaded feeds from disk"
        );
        Ok(feeds)
    }
}

// ============================================================================
// Explorer HTTP API
// ============================================================================

/// Blocking client for an Etherscan-compatible explorer
pub struct ExplorerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    cache: Option<ResponseCache>,
    cache_ttl: Duration,
}

impl ExplorerClient {
    /// Client for `https://api.<endpoint>/api`, e.g. endpoint `etherscan.io`
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(&format!("https://api.{}/api", endpoint), api_key)
    }

    /// Client for an explicit API URL (for testing)
    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        })
    }

    /// Serve responses younger than `ttl` from `cache`
    pub fn with_cache(mut self, cache: ResponseCache, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Request URL without the API key; doubles as the cache key
    pub fn request_url(&self, feed: Feed, wallet: &str, start_block: u64) -> String {
        format!(
            "{}?module=account&action={}&address={}&startblock={}&endblock={}&page=1&offset={}&sort=desc",
            self.base_url,
            feed.action(),
            wallet,
            start_block,
            END_BLOCK,
            PAGE_SIZE
        )
    }

    /// Cached body if fresh, otherwise a network body. The flag is true for cache hits.
    fn fetch_body(&self, url: &str) -> Result<(String, bool)> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url, self.cache_ttl)? {
                debug!(url, "Explorer response served from cache");
                return Ok((body, true));
            }
        }

        let full_url = match &self.api_key {
            Some(key) => format!("{}&apikey={}", url, key),
            None => url.to_string(),
        };

        let response = self
            .client
            .get(&full_url)
            .header("Accept", "application/json")
            .send()
            .context("Failed to send request to explorer API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().unwrap_or_default();
            return Err(anyhow!("Explorer API returned error {}: {}", status, error_body));
        }

        let body = response.text().context("Failed to read explorer response")?;
        Ok((body, false))
    }

    fn fetch_feed<T: DeserializeOwned>(&self, feed: Feed, wallet: &str, start_block: u64) -> Result<Vec<T>> {
        let url = self.request_url(feed, wallet, start_block);
        let (body, cached) = self.fetch_body(&url)?;
        let rows: Vec<T> = self
            .accept_body(&url, &body, cached)
            .with_context(|| format!("Failed to parse {} feed", feed))?;
        info!(feed = %feed, wallet, rows = rows.len(), cached, "Downloaded feed");
        Ok(rows)
    }

    /// Parse `body`; a fresh body is cached only once it parsed into rows
    fn accept_body<T: DeserializeOwned>(&self, url: &str, body: &str, cached: bool) -> Result<Vec<T>> {
        let rows = parse_rows(body)?;
        if !cached {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.put(url, body) {
                    warn!(error = %e, "Failed to cache explorer response");
                }
            }
        }
        Ok(rows)
    }
}

impl FeedProvider for ExplorerClient {
    fn fetch(&self, wallet: &str, start_block: u64) -> Result<FeedSet> {
        let wallet = wallet.trim().to_lowercase();
        Ok(FeedSet {
            transactions: self.fetch_feed(Feed::Transactions, &wallet, start_block)?,
            token_transfers: self.fetch_feed(Feed::TokenTransfers, &wallet, start_block)?,
            internal_transfers: self.fetch_feed(Feed::InternalTransfers, &wallet, start_block)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Test Suite: Body parsing
    // =========================================================================

    #[test]
    fn test_parse_envelope_and_bare_array() {
        let envelope = r#"{"status":"1","message":"OK","result":[{"hash":"0x1"}]}"#;
        let bare = r#"[{"hash":"0x1"},{"hash":"0x2"}]"#;

        let rows: Vec<RawTransaction> = parse_rows(envelope).unwrap();
        assert_eq!(rows.len(), 1);
        let rows: Vec<RawTransaction> = parse_rows(bare).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_null_result_is_empty() {
        let body = r#"{"status":"0","message":"No transactions found","result":null}"#;
        let rows: Vec<RawInternalTransfer> = parse_rows(body).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_rows::<RawTransaction>("<html>").is_err());
    }

    #[test]
    fn test_parse_rate_limit_envelope_fails() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        let err = parse_rows::<RawTokenTransfer>(body).unwrap_err();
        assert!(err.to_string().contains("Max rate limit reached"));
    }

    #[test]
    fn test_parse_error_status_without_detail_fails() {
        let body = r#"{"status":"0","message":"NOTOK","result":[]}"#;
        assert!(parse_rows::<RawTransaction>(body).is_err());
    }

    // =========================================================================
    // Test Suite: Explorer URLs
    // =========================================================================

    #[test]
    fn test_request_url_has_no_api_key() {
        let client = ExplorerClient::new("etherscan.io", Some("SECRET".to_string())).unwrap();
        let url = client.request_url(Feed::TokenTransfers, "0xabc", 17_000_000);
        assert_eq!(
            url,
            "https://api.etherscan.io/api?module=account&action=tokentx&address=0xabc\
             &startblock=17000000&endblock=99999999&page=1&offset=10000&sort=desc"
        );
        assert!(!url.contains("SECRET"));
    }

    #[test]
    fn test_cached_body_skips_network() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path().join("cache.db")).unwrap();
        // Unroutable base URL: any network access would fail the test
        let client = ExplorerClient::with_base_url("http://127.0.0.1:9/api", None)
            .unwrap()
            .with_cache(cache, DEFAULT_CACHE_TTL);

        for feed in [Feed::Transactions, Feed::TokenTransfers, Feed::InternalTransfers] {
            let url = client.request_url(feed, "0xabc", 0);
            let body = match feed {
                Feed::Transactions => r#"{"status":"1","message":"OK","result":[{"hash":"0x1"}]}"#,
                _ => r#"{"status":"0","message":"No transactions found","result":[]}"#,
            };
            client.cache.as_ref().unwrap().put(&url, body).unwrap();
        }

        let feeds = client.fetch("0xABC", 0).unwrap();
        assert_eq!(feeds.transactions.len(), 1);
        assert!(feeds.token_transfers.is_empty());
    }

    #[test]
    fn test_cached_error_envelope_fails_fetch() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path().join("cache.db")).unwrap();
        let client = ExplorerClient::with_base_url("http://127.0.0.1:9/api", None)
            .unwrap()
            .with_cache(cache, DEFAULT_CACHE_TTL);

        let ok = r#"{"status":"1","message":"OK","result":[{"hash":"0x1"}]}"#;
        let limited = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        let cache = client.cache.as_ref().unwrap();
        cache.put(&client.request_url(Feed::Transactions, "0xabc", 0), ok).unwrap();
        cache.put(&client.request_url(Feed::TokenTransfers, "0xabc", 0), limited).unwrap();
        cache.put(&client.request_url(Feed::InternalTransfers, "0xabc", 0), limited).unwrap();

        let err = client.fetch("0xabc", 0).unwrap_err();
        assert!(format!("{:#}", err).contains("Max rate limit reached"));
    }

    #[test]
    fn test_error_body_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path().join("cache.db")).unwrap();
        let client = ExplorerClient::with_base_url("http://127.0.0.1:9/api", None)
            .unwrap()
            .with_cache(cache, DEFAULT_CACHE_TTL);
        let url = client.request_url(Feed::TokenTransfers, "0xabc", 0);

        let limited = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        assert!(client.accept_body::<RawTokenTransfer>(&url, limited, false).is_err());
        assert!(client.cache.as_ref().unwrap().get(&url, DEFAULT_CACHE_TTL).unwrap().is_none());

        let ok = r#"{"status":"1","message":"OK","result":[{"hash":"0x1"}]}"#;
        let rows = client.accept_body::<RawTokenTransfer>(&url, ok, false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(client.cache.as_ref().unwrap().get(&url, DEFAULT_CACHE_TTL).unwrap().as_deref(), Some(ok));
    }

    // =========================================================================
    // Test Suite: JSON directory
    // =========================================================================

    #[test]
    fn test_json_dir_requires_txlist() {
        let dir = TempDir::new().unwrap();
        let err = JsonDirFeed::new(dir.path()).fetch("0xabc", 0).unwrap_err();
        assert!(err.to_string().contains("txlist.json"));
    }

    #[test]
    fn test_json_dir_optional_feeds_default_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("txlist.json"), r#"[{"hash":"0x1","blockNumber":"5"}]"#).unwrap();

        let feeds = JsonDirFeed::new(dir.path()).fetch("0xabc", 0).unwrap();
        assert_eq!(feeds.transactions.len(), 1);
        assert!(feeds.token_transfers.is_empty());
        assert!(feeds.internal_transfers.is_empty());
    }

    #[test]
    fn test_json_dir_start_block_filter() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("txlist.json"),
            r#"[{"hash":"0x1","blockNumber":"5"},{"hash":"0x2","blockNumber":"15"}]"#,
        )
        .unwrap();

        let feeds = JsonDirFeed::new(dir.path()).fetch("0xabc", 10).unwrap();
        assert_eq!(feeds.transactions.len(), 1);
        assert_eq!(feeds.transactions[0].hash, "0x2");
    }

    #[test]
    fn test_json_dir_save_then_fetch() {
        let dir = TempDir::new().unwrap();
        let feed = JsonDirFeed::new(dir.path().join("wallet"));
        let feeds = FeedSet {
            transactions: vec![RawTransaction { hash: "0x1".to_string(), ..Default::default() }],
            token_transfers: vec![RawTokenTransfer { hash: "0x1".to_string(), ..Default::default() }],
            internal_transfers: Vec::new(),
        };

        feed.save(&feeds).unwrap();
        let loaded = feed.fetch("0xabc", 0).unwrap();
        assert_eq!(loaded.transactions[0].hash, "0x1");
        assert_eq!(loaded.token_transfers.len(), 1);
        assert!(loaded.internal_transfers.is_empty());
    }
}
