// Persistent HTTP response cache for GET requests.
//
// One JSON file per request identity under the cache directory. Entries
// carry the validators (`ETag`, `Last-Modified`) and freshness lifetime
// (`Cache-Control: max-age`, `Expires`) of the response that produced
// them. A fresh entry is served without touching the network; a stale one
// with validators turns the next GET into a conditional request.
//
// The cache never fails a request: unreadable or unwritable entries are
// logged and treated as misses.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, CACHE_CONTROL, ETAG, EXPIRES, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const ENTRY_FILE_EXT: &str = "json";

/// Freshness directives parsed from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub no_store: bool,
    pub no_cache: bool,
    pub max_age: Option<Duration>,
    pub expires: Option<DateTime<Utc>>,
}

impl CachePolicy {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut policy = Self::default();

        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for directive in value.split(',') {
                let directive = directive.trim().to_ascii_lowercase();
                match directive.split_once('=') {
                    Some(("max-age", seconds)) => {
                        policy.max_age = seconds
                            .trim()
                            .trim_matches('"')
                            .parse::<i64>()
                            .ok()
                            .map(|secs| Duration::seconds(secs.max(0)));
                    }
                    Some(_) => {}
                    None if directive == "no-store" => policy.no_store = true,
                    None if directive == "no-cache" => policy.no_cache = true,
                    None => {}
                }
            }
        }

        policy.expires = headers
            .get(EXPIRES)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value.trim()).ok())
            .map(|value| value.with_timezone(&Utc));

        policy
    }

    /// Instant after which a response stored at `stored_at` is stale.
    /// `max-age` wins over `Expires`.
    pub fn expires_at(&self, stored_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age.map(|age| stored_at + age).or(self.expires)
    }
}

/// A stored GET response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub body: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// `no-cache`: always revalidate, even inside the freshness lifetime.
    pub must_revalidate: bool,
}

impl CachedResponse {
    /// Build an entry from a successful response, or `None` when the
    /// response may not be stored or offers nothing to reuse.
    pub fn from_response(
        url: &str,
        headers: &HeaderMap,
        body: String,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let policy = CachePolicy::from_headers(headers);
        if policy.no_store {
            return None;
        }

        let entry = Self {
            url: url.to_string(),
            body,
            etag: header_string(headers, ETAG.as_str()),
            last_modified: header_string(headers, LAST_MODIFIED.as_str()),
            stored_at: now,
            expires_at: policy.expires_at(now),
            must_revalidate: policy.no_cache,
        };

        if entry.has_validators() || entry.is_fresh(now) {
            Some(entry)
        } else {
            None
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.must_revalidate && self.expires_at.is_some_and(|expires_at| now < expires_at)
    }

    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Apply the headers of a `304 Not Modified` to this entry.
    pub fn refresh(&mut self, headers: &HeaderMap, now: DateTime<Utc>) {
        let policy = CachePolicy::from_headers(headers);
        if let Some(etag) = header_string(headers, ETAG.as_str()) {
            self.etag = Some(etag);
        }
        if let Some(last_modified) = header_string(headers, LAST_MODIFIED.as_str()) {
            self.last_modified = Some(last_modified);
        }
        self.stored_at = now;
        self.expires_at = policy.expires_at(now);
        self.must_revalidate = policy.no_cache;
    }
}

/// Directory-backed response store.
///
/// No locking: concurrent invocations sharing a directory may race, the
/// last writer wins.
#[derive(Debug, Clone)]
pub struct HttpCache {
    dir: PathBuf,
}

impl HttpCache {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Cache key for a GET of `url` made as `identity` (the API user).
    pub fn key(url: &str, identity: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"GET ");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(identity.as_bytes());
        hex_encode(&hasher.finalize())
    }

    pub fn load(&self, key: &str) -> Option<CachedResponse> {
        let path = self.entry_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read cached response");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(path = %path.display(), %error, "discarding corrupt cached response");
                None
            }
        }
    }

    pub fn store(&self, key: &str, entry: &CachedResponse) {
        if let Err(error) = self.try_store(key, entry) {
            warn!(url = %entry.url, %error, "failed to store cached response");
        } else {
            debug!(url = %entry.url, etag = ?entry.etag, "stored cached response");
        }
    }

    pub fn remove(&self, key: &str) {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!(%error, "failed to evict cached response"),
        }
    }

    fn try_store(&self, key: &str, entry: &CachedResponse) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.entry_path(key);
        let tmp = self.dir.join(format!("{key}.{ENTRY_FILE_EXT}.tmp"));

        let payload = serde_json::to_vec(entry).map_err(io::Error::other)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&payload)?;
        file.sync_data()?;
        drop(file);

        fs::rename(&tmp, &target)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_FILE_EXT}"))
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
