//! Local and remote vector sources with an on-disk download cache.
//!
//! A source location is either a filesystem path or an `http(s)://` URL.
//! Remote sources are downloaded once into the cache directory and served
//! from there afterwards.
//!
//! ## Thread Safety
//!
//! `SourceFetcher` can be shared between threads:
//! - Different URLs can be downloaded in parallel
//! - Multiple threads requesting the same URL will coordinate, with only one
//!   performing the download while others wait
//! - Cached files are served immediately without blocking

use crate::{Result, VectorError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tracing::{debug, info};

/// Timeout for a single source download. Reference datasets can be large.
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Whether a location refers to a remote HTTP(S) resource.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Status of a download in progress.
#[derive(Clone)]
enum DownloadStatus {
    InProgress,
    Complete,
    Failed(String),
}

/// One download shared by every thread that asked for the same URL.
///
/// The downloader removes the flight from the map before publishing its
/// status, so later callers start afresh while current waiters still see
/// the result through their `Arc`.
struct Flight {
    status: Mutex<DownloadStatus>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            status: Mutex::new(DownloadStatus::InProgress),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<DownloadStatus> {
        let mut status = self.status.lock().map_err(|_| VectorError::LockPoisoned)?;
        while matches!(*status, DownloadStatus::InProgress) {
            status = self.done.wait(status).map_err(|_| VectorError::LockPoisoned)?;
        }
        Ok(status.clone())
    }

    fn finish(&self, outcome: DownloadStatus) -> Result<()> {
        *self.status.lock().map_err(|_| VectorError::LockPoisoned)? = outcome;
        self.done.notify_all();
        Ok(())
    }
}

/// Download statistics for the fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadStats {
    /// Number of files downloaded this session.
    pub files_downloaded: usize,
    /// Total bytes downloaded this session.
    pub bytes_downloaded: u64,
}

/// Resolves source locations to local files, downloading remote ones.
pub struct SourceFetcher {
    /// Cache directory for downloaded files.
    cache_dir: PathBuf,
    /// HTTP client for downloads.
    client: reqwest::blocking::Client,
    /// URLs currently being downloaded.
    in_flight: Mutex<HashMap<String, Arc<Flight>>>,
    files_downloaded: AtomicUsize,
    bytes_downloaded: AtomicU64,
}

impl std::fmt::Debug for SourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFetcher")
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl SourceFetcher {
    /// Create a fetcher caching into `cache_dir` (created if missing).
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            cache_dir,
            client,
            in_flight: Mutex::new(HashMap::new()),
            files_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
        })
    }

    /// Get the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get download statistics for this session.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    /// Cache file for a URL: `<cache>/<sha256 prefix>/<basename>`.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        let name = url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .unwrap_or("source");
        self.cache_dir.join(&digest[..16]).join(name)
    }

    /// Resolve a location to a local file path.
    ///
    /// Local paths are returned unchanged. Remote URLs are downloaded into
    /// the cache the first time and reused afterwards.
    pub fn fetch(&self, location: &str) -> Result<PathBuf> {
        if !is_remote(location) {
            return Ok(PathBuf::from(location));
        }

        let cache_path = self.cache_path(location);
        if cache_path.exists() {
            debug!(url = location, path = %cache_path.display(), "Using cached source");
            return Ok(cache_path);
        }

        // Coordinate with other threads fetching the same URL
        let flight = {
            let mut in_flight = self.in_flight.lock().map_err(|_| VectorError::LockPoisoned)?;
            if let Some(flight) = in_flight.get(location) {
                Some(Arc::clone(flight))
            } else if cache_path.exists() {
                return Ok(cache_path);
            } else {
                in_flight.insert(location.to_string(), Arc::new(Flight::new()));
                None
            }
        };

        if let Some(flight) = flight {
            debug!(url = location, "Waiting for download in progress");
            return match flight.wait()? {
                DownloadStatus::Failed(reason) => Err(VectorError::DownloadFailed {
                    url: location.to_string(),
                    reason,
                }),
                _ => Ok(cache_path),
            };
        }

        let result = self.download(location, &cache_path);

        let flight = self
            .in_flight
            .lock()
            .map_err(|_| VectorError::LockPoisoned)?
            .remove(location);
        if let Some(flight) = flight {
            let status = match &result {
                Ok(_) => DownloadStatus::Complete,
                Err(e) => DownloadStatus::Failed(e.to_string()),
            };
            flight.finish(status)?;
        }

        result
    }

    /// Read a location into a string.
    pub fn read_to_string(&self, location: &str) -> Result<String> {
        let path = self.fetch(location)?;
        Ok(fs::read_to_string(path)?)
    }

    fn download(&self, url: &str, cache_path: &Path) -> Result<PathBuf> {
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(url, "Downloading source");
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(VectorError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes()?;
        self.files_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes.len() as u64, Ordering::Relaxed);

        // Write to a temporary name first so a partial file is never served
        let partial = cache_path.with_extension("partial");
        let mut file = fs::File::create(&partial)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&partial, cache_path)?;

        Ok(cache_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    const EMPTY_COLLECTION: &str = r#"{"type":"FeatureCollection","features":[]}"#;

    /// Serve HTTP on localhost, answering request `n` with `respond(n)` after `delay`.
    fn serve<F>(delay: Duration, respond: F) -> (String, Arc<AtomicUsize>)
    where
        F: Fn(usize) -> (u16, &'static str) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap_or(0) > 0 && line != "\r\n" {
                    line.clear();
                }

                let hit = counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(delay);
                let (status, body) = respond(hit);
                let response = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn leftover_partials(path: &Path) -> usize {
        let parent = path.parent().expect("parent");
        fs::read_dir(parent)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/a.geojson"));
        assert!(is_remote("http://example.com/a.geojson"));
        assert!(!is_remote("data/gmw_pacific.geojson"));
        assert!(!is_remote("/abs/path.geojson"));
    }

    #[test]
    fn test_cache_path_uses_basename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");

        let path = fetcher.cache_path("https://example.com/input/gmw/grid.geojson?sig=abc");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("grid.geojson"));
        assert!(path.starts_with(dir.path()));

        // Different URLs with the same basename do not collide
        let other = fetcher.cache_path("https://example.org/grid.geojson");
        assert_ne!(path, other);
    }

    #[test]
    fn test_local_path_passthrough() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");

        let file = dir.path().join("local.geojson");
        fs::write(&file, "{}").expect("write");
        let resolved = fetcher.fetch(file.to_str().expect("utf8")).expect("fetch");
        assert_eq!(resolved, file);
        assert_eq!(fetcher.download_stats().files_downloaded, 0);
    }

    #[test]
    fn test_cached_remote_not_downloaded_again() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");

        let url = "https://example.invalid/cached.geojson";
        let cached = fetcher.cache_path(url);
        fs::create_dir_all(cached.parent().expect("parent")).expect("mkdir");
        fs::write(&cached, "{\"type\":\"FeatureCollection\",\"features\":[]}").expect("write");

        let text = fetcher.read_to_string(url).expect("read cached");
        assert!(text.contains("FeatureCollection"));
        assert_eq!(fetcher.download_stats().files_downloaded, 0);
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    #[test]
    fn test_concurrent_fetches_download_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");
        let (base, hits) = serve(Duration::from_millis(300), |_| (200, EMPTY_COLLECTION));
        let url = format!("{base}/gmw.geojson");

        let barrier = Barrier::new(4);
        let paths: Vec<PathBuf> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        fetcher.fetch(&url)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("join").expect("Should fetch"))
                .collect()
        });

        let cached = fetcher.cache_path(&url);
        assert!(paths.iter().all(|p| *p == cached));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.download_stats().files_downloaded, 1);
        assert_eq!(fs::read_to_string(&cached).expect("read"), EMPTY_COLLECTION);
        assert_eq!(leftover_partials(&cached), 0);
    }

    #[test]
    fn test_failed_download_reaches_every_caller() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");
        let (base, hits) = serve(Duration::from_millis(300), |_| (500, "boom"));
        let url = format!("{base}/gmw.geojson");

        let barrier = Barrier::new(4);
        let results: Vec<Result<PathBuf>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        fetcher.fetch(&url)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("join")).collect()
        });

        for result in &results {
            assert!(
                matches!(result, Err(VectorError::DownloadFailed { reason, .. }) if reason.contains("500")),
                "Every caller should see the failure"
            );
        }
        assert!(hits.load(Ordering::SeqCst) >= 1);
        let cached = fetcher.cache_path(&url);
        assert!(!cached.exists());
        assert_eq!(fetcher.download_stats().files_downloaded, 0);
    }

    #[test]
    fn test_fetch_retries_after_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");
        let (base, hits) = serve(Duration::ZERO, |hit| {
            if hit == 0 {
                (500, "unavailable")
            } else {
                (200, EMPTY_COLLECTION)
            }
        });
        let url = format!("{base}/grid.geojson");

        assert!(fetcher.fetch(&url).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let path = fetcher.fetch(&url).expect("Should fetch once the server recovers");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read_to_string(&path).expect("read"), EMPTY_COLLECTION);

        fetcher.fetch(&url).expect("Should serve from cache");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.download_stats().files_downloaded, 1);
    }
}
