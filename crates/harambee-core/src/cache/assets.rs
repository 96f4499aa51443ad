//! Offline asset cache.
//!
//! Static assets are cached on disk under named generations
//! (`<root>/<generation>/`), keyed by request URL. Two retrieval policies
//! coexist and never share state:
//!
//! - page navigations and the app shell are network-first with cache
//!   fallback (`fetch_shell`)
//! - decorative images are cache-first with network fallback, in their own
//!   named cache (`load_image`)
//!
//! A generation is warmed at install time from a fixed asset list, and
//! activating a generation purges every cache whose name is not the
//! current one.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// Maximum concurrent downloads during install-time warm caching.
/// Keeps first-run setup fast without hammering the asset host.
const MAX_CONCURRENT_INSTALLS: usize = 4;

/// Download timeout for individual assets in seconds.
const ASSET_TIMEOUT_SECS: u64 = 30;

/// Name of the dedicated image cache used by the cache-first policy.
const IMAGE_CACHE: &str = "images";

/// Served when the network is down and nothing is cached for the request.
const OFFLINE_PAGE: &[u8] =
    b"<!doctype html><html><body><h1>Offline</h1><p>Reconnect to see the latest contributions.</p></body></html>";

/// Response from the network transport: status code plus raw body bytes.
#[derive(Debug, Clone)]
pub struct AssetResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network transport for asset requests.
///
/// Abstracted so cache behavior under network failure is testable; the
/// production implementation is `HttpFetcher`.
pub trait AssetFetcher {
    fn fetch(
        &self,
        method: &str,
        url: &str,
    ) -> impl std::future::Future<Output = Result<AssetResponse>> + Send;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ASSET_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, method: &str, url: &str) -> Result<AssetResponse> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .with_context(|| format!("Invalid HTTP method: {}", method))?;
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?
            .to_vec();

        Ok(AssetResponse { status, body })
    }
}

/// Result of a network-first shell fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Fresh response from the network.
    Network(AssetResponse),
    /// Network unreachable; served from the generation cache.
    Cached(Vec<u8>),
    /// Network unreachable and nothing cached; the offline page.
    Offline(Vec<u8>),
}

/// Render source for an image: a locally cached file, or the remote URL
/// when the cache path failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Local(PathBuf),
    Remote(String),
}

/// Lifecycle of a cache generation. Terminal state is `Active` until the
/// next generation installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Installing,
    Installed,
    Activating,
    Active,
}

pub struct AssetCache<F> {
    root: PathBuf,
    generation: String,
    fetcher: F,
    state: GenerationState,
}

impl<F: AssetFetcher> AssetCache<F> {
    pub fn new(root: PathBuf, generation: impl Into<String>, fetcher: F) -> Self {
        Self {
            root,
            generation: generation.into(),
            fetcher,
            state: GenerationState::Installing,
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    // ===== Install =====

    /// Warm the generation cache from a fixed list of critical assets so the
    /// first offline load has a working shell. Individual fetch failures are
    /// logged and skipped. Returns the number of assets cached.
    pub async fn install(&mut self, urls: &[String]) -> Result<usize> {
        self.state = GenerationState::Installing;
        fs::create_dir_all(self.root.join(&self.generation))
            .context("Failed to create asset cache directory")?;

        let fetcher = &self.fetcher;
        let fetched: Vec<(&String, Result<AssetResponse>)> = stream::iter(urls)
            .map(|url| async move { (url, fetcher.fetch("GET", url).await) })
            .buffer_unordered(MAX_CONCURRENT_INSTALLS)
            .collect()
            .await;

        let mut cached = 0;
        for (url, outcome) in fetched {
            match outcome {
                Ok(response) if response.is_success() => {
                    match self.store(&self.generation, url, &response.body) {
                        Ok(()) => cached += 1,
                        Err(e) => warn!(url = %url, error = %e, "Failed to store warm-cache asset"),
                    }
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "Warm-cache fetch returned error status");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Warm-cache fetch failed");
                }
            }
        }

        debug!(cached, total = urls.len(), generation = %self.generation, "Warm cache installed");
        self.state = GenerationState::Installed;
        Ok(cached)
    }

    // ===== Activation / Garbage Collection =====

    /// Activate this generation: delete every named cache that is not the
    /// current one, preventing unbounded growth across deployments.
    pub fn activate(&mut self) -> Result<()> {
        self.state = GenerationState::Activating;

        if self.root.exists() {
            for entry in fs::read_dir(&self.root).context("Failed to list asset caches")? {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(error = %e, "Failed to read asset cache entry");
                        continue;
                    }
                };
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if name != self.generation {
                    debug!(cache = %name, "Purging superseded asset cache");
                    if let Err(e) = fs::remove_dir_all(&path) {
                        warn!(cache = %name, error = %e, "Failed to purge asset cache");
                    }
                }
            }
        }

        fs::create_dir_all(self.root.join(&self.generation))
            .context("Failed to create asset cache directory")?;
        self.state = GenerationState::Active;
        Ok(())
    }

    /// Names of the caches currently on disk.
    pub fn cache_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.root.exists() {
            for entry in fs::read_dir(&self.root).context("Failed to list asset caches")? {
                let entry = entry.context("Failed to read asset cache entry")?;
                if entry.path().is_dir() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    // ===== Policy A: network-first, cache-fallback =====

    /// Fetch a navigation or shell asset, network first.
    ///
    /// Non-GET requests bypass the cache entirely and are proxied to the
    /// network, success or failure. Successful GET responses unconditionally
    /// overwrite the cached entry for the URL (last write wins) before being
    /// returned. On network failure the cached entry is served when present,
    /// the offline page otherwise.
    pub async fn fetch_shell(&self, method: &str, url: &str) -> Result<FetchOutcome> {
        if !method.eq_ignore_ascii_case("GET") {
            let response = self.fetcher.fetch(method, url).await?;
            return Ok(FetchOutcome::Network(response));
        }

        match self.fetcher.fetch("GET", url).await {
            Ok(response) => {
                if response.is_success() {
                    // Cache-layer errors never reach the render path.
                    if let Err(e) = self.store(&self.generation, url, &response.body) {
                        warn!(url, error = %e, "Failed to cache shell response");
                    }
                }
                Ok(FetchOutcome::Network(response))
            }
            Err(e) => {
                debug!(url, error = %e, "Network fetch failed, trying cache");
                match self.lookup(&self.generation, url) {
                    Some(body) => Ok(FetchOutcome::Cached(body)),
                    None => Ok(FetchOutcome::Offline(OFFLINE_PAGE.to_vec())),
                }
            }
        }
    }

    // ===== Policy B: cache-first, network-fallback =====

    /// Load a decorative image, cache first.
    ///
    /// Returns a local file handle when the bytes are (or become) cached;
    /// any failure along the way degrades to the remote URL so the caller
    /// renders directly from the source.
    pub async fn load_image(&self, url: &str) -> ImageSource {
        match self.load_image_inner(url).await {
            Ok(path) => ImageSource::Local(path),
            Err(e) => {
                warn!(url, error = %e, "Image cache unavailable, falling back to remote");
                ImageSource::Remote(url.to_string())
            }
        }
    }

    async fn load_image_inner(&self, url: &str) -> Result<PathBuf> {
        let path = self.entry_path(IMAGE_CACHE, url);
        if path.exists() {
            return Ok(path);
        }

        let response = self.fetcher.fetch("GET", url).await?;
        if !response.is_success() {
            bail!("image fetch returned status {}", response.status);
        }
        self.store(IMAGE_CACHE, url, &response.body)?;
        Ok(path)
    }

    // ===== Storage =====

    /// Request identity is the full URL; the entry file name is its
    /// 64-bit hash.
    fn entry_path(&self, cache: &str, url: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        self.root
            .join(cache)
            .join(format!("{:016x}.bin", hasher.finish()))
    }

    fn store(&self, cache: &str, url: &str, body: &[u8]) -> Result<()> {
        let path = self.entry_path(cache, url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory for {}", cache))?;
        }
        fs::write(&path, body).with_context(|| format!("Failed to write cache entry for {}", url))
    }

    fn lookup(&self, cache: &str, url: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(cache, url)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StubFetcher {
        responses: HashMap<String, Vec<u8>>,
        fail: bool,
    }

    impl StubFetcher {
        fn serving(entries: &[(&str, &[u8])]) -> Self {
            Self {
                responses: entries
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_vec()))
                    .collect(),
                fail: false,
            }
        }

        fn down() -> Self {
            Self {
                responses: HashMap::new(),
                fail: true,
            }
        }
    }

    impl AssetFetcher for StubFetcher {
        async fn fetch(&self, _method: &str, url: &str) -> Result<AssetResponse> {
            if self.fail {
                bail!("network down");
            }
            match self.responses.get(url) {
                Some(body) => Ok(AssetResponse {
                    status: 200,
                    body: body.clone(),
                }),
                None => Ok(AssetResponse {
                    status: 404,
                    body: Vec::new(),
                }),
            }
        }
    }

    const SHELL_URL: &str = "https://tracker.example.co/index.html";
    const IMAGE_URL: &str = "https://tracker.example.co/assets/login.webp";

    #[tokio::test]
    async fn test_shell_fetch_caches_then_serves_cache_on_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();

        let online = AssetCache::new(
            root.clone(),
            "v1",
            StubFetcher::serving(&[(SHELL_URL, b"<html>shell</html>")]),
        );
        let outcome = online.fetch_shell("GET", SHELL_URL).await.expect("fetch");
        assert!(matches!(outcome, FetchOutcome::Network(r) if r.body == b"<html>shell</html>"));

        // Same generation, network gone: the cached copy is served.
        let offline = AssetCache::new(root, "v1", StubFetcher::down());
        let outcome = offline.fetch_shell("GET", SHELL_URL).await.expect("fetch");
        assert!(matches!(outcome, FetchOutcome::Cached(body) if body == b"<html>shell</html>"));
    }

    #[tokio::test]
    async fn test_shell_fetch_falls_back_to_offline_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = AssetCache::new(dir.path().to_path_buf(), "v1", StubFetcher::down());

        let outcome = cache.fetch_shell("GET", SHELL_URL).await.expect("fetch");
        match outcome {
            FetchOutcome::Offline(body) => assert_eq!(body, OFFLINE_PAGE),
            other => panic!("expected offline fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let cache = AssetCache::new(
            root.clone(),
            "v1",
            StubFetcher::serving(&[(SHELL_URL, b"created")]),
        );

        let outcome = cache.fetch_shell("POST", SHELL_URL).await.expect("fetch");
        assert!(matches!(outcome, FetchOutcome::Network(_)));
        // Nothing was written to any cache.
        assert!(cache.cache_names().expect("names").is_empty());

        // And a non-GET failure propagates rather than serving a fallback.
        let offline = AssetCache::new(root, "v1", StubFetcher::down());
        assert!(offline.fetch_shell("POST", SHELL_URL).await.is_err());
    }

    #[tokio::test]
    async fn test_image_cache_first_then_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();

        let online = AssetCache::new(
            root.clone(),
            "v1",
            StubFetcher::serving(&[(IMAGE_URL, b"binary-image")]),
        );
        let source = online.load_image(IMAGE_URL).await;
        let path = match source {
            ImageSource::Local(path) => path,
            other => panic!("expected local image, got {:?}", other),
        };
        assert_eq!(fs::read(&path).expect("read cached image"), b"binary-image");

        // Cache hit requires no network at all.
        let offline = AssetCache::new(root, "v1", StubFetcher::down());
        assert_eq!(offline.load_image(IMAGE_URL).await, ImageSource::Local(path));
    }

    #[tokio::test]
    async fn test_image_failure_degrades_to_remote() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = AssetCache::new(dir.path().to_path_buf(), "v1", StubFetcher::down());

        assert_eq!(
            cache.load_image(IMAGE_URL).await,
            ImageSource::Remote(IMAGE_URL.to_string())
        );

        // A 404 is a failure too, not something to cache.
        let missing = AssetCache::new(
            dir.path().to_path_buf(),
            "v1",
            StubFetcher::serving(&[]),
        );
        assert_eq!(
            missing.load_image(IMAGE_URL).await,
            ImageSource::Remote(IMAGE_URL.to_string())
        );
    }

    #[tokio::test]
    async fn test_activation_purges_superseded_generations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("v1")).expect("mkdir");
        fs::create_dir_all(root.join("v2")).expect("mkdir");
        fs::write(root.join("v1").join("stale.bin"), b"old").expect("write");

        let mut cache = AssetCache::new(root, "v2", StubFetcher::down());
        cache.activate().expect("activate");

        assert_eq!(cache.cache_names().expect("names"), vec!["v2".to_string()]);
        assert_eq!(cache.state(), GenerationState::Active);
    }

    #[tokio::test]
    async fn test_install_warms_cache_and_tolerates_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();

        let mut cache = AssetCache::new(
            root.clone(),
            "v1",
            StubFetcher::serving(&[(SHELL_URL, b"<html>shell</html>")]),
        );
        assert_eq!(cache.state(), GenerationState::Installing);

        let urls = vec![
            SHELL_URL.to_string(),
            "https://tracker.example.co/missing.png".to_string(),
        ];
        let cached = cache.install(&urls).await.expect("install");
        // The 404 asset is skipped, not fatal.
        assert_eq!(cached, 1);
        assert_eq!(cache.state(), GenerationState::Installed);

        // The warmed asset now serves offline.
        let offline = AssetCache::new(root, "v1", StubFetcher::down());
        let outcome = offline.fetch_shell("GET", SHELL_URL).await.expect("fetch");
        assert!(matches!(outcome, FetchOutcome::Cached(body) if body == b"<html>shell</html>"));
    }

    #[tokio::test]
    async fn test_generation_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = AssetCache::new(dir.path().to_path_buf(), "v1", StubFetcher::serving(&[]));

        assert_eq!(cache.state(), GenerationState::Installing);
        cache.install(&[]).await.expect("install");
        assert_eq!(cache.state(), GenerationState::Installed);
        cache.activate().expect("activate");
        assert_eq!(cache.state(), GenerationState::Active);
    }
}
