//! Flag images from a static CDN, cached for the process lifetime.
//!
//! The cache is unbounded: it is keyed by lowercase country code, so it
//! never holds more than ~250 entries. A failed key is retried only after
//! a cool-down.

use crate::location::CountryCode;
use image::RgbaImage;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_FLAG_CDN: &str = "https://flagcdn.com";

/// Flag PNGs larger than this are refused.
const MAX_FLAG_BYTES: u64 = 512 * 1024;

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag CDN answered with HTTP {0}")]
    Status(u16),
    #[error("flag CDN network error: {0}")]
    Network(String),
    #[error("flag read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("flag decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Vector flag URL, reported to query clients.
pub fn flag_url(cdn_base: &str, code: CountryCode) -> Option<String> {
    code.lowercase()
        .map(|key| format!("{}/{}.svg", cdn_base.trim_end_matches('/'), key))
}

/// 40px-wide PNG, which is what the rasterizer decodes.
pub fn flag_png_url(cdn_base: &str, key: &str) -> String {
    format!("{}/w40/{}.png", cdn_base.trim_end_matches('/'), key)
}

pub trait FlagSource: Send + Sync {
    fn fetch(&self, key: &str) -> Result<RgbaImage, FlagError>;
}

pub struct CdnFlagSource {
    agent: ureq::Agent,
    cdn_base: String,
}

impl CdnFlagSource {
    pub fn new(agent: ureq::Agent, cdn_base: &str) -> Self {
        Self {
            agent,
            cdn_base: cdn_base.to_string(),
        }
    }
}

impl FlagSource for CdnFlagSource {
    fn fetch(&self, key: &str) -> Result<RgbaImage, FlagError> {
        let url = flag_png_url(&self.cdn_base, key);
        let response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FlagError::Status(code),
            ureq::Error::Transport(t) => FlagError::Network(t.to_string()),
        })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FLAG_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }
}

/// How long a key that failed to fetch is left alone before trying again.
pub const FAILED_FLAG_RETRY: Duration = Duration::from_secs(5 * 60);

enum Entry {
    Ready(Arc<RgbaImage>),
    Pending,
    Failed(Instant),
}

struct CacheInner {
    source: Box<dyn FlagSource>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl CacheInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fetch_into_cache(&self, key: String) {
        let entry = match self.source.fetch(&key) {
            Ok(image) => {
                debug!("cached flag image for {}", key);
                Entry::Ready(Arc::new(image))
            }
            Err(e) => {
                warn!("flag image for {} unavailable: {}", key, e);
                Entry::Failed(Instant::now())
            }
        };
        self.entries().insert(key, entry);
    }
}

/// Never blocks the caller on the network: a miss starts a fetch on a
/// worker thread and the caller draws without a flag until it lands.
#[derive(Clone)]
pub struct FlagImageCache {
    inner: Arc<CacheInner>,
    retry_after: Duration,
}

impl FlagImageCache {
    pub fn new(source: Box<dyn FlagSource>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                entries: Mutex::new(HashMap::new()),
            }),
            retry_after: FAILED_FLAG_RETRY,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// The cached image for `code`, if it has arrived. A miss schedules a
    /// background fetch unless one is in flight or the key failed less
    /// than `retry_after` ago.
    pub fn get(&self, code: CountryCode) -> Option<Arc<RgbaImage>> {
        let key = code.lowercase()?;

        {
            let mut entries = self.inner.entries();
            match entries.get(&key) {
                Some(Entry::Ready(image)) => return Some(image.clone()),
                Some(Entry::Pending) => return None,
                Some(Entry::Failed(at)) if at.elapsed() < self.retry_after => return None,
                _ => {}
            }
            entries.insert(key.clone(), Entry::Pending);
        }

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name("flag-fetch".into())
            .spawn({
                let key = key.clone();
                move || inner.fetch_into_cache(key)
            });
        if let Err(e) = spawned {
            error!("could not start flag fetch for {}: {}", key, e);
            self.inner.entries().insert(key, Entry::Failed(Instant::now()));
        }
        None
    }

    /// Number of flags ready to draw.
    pub fn len(&self) -> usize {
        self.inner
            .entries()
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl FlagSource for CountingSource {
        fn fetch(&self, key: &str) -> Result<RgbaImage, FlagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FlagError::Status(404));
            }
            assert_eq!(key, key.to_ascii_lowercase());
            Ok(RgbaImage::new(4, 3))
        }
    }

    struct SlowSource {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl FlagSource for SlowSource {
        fn fetch(&self, _key: &str) -> Result<RgbaImage, FlagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            Err(FlagError::Network("timed out".into()))
        }
    }

    fn cache(fail: bool) -> (FlagImageCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            calls: calls.clone(),
            fail,
        };
        (FlagImageCache::new(Box::new(source)), calls)
    }

    /// Polls until `code` is cached, or gives up after two seconds.
    fn wait_for(cache: &FlagImageCache, code: CountryCode) -> Option<Arc<RgbaImage>> {
        for _ in 0..200 {
            if let Some(image) = cache.get(code) {
                return Some(image);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    fn wait_for_calls(calls: &AtomicUsize, n: usize) {
        for _ in 0..200 {
            if calls.load(Ordering::SeqCst) >= n {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_fetches_once_per_country() {
        let (cache, calls) = cache(false);
        let fr = CountryCode::parse("FR").unwrap();
        assert!(wait_for(&cache, fr).is_some());
        assert!(wait_for(&cache, CountryCode::parse("fr").unwrap()).is_some());
        assert!(wait_for(&cache, CountryCode::parse("DE").unwrap()).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_miss_returns_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = SlowSource {
            calls: calls.clone(),
            delay: Duration::from_millis(300),
        };
        let cache = FlagImageCache::new(Box::new(source));
        let se = CountryCode::parse("SE").unwrap();

        let started = Instant::now();
        for _ in 0..10 {
            assert!(cache.get(se).is_none());
        }
        assert!(started.elapsed() < Duration::from_millis(100), "{:?}", started.elapsed());

        // One fetch in flight, no matter how often the key is asked for.
        wait_for_calls(&calls, 1);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_key_waits_before_retrying() {
        let (cache, calls) = cache(true);
        let se = CountryCode::parse("SE").unwrap();
        assert!(cache.get(se).is_none());
        wait_for_calls(&calls, 1);
        thread::sleep(Duration::from_millis(20));

        for _ in 0..5 {
            assert!(cache.get(se).is_none());
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_key_is_retried_after_cool_down() {
        let (cache, calls) = cache(true);
        let cache = cache.with_retry_after(Duration::from_millis(30));
        let se = CountryCode::parse("SE").unwrap();
        assert!(cache.get(se).is_none());
        wait_for_calls(&calls, 1);

        thread::sleep(Duration::from_millis(60));
        assert!(cache.get(se).is_none());
        wait_for_calls(&calls, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_code_has_no_flag() {
        let (cache, calls) = cache(false);
        assert!(cache.get(CountryCode::UNKNOWN).is_none());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flag_urls() {
        let fr = CountryCode::parse("FR").unwrap();
        assert_eq!(flag_url(DEFAULT_FLAG_CDN, fr).as_deref(), Some("https://flagcdn.com/fr.svg"));
        assert_eq!(flag_url("https://cdn.example/", fr).as_deref(), Some("https://cdn.example/fr.svg"));
        assert_eq!(flag_url(DEFAULT_FLAG_CDN, CountryCode::UNKNOWN), None);
        assert_eq!(flag_png_url(DEFAULT_FLAG_CDN, "fr"), "https://flagcdn.com/w40/fr.png");
    }
}
