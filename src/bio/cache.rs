//! Author bio cache with single-flight fetches.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::source::{BioSource, Delay, SimulatedBioSource};

/// Bio cache configuration.
#[derive(Clone, Debug)]
pub struct BioCacheConfig {
    /// How long the simulated remote fetch takes.
    /// Default: 2 seconds
    pub fetch_latency: Duration,

    /// Share one fetch between concurrent misses for the same name.
    /// When false, every concurrent miss fetches on its own.
    /// Default: true
    pub coalesce_fetches: bool,
}

impl Default for BioCacheConfig {
    fn default() -> Self {
        Self {
            fetch_latency: Duration::from_secs(2),
            coalesce_fetches: true,
        }
    }
}

/// Bio cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BioCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Fetches performed.
    pub misses: u64,
    /// Lookups that waited on another caller's fetch.
    pub coalesced: u64,
}

/// Waiters for a fetch in progress.
type Waiters = Vec<Sender<String>>;

/// State shared with background fetches.
struct Shared {
    source: Arc<dyn BioSource>,

    /// Cached biographies by author name.
    entries: RwLock<HashMap<String, String>>,

    /// Fetches in progress (name -> callers waiting on it).
    in_flight: Mutex<HashMap<String, Waiters>>,

    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl Shared {
    fn cached(&self, name: &str) -> Option<String> {
        self.entries.read().get(name).cloned()
    }

    fn fetch_and_store(&self, name: &str) -> String {
        info!(author = name, "Bio cache miss, fetching");
        self.misses.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let bio = self.source.fetch(name);
        debug!(
            author = name,
            duration_ms = started.elapsed().as_millis() as u64,
            "Bio fetched"
        );

        self.entries.write().insert(name.to_string(), bio.clone());
        bio
    }
}

/// Outcome of joining the in-flight table for a name.
enum Joined {
    Cached(String),
    /// This caller runs the fetch.
    Leader,
    /// Another caller is fetching.
    Follower,
}

/// Maps author names to biographies. Entries are never evicted.
pub struct BioCache {
    shared: Arc<Shared>,
    coalesce: bool,
}

impl BioCache {
    /// Cache over a [`SimulatedBioSource`] that sleeps for real.
    pub fn new(config: BioCacheConfig) -> Self {
        let source = SimulatedBioSource::new(config.fetch_latency);
        Self::with_source(&config, Arc::new(source))
    }

    /// Cache over a [`SimulatedBioSource`] using a custom delay.
    pub fn with_delay(config: BioCacheConfig, delay: Arc<dyn Delay>) -> Self {
        let source = SimulatedBioSource::with_delay(config.fetch_latency, delay);
        Self::with_source(&config, Arc::new(source))
    }

    /// Cache over any bio source. `fetch_latency` is not used.
    pub fn with_source(config: &BioCacheConfig, source: Arc<dyn BioSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
            }),
            coalesce: config.coalesce_fetches,
        }
    }

    /// Get the biography for `name`, fetching it on a miss.
    ///
    /// Blocks the calling thread for the duration of a fetch, whether this
    /// caller runs it or waits on another caller's.
    pub fn get(&self, name: &str) -> String {
        if let Some(bio) = self.hit(name) {
            return bio;
        }

        if !self.coalesce {
            return self.shared.fetch_and_store(name);
        }

        loop {
            let (tx, rx) = bounded(1);
            match self.join(name, tx) {
                Joined::Cached(bio) => return bio,
                Joined::Leader => {
                    let guard = InFlightGuard::new(&self.shared, name);
                    let bio = self.shared.fetch_and_store(name);
                    guard.finish(&bio);
                    return bio;
                }
                Joined::Follower => {
                    debug!(author = name, "Waiting on in-flight bio fetch");
                    match rx.recv() {
                        Ok(bio) => {
                            self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
                            return bio;
                        }
                        // The fetching caller unwound; try again.
                        Err(_) => continue,
                    }
                }
            }
        }
    }

    /// Like [`get`](Self::get), but gives up after `timeout`.
    ///
    /// On a miss the fetch runs on a background thread, so a caller that
    /// times out still leaves the result to be cached. Returns `None` if no
    /// biography arrived in time.
    pub fn get_timeout(&self, name: &str, timeout: Duration) -> Option<String> {
        if let Some(bio) = self.hit(name) {
            return Some(bio);
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.get(name));
        };
        loop {
            let (tx, rx) = bounded(1);

            let leader = if self.coalesce {
                match self.join(name, tx) {
                    Joined::Cached(bio) => return Some(bio),
                    Joined::Leader => true,
                    Joined::Follower => false,
                }
            } else {
                // Uncoalesced fetches still run off-thread so the wait is bounded.
                if !self.spawn_fetch(name, Some(tx)) {
                    return None;
                }
                false
            };

            if leader && !self.spawn_fetch(name, None) {
                // Wakes anyone who queued behind us.
                self.shared.in_flight.lock().remove(name);
                return None;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(bio) => {
                    if !leader && self.coalesce {
                        self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                    return Some(bio);
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        author = name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Bio lookup timed out"
                    );
                    return None;
                }
                // The fetch unwound before answering.
                Err(RecvTimeoutError::Disconnected) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    continue;
                }
            }
        }
    }

    fn hit(&self, name: &str) -> Option<String> {
        let bio = self.shared.cached(name)?;
        debug!(author = name, "Bio cache hit");
        self.shared.hits.fetch_add(1, Ordering::Relaxed);
        Some(bio)
    }

    /// Queue `waiter` for the fetch of `name`, starting one if none is
    /// running.
    fn join(&self, name: &str, waiter: Sender<String>) -> Joined {
        let mut in_flight = self.shared.in_flight.lock();

        // A fetch may have finished since the first check.
        if let Some(bio) = self.shared.cached(name) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            return Joined::Cached(bio);
        }

        match in_flight.get_mut(name) {
            Some(waiters) => {
                waiters.push(waiter);
                Joined::Follower
            }
            None => {
                in_flight.insert(name.to_string(), vec![waiter]);
                Joined::Leader
            }
        }
    }

    /// Run a fetch on a background thread. With `reply`, the fetch is
    /// uncoalesced and answers only that sender; otherwise it completes the
    /// in-flight entry for `name`.
    fn spawn_fetch(&self, name: &str, reply: Option<Sender<String>>) -> bool {
        let shared = Arc::clone(&self.shared);
        let owned = name.to_string();

        let spawned = thread::Builder::new()
            .name("bio-fetch".to_string())
            .spawn(move || match reply {
                Some(tx) => {
                    let bio = shared.fetch_and_store(&owned);
                    let _ = tx.send(bio);
                }
                None => {
                    let guard = InFlightGuard::new(&shared, &owned);
                    let bio = shared.fetch_and_store(&owned);
                    guard.finish(&bio);
                }
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!(author = name, error = %e, "Failed to spawn bio fetch");
                false
            }
        }
    }

    /// Whether a biography for `name` is cached.
    pub fn contains(&self, name: &str) -> bool {
        self.shared.entries.read().contains_key(name)
    }

    /// Number of cached biographies.
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.read().is_empty()
    }

    /// Number of fetches currently running.
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.lock().len()
    }

    pub fn stats(&self) -> BioCacheStats {
        BioCacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            coalesced: self.shared.coalesced.load(Ordering::Relaxed),
        }
    }
}

/// Clears the in-flight entry for a fetch, waking waiters even if the
/// fetch unwinds.
struct InFlightGuard<'a> {
    shared: &'a Shared,
    name: &'a str,
    done: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(shared: &'a Shared, name: &'a str) -> Self {
        Self {
            shared,
            name,
            done: false,
        }
    }

    /// Hand the result to every waiter.
    fn finish(mut self, bio: &str) {
        let waiters = self.shared.in_flight.lock().remove(self.name);
        self.done = true;

        if let Some(waiters) = waiters {
            debug!(author = self.name, waiting = waiters.len(), "Completing bio fetch");
            for waiter in waiters {
                let _ = waiter.send(bio.to_string());
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            // Dropping the senders wakes the waiters with an error.
            self.shared.in_flight.lock().remove(self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::biography_for;
    use std::sync::Barrier;

    /// Counts fetches and holds each one until released.
    struct GatedSource {
        fetches: AtomicU64,
        gate: Mutex<()>,
    }

    impl GatedSource {
        fn new() -> Self {
            Self {
                fetches: AtomicU64::new(0),
                gate: Mutex::new(()),
            }
        }
    }

    impl BioSource for GatedSource {
        fn fetch(&self, name: &str) -> String {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let _gate = self.gate.lock();
            biography_for(name)
        }
    }

    struct NoDelay;

    impl Delay for NoDelay {
        fn delay(&self, _duration: Duration) {}
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = BioCache::with_delay(BioCacheConfig::default(), Arc::new(NoDelay));

        let first = cache.get("Frank Herbert");
        let second = cache.get("Frank Herbert");

        assert_eq!(first, second);
        assert_eq!(
            cache.stats(),
            BioCacheStats {
                hits: 1,
                misses: 1,
                coalesced: 0
            }
        );
        assert!(cache.contains("Frank Herbert"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_misses_share_one_fetch() {
        let source = Arc::new(GatedSource::new());
        let cache = Arc::new(BioCache::with_source(
            &BioCacheConfig::default(),
            source.clone(),
        ));

        // Hold the gate so the first fetch stays in flight.
        let gate = source.gate.lock();

        let barrier = Arc::new(Barrier::new(4));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get("Octavia Butler")
                })
            })
            .collect();

        while source.fetches.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));
        drop(gate);

        for worker in workers {
            assert_eq!(worker.join().unwrap(), biography_for("Octavia Butler"));
        }

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.coalesced, 3);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[test]
    fn test_uncoalesced_misses_fetch_separately() {
        let source = Arc::new(GatedSource::new());
        let config = BioCacheConfig {
            coalesce_fetches: false,
            ..Default::default()
        };
        let cache = Arc::new(BioCache::with_source(&config, source.clone()));

        let gate = source.gate.lock();
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get("Iain Banks"))
            })
            .collect();

        while source.fetches.load(Ordering::SeqCst) < 2 {
            thread::yield_now();
        }
        drop(gate);

        for worker in workers {
            assert_eq!(worker.join().unwrap(), biography_for("Iain Banks"));
        }
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_waiters_retry_when_fetch_panics() {
        struct FailOnce {
            failed: AtomicU64,
            gate: Mutex<()>,
        }

        impl BioSource for FailOnce {
            fn fetch(&self, name: &str) -> String {
                let _gate = self.gate.lock();
                if self.failed.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("remote unavailable");
                }
                biography_for(name)
            }
        }

        let source = Arc::new(FailOnce {
            failed: AtomicU64::new(0),
            gate: Mutex::new(()),
        });
        let cache = Arc::new(BioCache::with_source(
            &BioCacheConfig::default(),
            source.clone(),
        ));

        let gate = source.gate.lock();
        let leader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("N. K. Jemisin"))
        };
        while cache.in_flight_count() == 0 {
            thread::yield_now();
        }
        let follower = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("N. K. Jemisin"))
        };
        thread::sleep(Duration::from_millis(50));
        drop(gate);

        assert!(leader.join().is_err());
        assert_eq!(follower.join().unwrap(), biography_for("N. K. Jemisin"));
        assert_eq!(cache.in_flight_count(), 0);
    }

    fn wait_until(mut ready: impl FnMut() -> bool) {
        let started = Instant::now();
        while !ready() {
            assert!(started.elapsed() < Duration::from_secs(5), "condition never held");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_waiter_gives_up_while_fetch_blocks() {
        let source = Arc::new(GatedSource::new());
        let cache = Arc::new(BioCache::with_source(
            &BioCacheConfig::default(),
            source.clone(),
        ));

        let gate = source.gate.lock();
        let leader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get("Gene Wolfe"))
        };
        wait_until(|| cache.in_flight_count() == 1);

        let started = Instant::now();
        assert_eq!(cache.get_timeout("Gene Wolfe", Duration::from_millis(50)), None);
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(gate);
        assert_eq!(leader.join().unwrap(), biography_for("Gene Wolfe"));
        assert_eq!(
            cache.get_timeout("Gene Wolfe", Duration::ZERO),
            Some(biography_for("Gene Wolfe"))
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_timed_out_fetch_still_fills_cache() {
        let source = Arc::new(GatedSource::new());
        let cache = BioCache::with_source(&BioCacheConfig::default(), source.clone());

        let gate = source.gate.lock();
        assert_eq!(cache.get_timeout("Jack Vance", Duration::from_millis(30)), None);
        assert!(!cache.contains("Jack Vance"));

        drop(gate);
        wait_until(|| cache.contains("Jack Vance") && cache.in_flight_count() == 0);

        assert_eq!(cache.get("Jack Vance"), biography_for("Jack Vance"));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_get_timeout_answers_miss_in_time() {
        let cache = BioCache::with_delay(BioCacheConfig::default(), Arc::new(NoDelay));

        assert_eq!(
            cache.get_timeout("Mervyn Peake", Duration::from_secs(5)),
            Some(biography_for("Mervyn Peake"))
        );
        assert!(cache.contains("Mervyn Peake"));
        assert_eq!(cache.stats().coalesced, 0);
    }

    #[test]
    fn test_uncoalesced_get_timeout() {
        let source = Arc::new(GatedSource::new());
        let config = BioCacheConfig {
            coalesce_fetches: false,
            ..Default::default()
        };
        let cache = BioCache::with_source(&config, source.clone());

        let gate = source.gate.lock();
        assert_eq!(cache.get_timeout("Tanith Lee", Duration::from_millis(30)), None);
        drop(gate);

        wait_until(|| cache.contains("Tanith Lee"));
        assert_eq!(cache.in_flight_count(), 0);
    }
}
