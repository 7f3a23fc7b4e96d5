//! Where biographies come from.

use std::sync::Arc;
use std::time::Duration;

/// Suspends the calling thread. Swapped out in tests to avoid real sleeps.
pub trait Delay: Send + Sync {
    fn delay(&self, duration: Duration);
}

/// [`Delay`] backed by `std::thread::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Produces the biography for an author. Called on cache misses only.
pub trait BioSource: Send + Sync {
    fn fetch(&self, name: &str) -> String;
}

/// The biography text for `name`.
pub fn biography_for(name: &str) -> String {
    format!(
        "This is the biography of {}. It was fetched from a remote source.",
        name
    )
}

/// Stand-in for a remote bio service: waits `latency`, then answers with
/// [`biography_for`].
pub struct SimulatedBioSource {
    latency: Duration,
    delay: Arc<dyn Delay>,
}

impl SimulatedBioSource {
    /// Sleep for real.
    pub fn new(latency: Duration) -> Self {
        Self::with_delay(latency, Arc::new(ThreadSleep))
    }

    /// Use a custom delay implementation.
    pub fn with_delay(latency: Duration, delay: Arc<dyn Delay>) -> Self {
        Self { latency, delay }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl BioSource for SimulatedBioSource {
    fn fetch(&self, name: &str) -> String {
        self.delay.delay(self.latency);
        biography_for(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDelay {
        calls: Mutex<Vec<Duration>>,
    }

    impl Delay for RecordingDelay {
        fn delay(&self, duration: Duration) {
            self.calls.lock().push(duration);
        }
    }

    #[test]
    fn test_simulated_fetch_waits_then_answers() {
        let delay = Arc::new(RecordingDelay::default());
        let source = SimulatedBioSource::with_delay(Duration::from_secs(2), delay.clone());

        let bio = source.fetch("Ursula K. Le Guin");
        assert_eq!(
            bio,
            "This is the biography of Ursula K. Le Guin. It was fetched from a remote source."
        );
        assert_eq!(*delay.calls.lock(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_zero_latency_thread_sleep() {
        let source = SimulatedBioSource::new(Duration::ZERO);
        assert_eq!(source.latency(), Duration::ZERO);
        assert!(source.fetch("X").contains("X"));
    }
}
