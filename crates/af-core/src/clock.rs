use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source de temps monotone en millisecondes, injectée dans le scheduler.
pub trait Clock {
    /// Millisecondes écoulées depuis une origine fixe. Non décroissant.
    fn now_ms(&self) -> u64;
}

/// Horloge réelle basée sur `Instant`, origine = création.
///
/// # Example
/// ```
/// use af_core::clock::{Clock, SystemClock};
/// let clock = SystemClock::new();
/// let a = clock.now_ms();
/// assert!(clock.now_ms() >= a);
/// ```
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Start a clock at 0 ms.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Horloge pilotée à la main, pour les tests et le rendu déterministe.
///
/// Atomique : partageable derrière un `Arc` sans verrou.
///
/// # Example
/// ```
/// use af_core::clock::{Clock, ManualClock};
/// let clock = ManualClock::new(0);
/// clock.advance(160);
/// assert_eq!(clock.now_ms(), 160);
/// ```
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Jump to an absolute time.
    #[inline]
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Relaxed);
    }

    /// Move forward by `ms`.
    #[inline]
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_ms(), 10);
        clock.advance(40);
        assert_eq!(clock.now_ms(), 50);
        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }
}
