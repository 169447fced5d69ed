use std::collections::VecDeque;

/// Cadence des cycles pipeline complétés, par fenêtre glissante.
///
/// Horodatages en millisecondes fournis par l'appelant (horloge de la
/// session), donc testable sans attente réelle. Zéro allocation après init.
///
/// # Example
/// ```
/// use af_render::fps::CycleMeter;
/// let mut meter = CycleMeter::new(8);
/// meter.tick(0);
/// meter.tick(150);
/// meter.tick(300);
/// assert!((meter.rate() - 6.666).abs() < 0.01);
/// assert_eq!(meter.last_interval_ms(), Some(150));
/// ```
pub struct CycleMeter {
    /// Horodatages des N derniers cycles.
    timestamps: VecDeque<u64>,
    /// Taille de la fenêtre.
    window: usize,
    rate: f64,
    last_interval_ms: Option<u64>,
    total: u64,
}

impl CycleMeter {
    /// Create a meter averaging over the last `window` cycles (at least 2).
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            timestamps: VecDeque::with_capacity(window + 1),
            window,
            rate: 0.0,
            last_interval_ms: None,
            total: 0,
        }
    }

    /// Appeler une fois par cycle complété.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(&last) = self.timestamps.back() {
            self.last_interval_ms = Some(now_ms.saturating_sub(last));
        }
        self.timestamps.push_back(now_ms);
        if self.timestamps.len() > self.window {
            self.timestamps.pop_front();
        }
        self.total += 1;
        if let (Some(&first), true) = (self.timestamps.front(), self.timestamps.len() >= 2) {
            let span = now_ms.saturating_sub(first);
            if span > 0 {
                self.rate = (self.timestamps.len() - 1) as f64 * 1000.0 / span as f64;
            }
        }
    }

    /// Oublie l'historique (nouvelle session).
    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.rate = 0.0;
        self.last_interval_ms = None;
    }

    /// Cycles par seconde sur la fenêtre.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Écart entre les deux derniers cycles.
    #[must_use]
    pub fn last_interval_ms(&self) -> Option<u64> {
        self.last_interval_ms
    }

    /// Cycles comptés depuis la création.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_meter_reports_zero() {
        let meter = CycleMeter::new(4);
        assert!(meter.rate().abs() < f64::EPSILON);
        assert_eq!(meter.last_interval_ms(), None);
    }

    #[test]
    fn window_drops_old_cycles() {
        let mut meter = CycleMeter::new(3);
        // Deux cycles lents puis une cadence régulière à 100 ms.
        for t in [0, 1000, 1100, 1200] {
            meter.tick(t);
        }
        assert!((meter.rate() - 10.0).abs() < 1e-9);
        assert_eq!(meter.total(), 4);
    }

    #[test]
    fn reset_keeps_total() {
        let mut meter = CycleMeter::new(3);
        meter.tick(0);
        meter.tick(100);
        meter.reset();
        assert_eq!(meter.last_interval_ms(), None);
        assert!(meter.rate().abs() < f64::EPSILON);
        assert_eq!(meter.total(), 2);
    }
}
