/// Cadenceur du pipeline : au plus un cycle par intervalle.
///
/// Indépendant du rythme de la capture et de l'affichage : la boucle hôte
/// appelle `tick` aussi souvent qu'elle veut, le cycle ne tourne que si
/// l'intervalle est écoulé ET qu'un frame frais est prêt. Pas d'état global,
/// un scheduler par session.
///
/// # Example
/// ```
/// use af_app::scheduler::FrameScheduler;
///
/// let mut scheduler = FrameScheduler::new(150);
/// scheduler.start();
/// let runs: Vec<u64> = [0, 50, 100, 160, 200]
///     .into_iter()
///     .filter(|&t| scheduler.tick(t, true, || true))
///     .collect();
/// assert_eq!(runs, [0, 160]);
/// ```
#[derive(Clone, Debug)]
pub struct FrameScheduler {
    interval_ms: u64,
    /// `None` = jamais exécuté : le premier tick éligible passe.
    last_update: Option<u64>,
    armed: bool,
}

impl FrameScheduler {
    /// Disarmed scheduler with the given interval (at least 1 ms).
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            last_update: None,
            armed: false,
        }
    }

    /// Arme le scheduler. Idempotent.
    pub fn start(&mut self) {
        self.armed = true;
    }

    /// Désarme le scheduler. Idempotent ; aucun cycle ne tourne ensuite.
    pub fn stop(&mut self) {
        self.armed = false;
    }

    /// Réarme et oublie le dernier passage : le prochain tick avec frame tourne.
    pub fn rearm(&mut self) {
        self.last_update = None;
        self.armed = true;
    }

    /// `true` between `start` and `stop`.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Intervalle minimal entre deux cycles.
    #[must_use]
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Horodatage du dernier cycle ayant produit une grille.
    #[must_use]
    pub fn last_update(&self) -> Option<u64> {
        self.last_update
    }

    /// `true` si l'intervalle est écoulé à `now_ms`.
    ///
    /// Une horloge qui recule donne un écart nul : pas de cycle.
    #[must_use]
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_update {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Fait tourner `cycle` si armé, dû et `frame_ready`.
    ///
    /// `cycle` rend `true` quand il a produit une grille ; seul ce cas avance
    /// `last_update`. Retourne ce que `cycle` a rendu, `false` s'il n'a pas
    /// été appelé.
    pub fn tick(&mut self, now_ms: u64, frame_ready: bool, cycle: impl FnOnce() -> bool) -> bool {
        if !self.armed || !frame_ready || !self.is_due(now_ms) {
            return false;
        }
        let produced = cycle();
        if produced {
            self.last_update = Some(self.last_update.map_or(now_ms, |last| last.max(now_ms)));
        }
        produced
    }

    /// Temps restant avant le prochain tick éligible, `None` si désarmé.
    ///
    /// # Example
    /// ```
    /// use af_app::scheduler::FrameScheduler;
    /// let mut s = FrameScheduler::new(150);
    /// assert_eq!(s.next_deadline(0), None);
    /// s.start();
    /// assert_eq!(s.next_deadline(0), Some(0));
    /// s.tick(0, true, || true);
    /// assert_eq!(s.next_deadline(100), Some(50));
    /// ```
    #[must_use]
    pub fn next_deadline(&self, now_ms: u64) -> Option<u64> {
        if !self.armed {
            return None;
        }
        Some(match self.last_update {
            None => 0,
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                self.interval_ms.saturating_sub(elapsed)
            }
        })
    }
}
