use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use af_core::clock::Clock;
use af_core::traits::Renderer;
use anyhow::Result;

use crate::session::{CaptureSession, SessionState};

/// Pas d'attente quand rien n'est planifié (métadonnées en vol).
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Boucle sans terminal pour `--once` et `--plain`.
///
/// Tourne jusqu'à `max_renders` grilles, l'arrêt demandé via `stop`, ou le
/// dépassement de `open_timeout` sans premier rendu. La session est démarrée
/// par l'appelant.
///
/// # Errors
/// Returns an error when capture fails or no grid arrives within `open_timeout`.
pub fn run_headless(
    session: &mut CaptureSession,
    renderer: &mut dyn Renderer,
    clock: &dyn Clock,
    stop: &AtomicBool,
    max_renders: Option<u64>,
    open_timeout: Duration,
) -> Result<u64> {
    let started = clock.now_ms();
    let timeout_ms = u64::try_from(open_timeout.as_millis()).unwrap_or(u64::MAX);
    let mut renders = 0u64;

    while !stop.load(Ordering::Relaxed) {
        session.poll_metadata();
        if let SessionState::DeviceError(reason) = session.state() {
            anyhow::bail!("Capture indisponible : {reason}");
        }

        let now = clock.now_ms();
        if session.tick(now, renderer) {
            renders += 1;
            if max_renders.is_some_and(|max| renders >= max) {
                break;
            }
        } else if renders == 0 && now.saturating_sub(started) > timeout_ms {
            anyhow::bail!("Aucun frame reçu après {} ms", open_timeout.as_millis());
        }

        let wait = session
            .next_deadline(clock.now_ms())
            .map_or(IDLE_POLL, |ms| Duration::from_millis(ms.clamp(1, 50)));
        std::thread::sleep(wait);
    }

    session.teardown();
    Ok(renders)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use af_core::clock::SystemClock;
    use af_core::config::MosaicConfig;
    use af_render::text::TextRenderer;
    use af_source::pattern::{Pattern, PatternBackend};

    use super::*;

    fn pattern_session(pattern: Pattern, interval: u64) -> CaptureSession {
        let config = Arc::new(MosaicConfig {
            grid_size: 4,
            update_interval_ms: interval,
            ..MosaicConfig::default()
        });
        CaptureSession::new(Box::new(PatternBackend::new(pattern)), config).unwrap()
    }

    #[test]
    fn once_prints_a_single_grid() {
        let mut session = pattern_session(Pattern::Pulse, 150);
        session.start(None).unwrap();
        let mut out = TextRenderer::new(Vec::new());
        let stop = AtomicBool::new(false);
        let n = run_headless(
            &mut session,
            &mut out,
            &SystemClock::new(),
            &stop,
            Some(1),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(n, 1);
        assert!(!session.is_open());
        // Pulse frame 0 : noir partout.
        assert_eq!(out.into_inner(), b"@@@@\n@@@@\n@@@@\n@@@@\n");
    }

    #[test]
    fn stop_flag_ends_the_stream() {
        let mut session = pattern_session(Pattern::Noise, 1);
        session.start(None).unwrap();
        let mut out = TextRenderer::new(Vec::new());
        let stop = AtomicBool::new(true);
        let n = run_headless(
            &mut session,
            &mut out,
            &SystemClock::new(),
            &stop,
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn unknown_device_is_reported() {
        let mut session = pattern_session(Pattern::Noise, 1);
        assert!(session.start(Some("pattern:plasma".into())).is_err());
        let mut out = TextRenderer::new(Vec::new());
        let stop = AtomicBool::new(false);
        let result = run_headless(
            &mut session,
            &mut out,
            &SystemClock::new(),
            &stop,
            Some(1),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
