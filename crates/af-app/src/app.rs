use std::sync::Arc;
use std::time::{Duration, Instant};

use af_core::clock::{Clock, SystemClock};
use af_core::config::MosaicConfig;
use af_core::traits::{CaptureEvent, DeviceEnumerator};
use af_render::fps::CycleMeter;
use af_render::ui::{self, DeviceListView, StatusLine, UiState};
use af_render::view::MosaicView;
use anyhow::Result;
use arc_swap::ArcSwap;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;

use crate::selector::DeviceSelector;
use crate::session::{CaptureSession, SessionState};

/// Fenêtre du compteur de cadence, en cycles.
const METER_WINDOW: usize = 16;

/// État de l'interface, distinct de l'état de la session.
///
/// # Example
/// ```
/// use af_app::app::AppState;
/// let state = AppState::Running;
/// assert!(matches!(state, AppState::Running));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppState {
    /// Affichage normal.
    Running,
    /// Overlay d'aide affiché (touche ?).
    Help,
    /// Fermeture : la boucle sort au prochain tour.
    Quitting,
}

/// Application TUI : une session, la vue mosaïque, la liste des caméras.
pub struct App {
    /// Current application state.
    pub state: AppState,
    session: CaptureSession,
    /// Config publiée (hot-reload).
    config: Arc<ArcSwap<MosaicConfig>>,
    /// Config de la session en cours, comparée par pointeur à `config`.
    current: Arc<MosaicConfig>,
    enumerator: Box<dyn DeviceEnumerator>,
    selector: DeviceSelector,
    view: MosaicView,
    meter: CycleMeter,
    clock: SystemClock,
}

impl App {
    /// Construit l'app autour d'une session déjà démarrée (ou en erreur).
    pub fn new(
        session: CaptureSession,
        config: Arc<ArcSwap<MosaicConfig>>,
        enumerator: Box<dyn DeviceEnumerator>,
    ) -> Self {
        let current = Arc::clone(session.config());
        let mut selector = DeviceSelector::default();
        selector.refresh(enumerator.as_ref(), session.active_device());
        Self {
            state: AppState::Running,
            view: MosaicView::new(current.grid_size),
            session,
            config,
            current,
            enumerator,
            selector,
            meter: CycleMeter::new(METER_WINDOW),
            clock: SystemClock::new(),
        }
    }

    /// Boucle principale : événements, métadonnées, cycle, rendu.
    ///
    /// # Errors
    /// Returns an error if terminal operations fail.
    pub fn run(&mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let mut last_draw: Option<Instant> = None;

        loop {
            // === Sortie si quitting ===
            if self.state == AppState::Quitting {
                break;
            }

            self.check_config_reload();

            // === Métadonnées : repeupler la liste ===
            if let Some(event) = self.session.poll_metadata() {
                if let CaptureEvent::Failed(ref reason) = event {
                    log::warn!("Caméra indisponible : {reason}");
                }
                self.selector
                    .refresh(self.enumerator.as_ref(), self.session.active_device());
            }

            // === Cycle pipeline (cadencé par le scheduler) ===
            let now_ms = self.clock.now_ms();
            if self.session.tick(now_ms, &mut self.view) {
                self.meter.tick(now_ms);
            }

            // === Redraw à ui_fps ===
            let frame_duration = Duration::from_secs_f64(1.0 / f64::from(self.current.ui_fps));
            let redraw_due = last_draw.is_none_or(|t| t.elapsed() >= frame_duration);
            if redraw_due {
                terminal.draw(|frame| self.draw(frame))?;
                last_draw = Some(Instant::now());
            }

            // === Attente : prochain redraw ou prochain cycle, réactif aux touches ===
            let until_redraw = last_draw.map_or(Duration::ZERO, |t| {
                frame_duration.saturating_sub(t.elapsed())
            });
            let timeout = self
                .session
                .next_deadline(self.clock.now_ms())
                .map_or(until_redraw, |ms| until_redraw.min(Duration::from_millis(ms)));
            if event::poll(timeout)? {
                self.handle_event(&event::read()?);
                while event::poll(Duration::ZERO)? {
                    self.handle_event(&event::read()?);
                }
            }
        }

        self.session.teardown();
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        let state = UiState {
            status: self.status_line(),
            config: &self.current,
            devices: DeviceListView {
                devices: self.selector.devices(),
                selected: self.selector.selected_index(),
                active: self.session.active_device(),
                enabled: self.selector.is_enabled(),
                placeholder: self.selector.placeholder(),
            },
            meter: &self.meter,
            show_help: self.state == AppState::Help,
        };
        ui::draw(frame, &self.view, &state);
    }

    fn status_line(&self) -> StatusLine {
        match self.session.state() {
            SessionState::Idle => StatusLine::Idle,
            SessionState::Connecting => StatusLine::Connecting,
            SessionState::Running => StatusLine::Running,
            SessionState::Frozen => StatusLine::Frozen,
            SessionState::DeviceError(reason) => StatusLine::DeviceError(reason.clone()),
        }
    }

    /// Nouvelle config publiée : nouvelle session sur le même périphérique.
    fn check_config_reload(&mut self) {
        let latest = self.config.load_full();
        if Arc::ptr_eq(&latest, &self.current) {
            return;
        }
        match self.session.reconfigure(Arc::clone(&latest)) {
            Ok(()) => log::info!("Session redémarrée avec la nouvelle config"),
            Err(e) => log::warn!("Nouvelle config non appliquée : {e:#}"),
        }
        if Arc::ptr_eq(self.session.config(), &latest) {
            self.view.clear(latest.grid_size);
            self.meter.reset();
        }
        // Ne pas réessayer la même config à chaque tour.
        self.current = latest;
    }

    fn switch_to_selected(&mut self) {
        if !self.selector.is_enabled() {
            return;
        }
        let Some(id) = self.selector.selected().map(|d| d.id.clone()) else {
            return;
        };
        match self.session.switch_device(&id) {
            Ok(true) => {
                self.view.clear(self.current.grid_size);
                self.meter.reset();
            }
            Ok(false) => {}
            Err(e) => log::warn!("Bascule vers {id} impossible : {e}"),
        }
    }

    /// Handle a terminal event.
    fn handle_event(&mut self, event: &Event) {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = *event
        {
            if modifiers.contains(KeyModifiers::CONTROL) {
                if code == KeyCode::Char('c') {
                    self.state = AppState::Quitting;
                }
                return;
            }

            match code {
                KeyCode::Char('q') => self.state = AppState::Quitting,
                KeyCode::Esc => {
                    self.state = if self.state == AppState::Help {
                        AppState::Running
                    } else {
                        AppState::Quitting
                    };
                }
                KeyCode::Char('?') => {
                    self.state = if self.state == AppState::Help {
                        AppState::Running
                    } else {
                        AppState::Help
                    };
                }
                KeyCode::Up => self.selector.select_previous(),
                KeyCode::Down => self.selector.select_next(),
                KeyCode::Enter => self.switch_to_selected(),
                KeyCode::Char('r') => {
                    if self.session.rearm_snapshot() {
                        log::info!("Snapshot réarmé");
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use af_source::pattern::PatternBackend;

    use super::*;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app() -> App {
        let config = Arc::new(MosaicConfig {
            grid_size: 4,
            ..MosaicConfig::default()
        });
        let mut session =
            CaptureSession::new(Box::new(PatternBackend::default()), Arc::clone(&config)).unwrap();
        session.start(None).unwrap();
        session.poll_metadata();
        App::new(
            session,
            Arc::new(ArcSwap::new(config)),
            Box::new(PatternBackend::default()),
        )
    }

    #[test]
    fn selector_starts_on_active_device() {
        let app = app();
        assert_eq!(
            app.selector.selected().map(|d| d.id.as_str()),
            Some("pattern:gradient")
        );
    }

    #[test]
    fn enter_switches_to_selected_device() {
        let mut app = app();
        app.handle_event(&key(KeyCode::Down));
        app.handle_event(&key(KeyCode::Enter));
        app.session.poll_metadata();
        assert_eq!(app.session.active_device(), Some("pattern:checker"));
    }

    #[test]
    fn help_then_escape_then_quit() {
        let mut app = app();
        app.handle_event(&key(KeyCode::Char('?')));
        assert_eq!(app.state, AppState::Help);
        app.handle_event(&key(KeyCode::Esc));
        assert_eq!(app.state, AppState::Running);
        app.handle_event(&Event::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn published_config_restarts_session() {
        let mut app = app();
        let bigger = Arc::new(MosaicConfig {
            grid_size: 8,
            ..MosaicConfig::default()
        });
        app.config.store(Arc::clone(&bigger));
        app.check_config_reload();
        assert!(Arc::ptr_eq(app.session.config(), &bigger));
        assert_eq!(app.view.grid().size(), 8);
        assert!(app.session.is_open());
    }
}
