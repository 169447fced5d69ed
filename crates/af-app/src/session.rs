use std::sync::Arc;

use af_ascii::compositor::Compositor;
use af_core::charset::SymbolTable;
use af_core::config::{CaptureFlow, MosaicConfig};
use af_core::error::{CaptureError, CoreError};
use af_core::traits::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureMetadata, CaptureRequest,
    MetadataSubscription, Renderer,
};

use crate::scheduler::FrameScheduler;

/// Attente entre deux vérifications quand le cycle est dû mais le frame absent.
pub const FRAME_WAIT_MS: u64 = 5;

/// État observable d'une session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Aucun flux ouvert.
    Idle,
    /// Flux ouvert, en attente des métadonnées.
    Connecting,
    /// Métadonnées reçues, scheduler armé.
    Running,
    /// Snapshot rendu, scheduler arrêté, flux toujours ouvert.
    Frozen,
    /// Acquisition impossible ; aucun rendu jusqu'au prochain périphérique.
    DeviceError(String),
}

/// Une session de capture : flux, scheduler, compositor, périphérique actif.
///
/// Possède exclusivement le handle de capture. Fermeture toujours dans le
/// même ordre : arrêt du scheduler, puis `close()` du handle. Vaut pour
/// `teardown`, le changement de périphérique et `Drop`.
///
/// Boucle hôte type : `poll_metadata()` puis `tick()` à chaque tour.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use af_app::session::{CaptureSession, SessionState};
/// use af_core::charset::SymbolTable;
/// use af_core::config::MosaicConfig;
/// use af_core::frame::LevelGrid;
/// use af_core::traits::Renderer;
/// use af_source::pattern::{Pattern, PatternBackend};
///
/// struct Count(u32);
/// impl Renderer for Count {
///     fn render(&mut self, _: &LevelGrid, _: &SymbolTable) { self.0 += 1; }
/// }
///
/// let config = Arc::new(MosaicConfig { grid_size: 8, ..MosaicConfig::default() });
/// let mut session =
///     CaptureSession::new(Box::new(PatternBackend::new(Pattern::Pulse)), config).unwrap();
/// session.start(None).unwrap();
/// session.poll_metadata();
/// assert_eq!(*session.state(), SessionState::Running);
///
/// let mut count = Count(0);
/// assert!(session.tick(0, &mut count));
/// assert!(!session.tick(10, &mut count));
/// assert_eq!(count.0, 1);
/// ```
pub struct CaptureSession {
    backend: Box<dyn CaptureBackend>,
    config: Arc<MosaicConfig>,
    symbols: SymbolTable,
    compositor: Compositor,
    scheduler: FrameScheduler,
    handle: Option<Box<dyn CaptureHandle>>,
    subscription: Option<MetadataSubscription>,
    requested_device: Option<String>,
    active_device: Option<String>,
    metadata: Option<CaptureMetadata>,
    state: SessionState,
}

impl CaptureSession {
    /// Nouvelle session, inactive jusqu'à `start`.
    ///
    /// # Errors
    /// Returns a [`CoreError`] if `config` fails validation.
    pub fn new(backend: Box<dyn CaptureBackend>, config: Arc<MosaicConfig>) -> Result<Self, CoreError> {
        config.validate()?;
        let symbols = config.symbol_table()?;
        Ok(Self {
            backend,
            compositor: Compositor::from_config(&config),
            scheduler: FrameScheduler::new(config.update_interval_ms),
            symbols,
            config,
            handle: None,
            subscription: None,
            requested_device: None,
            active_device: None,
            metadata: None,
            state: SessionState::Idle,
        })
    }

    /// Ouvre `device` (défaut du backend si `None`).
    ///
    /// Le flux précédent, s'il existe, est entièrement fermé avant l'ouverture.
    ///
    /// # Errors
    /// Returns the backend's [`CaptureError`]; the session is then in
    /// [`SessionState::DeviceError`] with no open handle.
    pub fn start(&mut self, device: Option<String>) -> Result<(), CaptureError> {
        self.release();
        self.metadata = None;
        self.active_device = None;
        self.requested_device.clone_from(&device);

        let (width, height) = self.config.capture_size();
        let request = CaptureRequest {
            width,
            height,
            device_id: device,
        };
        match self.backend.open(&request) {
            Ok(mut handle) => {
                self.subscription = handle.subscribe();
                self.handle = Some(handle);
                self.state = SessionState::Connecting;
                log::info!(
                    "Session : flux ouvert ({})",
                    self.requested_device.as_deref().unwrap_or("défaut")
                );
                if self.subscription.is_none() {
                    // Pas de métadonnées annoncées : considéré prêt.
                    self.on_ready(None);
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("Session : ouverture impossible : {e}");
                self.state = SessionState::DeviceError(e.to_string());
                Err(e)
            }
        }
    }

    /// Bascule sur `device_id`. Retourne `Ok(false)` si c'est déjà l'actif.
    ///
    /// # Errors
    /// Same as [`CaptureSession::start`]. The previous handle is released
    /// whatever the outcome.
    pub fn switch_device(&mut self, device_id: &str) -> Result<bool, CaptureError> {
        if self.handle.is_some() && self.active_device.as_deref() == Some(device_id) {
            log::debug!("Session : {device_id} déjà actif");
            return Ok(false);
        }
        log::info!("Session : bascule vers {device_id}");
        self.start(Some(device_id.to_string()))?;
        Ok(true)
    }

    /// Nouvelle config : tout est reconstruit, même périphérique.
    ///
    /// # Errors
    /// [`CoreError`] si la config est invalide (la session courante est alors
    /// conservée telle quelle), sinon l'éventuelle erreur de réouverture.
    pub fn reconfigure(&mut self, config: Arc<MosaicConfig>) -> anyhow::Result<()> {
        config.validate()?;
        let symbols = config.symbol_table()?;
        let device = self
            .active_device
            .clone()
            .or_else(|| self.requested_device.clone())
            .or_else(|| config.device.clone());
        let was_open = self.handle.is_some() || matches!(self.state, SessionState::DeviceError(_));

        self.release();
        self.compositor = Compositor::from_config(&config);
        self.scheduler = FrameScheduler::new(config.update_interval_ms);
        self.symbols = symbols;
        self.config = config;
        self.state = SessionState::Idle;
        log::info!("Session reconfigurée ({0}×{0})", self.config.grid_size);

        if was_open {
            self.start(device)?;
        }
        Ok(())
    }

    /// Résout la souscription aux métadonnées si l'événement est arrivé.
    ///
    /// Rend l'événement une seule fois. `Ready` arme le scheduler, `Failed`
    /// libère le flux et passe en erreur.
    pub fn poll_metadata(&mut self) -> Option<CaptureEvent> {
        let sub = self.subscription.as_mut()?;
        let event = sub.poll();
        if event.is_none() {
            if sub.is_finished() {
                // Publisher disparu sans rien dire.
                self.subscription = None;
                self.fail("flux fermé sans métadonnées".to_string());
            }
            return None;
        }
        self.subscription = None;
        match &event {
            Some(CaptureEvent::Ready(meta)) => self.on_ready(Some(meta.clone())),
            Some(CaptureEvent::Failed(reason)) => self.fail(reason.clone()),
            None => {}
        }
        event
    }

    /// Un tour de boucle : cycle complet si le scheduler le permet.
    ///
    /// Retourne `true` si une grille a été rendue.
    pub fn tick(&mut self, now_ms: u64, renderer: &mut dyn Renderer) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        let ready = handle.is_frame_ready();
        let compositor = &mut self.compositor;
        let symbols = &self.symbols;

        let rendered = self.scheduler.tick(now_ms, ready, || {
            let Some(frame) = handle.read_frame() else {
                log::trace!("Cycle sauté : frame annoncé mais absent");
                return false;
            };
            renderer.render(compositor.process(&frame), symbols);
            true
        });

        if rendered && self.config.capture_flow == CaptureFlow::Snapshot {
            self.scheduler.stop();
            self.state = SessionState::Frozen;
            log::info!("Snapshot rendu, scheduler arrêté");
        }
        rendered
    }

    /// Relance un snapshot. Sans effet hors de [`SessionState::Frozen`].
    pub fn rearm_snapshot(&mut self) -> bool {
        if self.state != SessionState::Frozen || self.handle.is_none() {
            return false;
        }
        self.scheduler.rearm();
        self.state = SessionState::Running;
        true
    }

    /// Ferme le flux. Idempotent.
    pub fn teardown(&mut self) {
        self.release();
        self.state = SessionState::Idle;
    }

    /// Millisecondes avant le prochain cycle possible, `None` si aucun prévu.
    ///
    /// Cycle dû mais aucun frame arrivé : [`FRAME_WAIT_MS`], jamais 0.
    #[must_use]
    pub fn next_deadline(&self, now_ms: u64) -> Option<u64> {
        let handle = self.handle.as_ref()?;
        match self.scheduler.next_deadline(now_ms)? {
            0 if !handle.is_frame_ready() => Some(FRAME_WAIT_MS),
            ms => Some(ms),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Périphérique actif, connu après `Ready`.
    #[must_use]
    pub fn active_device(&self) -> Option<&str> {
        self.active_device.as_deref()
    }

    /// Dernières métadonnées reçues.
    #[must_use]
    pub fn metadata(&self) -> Option<&CaptureMetadata> {
        self.metadata.as_ref()
    }

    /// Config de la session.
    #[must_use]
    pub fn config(&self) -> &Arc<MosaicConfig> {
        &self.config
    }

    /// `true` while a capture handle is held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Cycles complétés depuis la dernière (re)configuration.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.compositor.cycles()
    }

    fn on_ready(&mut self, meta: Option<CaptureMetadata>) {
        self.active_device = meta
            .as_ref()
            .and_then(|m| m.device_id.clone())
            .or_else(|| self.requested_device.clone());
        if let Some(m) = &meta {
            log::info!(
                "Flux prêt : {} {}x{}",
                self.active_device.as_deref().unwrap_or("défaut"),
                m.width,
                m.height
            );
        }
        self.metadata = meta;
        self.state = SessionState::Running;
        self.scheduler.rearm();
    }

    fn fail(&mut self, reason: String) {
        log::warn!("Capture en échec : {reason}");
        self.release();
        self.state = SessionState::DeviceError(reason);
    }

    /// Arrêt du scheduler PUIS fermeture du handle.
    fn release(&mut self) {
        self.scheduler.stop();
        self.subscription = None;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            log::debug!("Session : handle fermé");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use af_core::frame::{FrameBuffer, LevelGrid};
    use af_core::traits::MetadataPublisher;

    use super::*;

    /// Compteurs partagés entre le backend mock et le test.
    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        max_open: AtomicUsize,
        log: Mutex<Vec<String>>,
    }

    impl Counters {
        fn open_now(&self) -> usize {
            self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
        }
    }

    /// Comment le mock résout les métadonnées.
    #[derive(Clone, Copy, PartialEq)]
    enum Resolve {
        Ready,
        Fail,
        Pending,
    }

    struct MockBackend {
        counters: Arc<Counters>,
        fail_open: Vec<String>,
        resolve: Resolve,
        pending: Arc<Mutex<Option<MetadataPublisher>>>,
        frame: u8,
        starved: bool,
    }

    impl MockBackend {
        fn new(counters: &Arc<Counters>) -> Self {
            Self {
                counters: Arc::clone(counters),
                fail_open: Vec::new(),
                resolve: Resolve::Ready,
                pending: Arc::new(Mutex::new(None)),
                frame: 255,
                starved: false,
            }
        }
    }

    impl CaptureBackend for MockBackend {
        fn open(&mut self, req: &CaptureRequest) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            let id = req.device_id.clone().unwrap_or_else(|| "cam0".into());
            if self.fail_open.contains(&id) {
                return Err(CaptureError::DeviceNotFound(id));
            }
            let c = &self.counters;
            c.opened.fetch_add(1, Ordering::SeqCst);
            c.max_open.fetch_max(c.open_now(), Ordering::SeqCst);
            c.log.lock().unwrap().push(format!("open {id}"));

            let (publisher, subscription) = MetadataSubscription::channel();
            match self.resolve {
                Resolve::Ready => publisher.publish(CaptureEvent::Ready(CaptureMetadata {
                    device_id: Some(id.clone()),
                    width: req.width,
                    height: req.height,
                })),
                Resolve::Fail => publisher.publish(CaptureEvent::Failed("busy".into())),
                Resolve::Pending => *self.pending.lock().unwrap() = Some(publisher),
            }
            let v = self.frame;
            Ok(Box::new(MockHandle {
                counters: Arc::clone(&self.counters),
                id,
                frame: Arc::new(FrameBuffer::solid(req.width, req.height, v, v, v)),
                subscription: Some(subscription),
                closed: false,
                starved: self.starved,
            }))
        }
    }

    struct MockHandle {
        counters: Arc<Counters>,
        id: String,
        frame: Arc<FrameBuffer>,
        subscription: Option<MetadataSubscription>,
        closed: bool,
        starved: bool,
    }

    impl CaptureHandle for MockHandle {
        fn is_frame_ready(&self) -> bool {
            !self.closed && !self.starved
        }

        fn read_frame(&mut self) -> Option<Arc<FrameBuffer>> {
            (!self.closed).then(|| Arc::clone(&self.frame))
        }

        fn subscribe(&mut self) -> Option<MetadataSubscription> {
            self.subscription.take()
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
                self.counters.log.lock().unwrap().push(format!("close {}", self.id));
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        grids: Vec<LevelGrid>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, grid: &LevelGrid, _symbols: &SymbolTable) {
            self.grids.push(grid.clone());
        }
    }

    fn config(flow: CaptureFlow) -> Arc<MosaicConfig> {
        Arc::new(MosaicConfig {
            grid_size: 4,
            capture_flow: flow,
            ..MosaicConfig::default()
        })
    }

    fn session(backend: MockBackend, flow: CaptureFlow) -> CaptureSession {
        CaptureSession::new(Box::new(backend), config(flow)).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let counters = Arc::new(Counters::default());
        let bad = Arc::new(MosaicConfig {
            level_count: 3,
            ..MosaicConfig::default()
        });
        assert!(CaptureSession::new(Box::new(MockBackend::new(&counters)), bad).is_err());
    }

    #[test]
    fn ready_metadata_arms_scheduler_and_records_device() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Continuous);
        s.start(None).unwrap();
        assert_eq!(*s.state(), SessionState::Connecting);

        let mut r = Recorder::default();
        assert!(!s.tick(0, &mut r), "no cycle before metadata");

        assert!(matches!(s.poll_metadata(), Some(CaptureEvent::Ready(_))));
        assert!(s.poll_metadata().is_none());
        assert_eq!(*s.state(), SessionState::Running);
        assert_eq!(s.active_device(), Some("cam0"));

        assert!(s.tick(0, &mut r));
        assert!(!s.tick(100, &mut r));
        assert!(s.tick(150, &mut r));
        assert_eq!(r.grids.len(), 2);
        assert!(r.grids[0].levels().all(|l| l == 4));
    }

    #[test]
    fn device_switch_closes_old_handle_exactly_once_before_opening() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Continuous);
        s.start(Some("cam0".into())).unwrap();
        s.poll_metadata();

        assert!(s.switch_device("cam1").unwrap());
        s.poll_metadata();
        assert_eq!(s.active_device(), Some("cam1"));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.max_open.load(Ordering::SeqCst), 1);
        assert_eq!(
            *counters.log.lock().unwrap(),
            ["open cam0", "close cam0", "open cam1"]
        );

        drop(s);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
        assert_eq!(counters.open_now(), 0);
    }

    #[test]
    fn switching_to_active_device_is_a_noop() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Continuous);
        s.start(Some("cam0".into())).unwrap();
        s.poll_metadata();
        assert!(!s.switch_device("cam0").unwrap());
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_switch_releases_old_handle_and_never_renders() {
        let counters = Arc::new(Counters::default());
        let mut backend = MockBackend::new(&counters);
        backend.fail_open.push("cam1".into());
        let mut s = session(backend, CaptureFlow::Continuous);
        s.start(Some("cam0".into())).unwrap();
        s.poll_metadata();

        assert!(s.switch_device("cam1").is_err());
        assert!(matches!(s.state(), SessionState::DeviceError(_)));
        assert!(!s.is_open());
        assert_eq!(counters.open_now(), 0);

        let mut r = Recorder::default();
        assert!(!s.tick(1_000, &mut r));
        assert!(r.grids.is_empty());
        assert_eq!(s.next_deadline(1_000), None);
    }

    #[test]
    fn failed_metadata_enters_device_error_and_releases() {
        let counters = Arc::new(Counters::default());
        let mut backend = MockBackend::new(&counters);
        backend.resolve = Resolve::Fail;
        let mut s = session(backend, CaptureFlow::Continuous);
        s.start(None).unwrap();
        assert_eq!(
            s.poll_metadata(),
            Some(CaptureEvent::Failed("busy".into()))
        );
        assert_eq!(*s.state(), SessionState::DeviceError("busy".into()));
        assert_eq!(counters.open_now(), 0);
    }

    #[test]
    fn dropped_publisher_is_a_failure() {
        let counters = Arc::new(Counters::default());
        let mut backend = MockBackend::new(&counters);
        backend.resolve = Resolve::Pending;
        let pending = Arc::clone(&backend.pending);
        let mut s = session(backend, CaptureFlow::Continuous);
        s.start(None).unwrap();
        assert!(s.poll_metadata().is_none());
        assert_eq!(*s.state(), SessionState::Connecting);

        pending.lock().unwrap().take();
        assert!(s.poll_metadata().is_none());
        assert!(matches!(s.state(), SessionState::DeviceError(_)));
        assert!(!s.is_open());
    }

    #[test]
    fn snapshot_flow_renders_once_until_rearmed() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Snapshot);
        s.start(None).unwrap();
        s.poll_metadata();

        let mut r = Recorder::default();
        assert!(s.tick(0, &mut r));
        assert_eq!(*s.state(), SessionState::Frozen);
        assert!(!s.tick(10_000, &mut r));
        assert_eq!(s.next_deadline(10_000), None);
        assert!(s.is_open());

        assert!(s.rearm_snapshot());
        assert!(s.tick(10_001, &mut r));
        assert_eq!(r.grids.len(), 2);
        assert_eq!(*s.state(), SessionState::Frozen);
    }

    #[test]
    fn teardown_stops_then_closes_and_is_idempotent() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Continuous);
        s.start(None).unwrap();
        s.poll_metadata();
        s.teardown();
        s.teardown();
        assert_eq!(*s.state(), SessionState::Idle);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        let mut r = Recorder::default();
        assert!(!s.tick(0, &mut r));
    }

    #[test]
    fn reconfigure_reopens_same_device_with_new_grid() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Continuous);
        s.start(Some("cam3".into())).unwrap();
        s.poll_metadata();

        let bigger = Arc::new(MosaicConfig {
            grid_size: 8,
            ..MosaicConfig::default()
        });
        s.reconfigure(bigger).unwrap();
        s.poll_metadata();
        assert_eq!(s.active_device(), Some("cam3"));
        assert_eq!(s.metadata().map(|m| m.width), Some(8));
        assert_eq!(counters.max_open.load(Ordering::SeqCst), 1);

        let mut r = Recorder::default();
        assert!(s.tick(0, &mut r));
        assert_eq!(r.grids[0].size(), 8);

        let invalid = Arc::new(MosaicConfig {
            symbols: "ab".into(),
            ..MosaicConfig::default()
        });
        assert!(s.reconfigure(invalid).is_err());
        assert!(s.is_open(), "invalid config keeps the running session");
    }

    #[test]
    fn dark_frames_render_darkest_level() {
        let counters = Arc::new(Counters::default());
        let mut backend = MockBackend::new(&counters);
        backend.frame = 0;
        let mut s = session(backend, CaptureFlow::Continuous);
        s.start(None).unwrap();
        s.poll_metadata();
        let mut r = Recorder::default();
        s.tick(0, &mut r);
        assert!(r.grids[0].levels().all(|l| l == 0));
        assert_eq!(s.cycles(), 1);
    }

    #[test]
    fn due_cycle_without_frame_waits_instead_of_spinning() {
        let counters = Arc::new(Counters::default());
        let mut backend = MockBackend::new(&counters);
        backend.starved = true;
        let mut s = session(backend, CaptureFlow::Continuous);
        s.start(None).unwrap();
        s.poll_metadata();

        let mut r = Recorder::default();
        for now in [0, 150, 151, 500, 10_000] {
            assert!(!s.tick(now, &mut r));
            assert_eq!(s.next_deadline(now), Some(FRAME_WAIT_MS));
        }
        assert!(r.grids.is_empty());
    }

    #[test]
    fn deadline_counts_down_after_a_cycle() {
        let counters = Arc::new(Counters::default());
        let mut s = session(MockBackend::new(&counters), CaptureFlow::Continuous);
        s.start(None).unwrap();
        s.poll_metadata();
        let mut r = Recorder::default();
        assert!(s.tick(0, &mut r));
        assert_eq!(s.next_deadline(100), Some(50));
        assert_eq!(s.next_deadline(150), Some(0));
    }
}
