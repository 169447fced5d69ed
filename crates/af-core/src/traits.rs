use std::sync::Arc;

use crate::charset::SymbolTable;
use crate::error::CaptureError;
use crate::frame::{FrameBuffer, LevelGrid};

/// Paramètres d'ouverture d'un flux de capture.
///
/// # Example
/// ```
/// use af_core::traits::CaptureRequest;
/// let req = CaptureRequest::square(64, None);
/// assert_eq!((req.width, req.height), (64, 64));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Largeur des frames livrées.
    pub width: u32,
    /// Hauteur des frames livrées.
    pub height: u32,
    /// Périphérique demandé. `None` = défaut (caméra frontale).
    pub device_id: Option<String>,
}

impl CaptureRequest {
    /// Request `size × size` frames.
    #[must_use]
    pub fn square(size: u32, device_id: Option<String>) -> Self {
        Self {
            width: size,
            height: size,
            device_id,
        }
    }
}

/// Métadonnées connues une fois le flux réellement démarré.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureMetadata {
    /// Identifiant effectif du périphérique, si la source le connaît.
    pub device_id: Option<String>,
    /// Largeur effective.
    pub width: u32,
    /// Hauteur effective.
    pub height: u32,
}

/// Issue unique de l'ouverture asynchrone d'un flux.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Premier frame reçu, métadonnées disponibles.
    Ready(CaptureMetadata),
    /// Le flux s'est arrêté avant de livrer un frame.
    Failed(String),
}

/// Côté émetteur d'une souscription one-shot. `publish` consomme l'émetteur.
pub struct MetadataPublisher {
    tx: flume::Sender<CaptureEvent>,
}

impl MetadataPublisher {
    /// Deliver the single event. A dropped subscriber is ignored.
    pub fn publish(self, event: CaptureEvent) {
        let _ = self.tx.send(event);
    }
}

/// Souscription one-shot aux métadonnées d'un flux.
///
/// Livre au plus un [`CaptureEvent`], puis plus rien. Un handle ne rend sa
/// souscription qu'une fois (`Option::take`), donc s'abonner deux fois est un
/// no-op par construction.
///
/// # Example
/// ```
/// use af_core::traits::{CaptureEvent, MetadataSubscription};
/// let (publisher, mut sub) = MetadataSubscription::channel();
/// assert_eq!(sub.poll(), None);
/// publisher.publish(CaptureEvent::Failed("busy".into()));
/// assert_eq!(sub.poll(), Some(CaptureEvent::Failed("busy".into())));
/// assert_eq!(sub.poll(), None);
/// assert!(sub.is_finished());
/// ```
pub struct MetadataSubscription {
    rx: Option<flume::Receiver<CaptureEvent>>,
}

impl MetadataSubscription {
    /// Create a connected publisher/subscription pair.
    #[must_use]
    pub fn channel() -> (MetadataPublisher, Self) {
        let (tx, rx) = flume::bounded(1);
        (MetadataPublisher { tx }, Self { rx: Some(rx) })
    }

    /// Non-blocking poll. Returns the event exactly once.
    pub fn poll(&mut self) -> Option<CaptureEvent> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(event) => {
                self.rx = None;
                Some(event)
            }
            Err(flume::TryRecvError::Empty) => None,
            Err(flume::TryRecvError::Disconnected) => {
                self.rx = None;
                None
            }
        }
    }

    /// `true` once the event was delivered or the publisher went away.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.rx.is_none()
    }
}

/// Handle exclusif sur un flux de capture ouvert.
///
/// Implémenté par : `CameraCapture`, `StillCapture`, `PatternCapture`.
pub trait CaptureHandle {
    /// `true` si un frame non consommé est disponible.
    fn is_frame_ready(&self) -> bool;

    /// Consomme le frame le plus récent. `None` si aucun n'est prêt.
    fn read_frame(&mut self) -> Option<Arc<FrameBuffer>>;

    /// Rend la souscription aux métadonnées la première fois, `None` ensuite.
    fn subscribe(&mut self) -> Option<MetadataSubscription>;

    /// Libère les ressources matérielles. Idempotent.
    fn close(&mut self);
}

/// Ouvre des flux de capture.
///
/// # Example
/// ```
/// use af_core::error::CaptureError;
/// use af_core::traits::{CaptureBackend, CaptureHandle, CaptureRequest};
///
/// struct NoCamera;
/// impl CaptureBackend for NoCamera {
///     fn open(&mut self, _req: &CaptureRequest) -> Result<Box<dyn CaptureHandle>, CaptureError> {
///         Err(CaptureError::PermissionDenied)
///     }
/// }
/// ```
pub trait CaptureBackend {
    /// Ouvre un flux conforme à `request`.
    ///
    /// # Errors
    /// Returns a [`CaptureError`] when the device cannot be acquired.
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// Entrée vidéo listée par l'énumérateur.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Identifiant passé à [`CaptureRequest::device_id`].
    pub id: String,
    /// Libellé lisible, peut être vide.
    pub label: String,
}

/// Liste les entrées vidéo. Sert uniquement à la surface de sélection.
pub trait DeviceEnumerator {
    /// Ordered list of video inputs. Unsupported platforms return an empty list.
    ///
    /// # Errors
    /// Returns a [`CaptureError`] if the platform query itself fails.
    fn list_video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError>;
}

/// Matérialise une grille de niveaux terminée.
///
/// Appelé une fois par cycle complet, jamais en concurrence avec lui-même.
///
/// # Example
/// ```
/// use af_core::charset::SymbolTable;
/// use af_core::frame::LevelGrid;
/// use af_core::traits::Renderer;
///
/// struct Count(usize);
/// impl Renderer for Count {
///     fn render(&mut self, _grid: &LevelGrid, _symbols: &SymbolTable) { self.0 += 1; }
/// }
/// ```
pub trait Renderer {
    /// Consume a fully populated grid.
    fn render(&mut self, grid: &LevelGrid, symbols: &SymbolTable);
}
