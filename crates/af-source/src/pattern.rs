use std::sync::Arc;

use af_core::error::CaptureError;
use af_core::frame::FrameBuffer;
use af_core::traits::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureMetadata, CaptureRequest, DeviceEnumerator,
    DeviceInfo, MetadataSubscription,
};

/// Préfixe des identifiants de mire (`pattern:gradient`, …).
pub const PATTERN_PREFIX: &str = "pattern:";

/// Mire synthétique, déterministe frame par frame.
///
/// # Example
/// ```
/// use af_source::pattern::Pattern;
/// assert_eq!(Pattern::parse("checker"), Some(Pattern::Checker));
/// assert_eq!(Pattern::parse("pattern:noise"), Some(Pattern::Noise));
/// assert_eq!(Pattern::Gradient.device_id(), "pattern:gradient");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// Rampe horizontale noir → blanc qui défile.
    Gradient,
    /// Damier 8×8 dont la phase s'inverse toutes les 16 frames.
    Checker,
    /// Gris uniforme en dent de scie 0 → 255 → 0.
    Pulse,
    /// Bruit blanc LCG, graine = numéro de frame.
    Noise,
}

impl Pattern {
    /// Toutes les mires, dans l'ordre d'énumération.
    pub const ALL: [Self; 4] = [Self::Gradient, Self::Checker, Self::Pulse, Self::Noise];

    /// Short name used on the CLI.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::Checker => "checker",
            Self::Pulse => "pulse",
            Self::Noise => "noise",
        }
    }

    /// Accepte le nom court ou l'identifiant préfixé.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.strip_prefix(PATTERN_PREFIX).unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Identifiant de périphérique de la mire.
    #[must_use]
    pub fn device_id(self) -> String {
        format!("{PATTERN_PREFIX}{}", self.name())
    }

    /// Remplit `frame` pour la frame numéro `n`.
    pub fn fill(self, frame: &mut FrameBuffer, n: u64) {
        let w = frame.width.max(1) as usize;
        let h = frame.height.max(1) as usize;
        match self {
            Self::Gradient => {
                let shift = (n % w as u64) as usize;
                for (i, px) in frame.data.chunks_exact_mut(4).enumerate() {
                    let x = (i % w + shift) % w;
                    let v = (x * 255 / (w - 1).max(1)) as u8;
                    px.copy_from_slice(&[v, v, v, 255]);
                }
            }
            Self::Checker => {
                let cell_w = (w / 8).max(1);
                let cell_h = (h / 8).max(1);
                let phase = ((n / 16) % 2) as usize;
                for (i, px) in frame.data.chunks_exact_mut(4).enumerate() {
                    let (x, y) = (i % w, i / w);
                    let v = if (x / cell_w + y / cell_h + phase) % 2 == 0 {
                        0
                    } else {
                        255
                    };
                    px.copy_from_slice(&[v, v, v, 255]);
                }
            }
            Self::Pulse => {
                let t = (n % 64) as u32;
                let tri = if t < 32 { t } else { 63 - t };
                let v = (tri * 255 / 31) as u8;
                for px in frame.data.chunks_exact_mut(4) {
                    px.copy_from_slice(&[v, v, v, 255]);
                }
            }
            Self::Noise => {
                let mut state = n.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
                for px in frame.data.chunks_exact_mut(4) {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    let [r, g, b, ..] = (state >> 32).to_le_bytes();
                    px.copy_from_slice(&[r, g, b, 255]);
                }
            }
        }
    }
}

/// Backend de mires : une caméra virtuelle par [`Pattern`].
///
/// # Example
/// ```
/// use af_core::traits::{CaptureBackend, CaptureRequest};
/// use af_source::pattern::{Pattern, PatternBackend};
///
/// let mut backend = PatternBackend::new(Pattern::Pulse);
/// let mut handle = backend.open(&CaptureRequest::square(16, None)).unwrap();
/// let frame = handle.read_frame().unwrap();
/// assert_eq!(frame.width, 16);
/// ```
pub struct PatternBackend {
    default: Pattern,
}

impl PatternBackend {
    /// Backend opening `default` when no device is requested.
    #[must_use]
    pub fn new(default: Pattern) -> Self {
        Self { default }
    }
}

impl Default for PatternBackend {
    fn default() -> Self {
        Self::new(Pattern::Gradient)
    }
}

impl CaptureBackend for PatternBackend {
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let pattern = match &request.device_id {
            Some(id) => Pattern::parse(id).ok_or_else(|| CaptureError::DeviceNotFound(id.clone()))?,
            None => self.default,
        };
        if request.width == 0 || request.height == 0 {
            return Err(CaptureError::StreamFailed(format!(
                "résolution demandée invalide {}×{}",
                request.width, request.height
            )));
        }
        log::info!(
            "Mire {} {}x{}",
            pattern.name(),
            request.width,
            request.height
        );
        Ok(Box::new(PatternCapture::new(pattern, request.width, request.height)))
    }
}

impl DeviceEnumerator for PatternBackend {
    fn list_video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        Ok(Pattern::ALL
            .into_iter()
            .map(|p| DeviceInfo {
                id: p.device_id(),
                label: format!("Mire {}", p.name()),
            })
            .collect())
    }
}

/// Flux de mire : un nouveau frame à chaque lecture.
pub struct PatternCapture {
    pattern: Pattern,
    frame: Arc<FrameBuffer>,
    counter: u64,
    open: bool,
    subscription: Option<MetadataSubscription>,
}

impl PatternCapture {
    /// Open a stream of `pattern` at `width × height`.
    #[must_use]
    pub fn new(pattern: Pattern, width: u32, height: u32) -> Self {
        let (publisher, subscription) = MetadataSubscription::channel();
        publisher.publish(CaptureEvent::Ready(CaptureMetadata {
            device_id: Some(pattern.device_id()),
            width,
            height,
        }));
        Self {
            pattern,
            frame: Arc::new(FrameBuffer::new(width, height)),
            counter: 0,
            open: true,
            subscription: Some(subscription),
        }
    }

    /// Frames produced so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.counter
    }
}

impl CaptureHandle for PatternCapture {
    fn is_frame_ready(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Option<Arc<FrameBuffer>> {
        if !self.open {
            return None;
        }
        // Réutilise le buffer si plus personne ne tient le précédent.
        let frame = Arc::make_mut(&mut self.frame);
        self.pattern.fill(frame, self.counter);
        self.counter += 1;
        Some(Arc::clone(&self.frame))
    }

    fn subscribe(&mut self) -> Option<MetadataSubscription> {
        self.subscription.take()
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_names_and_ids() {
        for p in Pattern::ALL {
            assert_eq!(Pattern::parse(p.name()), Some(p));
            assert_eq!(Pattern::parse(&p.device_id()), Some(p));
        }
        assert_eq!(Pattern::parse("GRADIENT"), Some(Pattern::Gradient));
        assert_eq!(Pattern::parse("mandelbrot"), None);
    }

    #[test]
    fn gradient_spans_black_to_white() {
        let mut frame = FrameBuffer::new(16, 2);
        Pattern::Gradient.fill(&mut frame, 0);
        assert_eq!(frame.data[0], 0);
        assert_eq!(frame.data[15 * 4], 255);
    }

    #[test]
    fn checker_inverts_after_sixteen_frames() {
        let mut a = FrameBuffer::new(16, 16);
        let mut b = FrameBuffer::new(16, 16);
        Pattern::Checker.fill(&mut a, 0);
        Pattern::Checker.fill(&mut b, 16);
        assert_eq!(a.data[0], 0);
        assert_eq!(b.data[0], 255);
    }

    #[test]
    fn pulse_peaks_at_white() {
        let mut frame = FrameBuffer::new(2, 2);
        Pattern::Pulse.fill(&mut frame, 0);
        assert_eq!(frame.data[0], 0);
        Pattern::Pulse.fill(&mut frame, 31);
        assert_eq!(frame.data[0], 255);
        Pattern::Pulse.fill(&mut frame, 63);
        assert_eq!(frame.data[0], 0);
    }

    #[test]
    fn noise_is_reproducible_per_frame() {
        let mut a = FrameBuffer::new(8, 8);
        let mut b = FrameBuffer::new(8, 8);
        Pattern::Noise.fill(&mut a, 7);
        Pattern::Noise.fill(&mut b, 7);
        assert_eq!(a, b);
        Pattern::Noise.fill(&mut b, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn capture_counts_frames_and_stops_after_close() {
        let mut capture = PatternCapture::new(Pattern::Pulse, 4, 4);
        let held = capture.read_frame().unwrap();
        let next = capture.read_frame().unwrap();
        assert_ne!(held.data[0], next.data[0]);
        assert_eq!(capture.frame_count(), 2);

        capture.close();
        assert!(!capture.is_frame_ready());
        assert!(capture.read_frame().is_none());
    }

    #[test]
    fn unknown_device_is_rejected() {
        let mut backend = PatternBackend::default();
        let req = CaptureRequest::square(8, Some("pattern:plasma".into()));
        assert!(matches!(
            backend.open(&req).err(),
            Some(CaptureError::DeviceNotFound(_))
        ));
        assert_eq!(backend.list_video_inputs().unwrap().len(), 4);
    }
}
