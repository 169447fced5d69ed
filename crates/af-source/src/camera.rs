// Capture caméra via ffmpeg en subprocess (pas de binding natif v4l/avfoundation/dshow).
// Prérequis : `ffmpeg` accessible dans PATH.
//
// Architecture :
//   - `InputFormat`        : arguments d'entrée ffmpeg par plateforme
//   - `CameraCapture::open`: lance ffmpeg → flux raw RGBA N×N sur stdout
//   - `reader_loop`        : thread dédié, lit les frames, publie les métadonnées
//   - `drain_stderr`       : vide stderr en continu (pipe jamais plein)
//   - `find_or_create_slot`: gère le pool Arc<FrameBuffer> zero-alloc

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use af_core::error::CaptureError;
use af_core::frame::FrameBuffer;
use af_core::traits::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureMetadata, CaptureRequest,
    MetadataPublisher, MetadataSubscription,
};
use flume::{Receiver, Sender};

/// Taille du pool de frames pré-allouées.
/// Doit être > capacité du canal + 2 (frame en lecture, frame consommée).
const POOL_SIZE: usize = 6;

/// Capacité du canal frame. Le reader évince le plus ancien quand il est plein.
const FRAME_QUEUE: usize = 2;

/// Lignes de stderr ffmpeg conservées pour décrire un échec.
const STDERR_TAIL: usize = 16;

/// Framerate demandé au périphérique.
pub const DEFAULT_CAPTURE_FPS: u32 = 30;

/// Format d'entrée ffmpeg selon la plateforme.
///
/// # Example
/// ```
/// use af_source::camera::InputFormat;
/// let args = InputFormat::V4l2.input_args(Some("/dev/video2"), 30);
/// assert_eq!(args.last().map(String::as_str), Some("/dev/video2"));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Linux Video4Linux2.
    V4l2,
    /// macOS AVFoundation.
    AvFoundation,
    /// Windows DirectShow.
    DShow,
}

impl InputFormat {
    /// Format natif de la plateforme courante, `None` si non supportée.
    #[must_use]
    pub fn native() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::V4l2)
        } else if cfg!(target_os = "macos") {
            Some(Self::AvFoundation)
        } else if cfg!(windows) {
            Some(Self::DShow)
        } else {
            None
        }
    }

    /// Périphérique implicite quand aucun n'est demandé.
    ///
    /// DirectShow n'a pas de défaut adressable : il faut passer par l'énumération.
    #[must_use]
    pub fn default_device(self) -> Option<&'static str> {
        match self {
            Self::V4l2 => Some("/dev/video0"),
            Self::AvFoundation => Some("0"),
            Self::DShow => None,
        }
    }

    /// Arguments `-f <fmt> … -i <device>`.
    #[must_use]
    pub fn input_args(self, device: Option<&str>, fps: u32) -> Vec<String> {
        let device = device.or(self.default_device()).unwrap_or_default();
        let fps = fps.to_string();
        match self {
            Self::V4l2 => vec![
                "-f".into(),
                "v4l2".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                device.into(),
            ],
            Self::AvFoundation => vec![
                "-f".into(),
                "avfoundation".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                // "<video>:<audio>" : pas d'audio
                format!("{device}:none"),
            ],
            Self::DShow => vec![
                "-f".into(),
                "dshow".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                format!("video={device}"),
            ],
        }
    }
}

/// Arguments de sortie : mise à l'échelle N×N, RGBA brut sur stdout.
#[must_use]
pub fn output_args(width: u32, height: u32) -> Vec<String> {
    vec![
        "-vf".into(),
        format!("scale={width}:{height}:flags=neighbor"),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-an".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "pipe:1".into(),
    ]
}

/// Backend caméra : ouvre un [`CameraCapture`] par requête.
///
/// # Example
/// ```
/// use af_source::camera::CameraBackend;
/// let backend = CameraBackend::new();
/// assert_eq!(backend.ffmpeg().to_str(), Some("ffmpeg"));
/// ```
pub struct CameraBackend {
    ffmpeg: PathBuf,
    fps: u32,
}

impl CameraBackend {
    /// Backend using `ffmpeg` from PATH at [`DEFAULT_CAPTURE_FPS`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            fps: DEFAULT_CAPTURE_FPS,
        }
    }

    /// Use a specific ffmpeg binary.
    #[must_use]
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Path of the ffmpeg binary in use.
    #[must_use]
    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }
}

impl Default for CameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CameraBackend {
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let format = InputFormat::native().ok_or_else(|| {
            CaptureError::Unavailable("plateforme sans entrée caméra ffmpeg".into())
        })?;

        let device = match (&request.device_id, format) {
            (Some(id), _) => Some(id.clone()),
            (None, InputFormat::DShow) => {
                // Pas de défaut DirectShow : premier périphérique énuméré.
                let devices = crate::devices::SystemDevices::new()
                    .with_ffmpeg(&self.ffmpeg)
                    .list()?;
                let first = devices.into_iter().next().ok_or_else(|| {
                    CaptureError::DeviceNotFound("aucune caméra DirectShow".into())
                })?;
                Some(first.id)
            }
            (None, f) => f.default_device().map(String::from),
        };

        if format == InputFormat::V4l2
            && let Some(ref path) = device
            && !Path::new(path).exists()
        {
            return Err(CaptureError::DeviceNotFound(path.clone()));
        }

        let capture = CameraCapture::open(&self.ffmpeg, format, device, request, self.fps)?;
        Ok(Box::new(capture))
    }
}

/// Flux caméra ouvert : process ffmpeg + thread lecteur.
///
/// Possède exclusivement le process. `close()` (ou `Drop`) le tue, le
/// récolte et joint le thread lecteur.
pub struct CameraCapture {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    frame_rx: Receiver<Arc<FrameBuffer>>,
    subscription: Option<MetadataSubscription>,
}

impl CameraCapture {
    /// Lance ffmpeg et le thread lecteur.
    ///
    /// # Errors
    /// [`CaptureError::Unavailable`] si ffmpeg est introuvable,
    /// [`CaptureError::Io`] pour toute autre erreur de spawn.
    pub fn open(
        ffmpeg: &Path,
        format: InputFormat,
        device: Option<String>,
        request: &CaptureRequest,
        fps: u32,
    ) -> Result<Self, CaptureError> {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 {
            return Err(CaptureError::StreamFailed(format!(
                "résolution demandée invalide {width}×{height}"
            )));
        }

        let mut args = format.input_args(device.as_deref(), fps);
        args.extend(output_args(width, height));

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CaptureError::Unavailable(format!(
                        "{} introuvable. Vérifiez que ffmpeg est installé et dans le PATH.",
                        ffmpeg.display()
                    ))
                } else {
                    CaptureError::Io(e)
                }
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::StreamFailed("stdout ffmpeg indisponible".into()));
        };
        let stderr_tail = child.stderr.take().and_then(|err| {
            thread::Builder::new()
                .name("af-camera-stderr".to_string())
                .spawn(move || drain_stderr(err))
                .ok()
        });

        let (frame_tx, frame_rx) = flume::bounded(FRAME_QUEUE);
        let (publisher, subscription) = MetadataSubscription::channel();
        let stream = StreamSpec {
            width,
            height,
            device_id: device.clone(),
        };
        let drain_rx = frame_rx.clone();

        let reader = thread::Builder::new()
            .name("af-camera".to_string())
            .spawn(move || reader_loop(stdout, stderr_tail, &stream, &frame_tx, &drain_rx, publisher));
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CaptureError::Io(e));
            }
        };

        log::info!(
            "Caméra ouverte : {} {width}x{height} @ {fps}fps",
            device.as_deref().unwrap_or("<défaut>")
        );

        Ok(Self {
            child: Some(child),
            reader: Some(reader),
            frame_rx,
            subscription: Some(subscription),
        })
    }
}

impl CaptureHandle for CameraCapture {
    fn is_frame_ready(&self) -> bool {
        !self.frame_rx.is_empty()
    }

    fn read_frame(&mut self) -> Option<Arc<FrameBuffer>> {
        self.frame_rx.try_iter().last()
    }

    fn subscribe(&mut self) -> Option<MetadataSubscription> {
        self.subscription.take()
    }

    fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            log::info!("Caméra fermée.");
        }
        // stdout fermé → le lecteur voit EOF et sort.
        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            log::warn!("Thread caméra terminé sur panic");
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.close();
    }
}

/// Géométrie et identité du flux, transmises au thread lecteur.
struct StreamSpec {
    width: u32,
    height: u32,
    device_id: Option<String>,
}

/// Lit exactement `buf.len()` bytes depuis `reader`.
///
/// # Errors
/// Retourne `Ok(true)` si lu avec succès, `Ok(false)` sur EOF avant complétion,
/// `Err` sur erreur I/O fatale.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => return Ok(false),
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Trouve ou crée un slot libre dans le pool.
///
/// Invariant : retourne un index `i` tel que `Arc::strong_count(&pool[i]) == 1`.
/// Si tous les slots sont pris, alloue un nouveau slot (cas exceptionnel).
fn find_or_create_slot(pool: &mut Vec<Arc<FrameBuffer>>, w: u32, h: u32) -> usize {
    if let Some(i) = pool.iter().position(|a| Arc::strong_count(a) == 1) {
        i
    } else {
        pool.push(Arc::new(FrameBuffer::new(w, h)));
        pool.len() - 1
    }
}

/// Motif de l'échec à partir du stderr ffmpeg.
///
/// # Example
/// ```
/// use af_source::camera::describe_failure;
/// let msg = describe_failure("[video4linux2] Cannot open video device: Permission denied");
/// assert!(msg.starts_with("accès refusé"));
/// ```
#[must_use]
pub fn describe_failure(stderr: &str) -> String {
    let last = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("ffmpeg s'est arrêté sans frame")
        .trim();
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied")
        || lower.contains("not authorized")
        || lower.contains("not permitted")
    {
        format!("accès refusé : {last}")
    } else {
        last.to_string()
    }
}

/// Lit stderr jusqu'à EOF, journalise, rend les dernières lignes.
fn drain_stderr(stderr: ChildStderr) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
    for line in BufReader::new(stderr).lines() {
        let Ok(line) = line else { break };
        log::debug!("ffmpeg : {line}");
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Boucle principale du thread lecteur.
fn reader_loop(
    mut stdout: ChildStdout,
    stderr_tail: Option<JoinHandle<String>>,
    stream: &StreamSpec,
    frame_tx: &Sender<Arc<FrameBuffer>>,
    drain_rx: &Receiver<Arc<FrameBuffer>>,
    publisher: MetadataPublisher,
) {
    let (w, h) = (stream.width, stream.height);
    let mut publisher = Some(publisher);
    let mut pool: Vec<Arc<FrameBuffer>> = (0..POOL_SIZE)
        .map(|_| Arc::new(FrameBuffer::new(w, h)))
        .collect();
    let mut frames = 0u64;

    let failure = loop {
        let idx = find_or_create_slot(&mut pool, w, h);
        // Arc::get_mut réussit ssi strong_count == 1 (garanti par find_or_create_slot)
        let Some(fb) = Arc::get_mut(&mut pool[idx]) else {
            continue;
        };

        match read_exact_or_eof(&mut stdout, &mut fb.data) {
            Ok(true) => {
                frames += 1;
                if let Some(p) = publisher.take() {
                    p.publish(CaptureEvent::Ready(CaptureMetadata {
                        device_id: stream.device_id.clone(),
                        width: w,
                        height: h,
                    }));
                }
                let mut frame = Arc::clone(&pool[idx]);
                loop {
                    match frame_tx.try_send(frame) {
                        Ok(()) => break,
                        Err(flume::TrySendError::Full(back)) => {
                            // File pleine : évincer le plus ancien, garder le plus frais.
                            let _ = drain_rx.try_recv();
                            frame = back;
                        }
                        Err(flume::TrySendError::Disconnected(_)) => {
                            log::debug!("Thread caméra : consommateur parti");
                            return;
                        }
                    }
                }
            }
            Ok(false) => break None,
            Err(e) => break Some(format!("erreur lecture pipe : {e}")),
        }
    };

    if let Some(p) = publisher.take() {
        let reason = failure.unwrap_or_else(|| {
            // stdout en EOF : ffmpeg sort, stderr suit.
            let text = stderr_tail
                .and_then(|t| t.join().ok())
                .unwrap_or_default();
            describe_failure(&text)
        });
        log::warn!("Caméra : flux terminé avant le premier frame ({reason})");
        p.publish(CaptureEvent::Failed(reason));
    } else {
        log::info!("Thread caméra : fin de flux après {frames} frames");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_exact_reports_eof_on_short_input() {
        let mut src: &[u8] = &[1, 2, 3];
        let mut buf = [0u8; 4];
        assert!(!read_exact_or_eof(&mut src, &mut buf).unwrap());

        let mut src: &[u8] = &[1, 2, 3, 4, 5];
        assert!(read_exact_or_eof(&mut src, &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn pool_reuses_unshared_slots() {
        let mut pool = vec![Arc::new(FrameBuffer::new(2, 2)), Arc::new(FrameBuffer::new(2, 2))];
        let held = Arc::clone(&pool[0]);
        assert_eq!(find_or_create_slot(&mut pool, 2, 2), 1);
        let held2 = Arc::clone(&pool[1]);
        assert_eq!(find_or_create_slot(&mut pool, 2, 2), 2);
        assert_eq!(pool.len(), 3);
        drop((held, held2));
        assert_eq!(find_or_create_slot(&mut pool, 2, 2), 0);
    }

    #[test]
    fn input_args_per_platform() {
        assert_eq!(
            InputFormat::V4l2.input_args(None, 30),
            ["-f", "v4l2", "-framerate", "30", "-i", "/dev/video0"]
        );
        assert_eq!(
            InputFormat::AvFoundation.input_args(Some("1"), 15).last().map(String::as_str),
            Some("1:none")
        );
        assert_eq!(
            InputFormat::DShow
                .input_args(Some("Integrated Camera"), 30)
                .last()
                .map(String::as_str),
            Some("video=Integrated Camera")
        );
    }

    #[test]
    fn output_is_scaled_raw_rgba() {
        let args = output_args(64, 64);
        assert!(args.contains(&"scale=64:64:flags=neighbor".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "rgba"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn failure_description_flags_permission_problems() {
        assert_eq!(describe_failure(""), "ffmpeg s'est arrêté sans frame");
        assert_eq!(
            describe_failure("line one\n/dev/video0: Device or resource busy\n"),
            "/dev/video0: Device or resource busy"
        );
        assert!(describe_failure("Operation not permitted").starts_with("accès refusé"));
    }

    #[test]
    fn missing_ffmpeg_is_reported_as_unavailable() {
        let req = CaptureRequest::square(8, None);
        let result = CameraCapture::open(
            Path::new("/nonexistent/ffmpeg-camscii"),
            InputFormat::V4l2,
            Some("/dev/video0".into()),
            &req,
            30,
        );
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
    }

    fn wait_event(capture: &mut CameraCapture) -> Option<CaptureEvent> {
        let mut sub = capture.subscribe()?;
        for _ in 0..500 {
            if let Some(event) = sub.poll() {
                return Some(event);
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        None
    }

    #[cfg(unix)]
    #[test]
    fn ffmpeg_exiting_without_frame_publishes_failure() {
        let req = CaptureRequest::square(4, None);
        let mut capture = CameraCapture::open(
            Path::new("/bin/false"),
            InputFormat::V4l2,
            Some("/dev/video9".into()),
            &req,
            30,
        )
        .unwrap();
        match wait_event(&mut capture) {
            Some(CaptureEvent::Failed(reason)) => {
                assert_eq!(reason, "ffmpeg s'est arrêté sans frame");
            }
            other => panic!("attendu Failed, reçu {other:?}"),
        }
        assert!(capture.read_frame().is_none());
        capture.close();
    }

    #[cfg(unix)]
    #[test]
    fn first_frame_publishes_ready_and_is_delivered() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        // 4×4 RGBA = 64 bytes, puis un message d'erreur sur stderr.
        std::fs::write(
            &script,
            "#!/bin/sh\nhead -c 64 /dev/zero\necho 'end of stream' >&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let req = CaptureRequest::square(4, None);
        let open = || {
            CameraCapture::open(&script, InputFormat::V4l2, Some("cam-stub".into()), &req, 30)
        };
        // ETXTBSY possible si un autre test fork pendant l'écriture du script.
        let mut capture = (0..20)
            .find_map(|_| match open() {
                Err(CaptureError::Io(e)) if e.raw_os_error() == Some(26) => {
                    thread::sleep(std::time::Duration::from_millis(20));
                    None
                }
                result => Some(result.unwrap()),
            })
            .unwrap();
        match wait_event(&mut capture) {
            Some(CaptureEvent::Ready(meta)) => {
                assert_eq!(meta.device_id.as_deref(), Some("cam-stub"));
                assert_eq!((meta.width, meta.height), (4, 4));
            }
            other => panic!("attendu Ready, reçu {other:?}"),
        }

        // Ready est publié juste avant l'envoi du frame.
        let frame = (0..500)
            .find_map(|_| {
                capture.read_frame().or_else(|| {
                    thread::sleep(std::time::Duration::from_millis(10));
                    None
                })
            })
            .unwrap();
        assert_eq!(frame.data.len(), 64);
        assert!(frame.data.iter().all(|&b| b == 0));
        assert!(capture.read_frame().is_none());
        capture.close();
    }
}
