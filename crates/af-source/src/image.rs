use std::path::{Path, PathBuf};
use std::sync::Arc;

use af_core::error::CaptureError;
use af_core::frame::FrameBuffer;
use af_core::traits::{
    CaptureBackend, CaptureEvent, CaptureHandle, CaptureMetadata, CaptureRequest, DeviceEnumerator,
    DeviceInfo, MetadataSubscription,
};
use anyhow::{Context, Result};

use crate::resize::resize_square;

/// Charge une image du disque en RGBA.
///
/// # Errors
/// Returns an error if the image cannot be opened or decoded.
///
/// # Example
/// ```no_run
/// use af_source::image::load_image;
/// let frame = load_image(std::path::Path::new("test.png")).unwrap();
/// ```
pub fn load_image(path: &Path) -> Result<FrameBuffer> {
    let img = image::open(path)
        .with_context(|| format!("Impossible de charger {}", path.display()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(FrameBuffer {
        data: rgba.into_raw(),
        width,
        height,
    })
}

/// Backend image fixe : une photo tient lieu de caméra.
///
/// Pratique sans webcam (CI, démos). L'image est rechargée à chaque `open`
/// pour suivre les modifications du fichier.
///
/// # Example
/// ```no_run
/// use af_core::traits::{CaptureBackend, CaptureRequest};
/// use af_source::image::StillBackend;
/// let mut backend = StillBackend::new("portrait.jpg");
/// let handle = backend.open(&CaptureRequest::square(64, None)).unwrap();
/// assert!(handle.is_frame_ready());
/// ```
pub struct StillBackend {
    path: PathBuf,
}

impl StillBackend {
    /// Backend serving `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn device_id(&self) -> String {
        self.path.display().to_string()
    }
}

impl CaptureBackend for StillBackend {
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        if let Some(id) = &request.device_id
            && *id != self.device_id()
        {
            return Err(CaptureError::DeviceNotFound(id.clone()));
        }
        if !self.path.exists() {
            return Err(CaptureError::DeviceNotFound(self.device_id()));
        }

        let source = load_image(&self.path)
            .map_err(|e| CaptureError::StreamFailed(format!("{e:#}")))?;
        let frame = resize_square(&source, request.width)
            .map_err(|e| CaptureError::StreamFailed(format!("{e:#}")))?;
        log::info!(
            "Image fixe {} ({}x{} → {}x{})",
            self.path.display(),
            source.width,
            source.height,
            frame.width,
            frame.height
        );

        Ok(Box::new(StillCapture::new(frame, Some(self.device_id()))))
    }
}

impl DeviceEnumerator for StillBackend {
    fn list_video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let label = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(vec![DeviceInfo {
            id: self.device_id(),
            label,
        }])
    }
}

/// Flux d'une image fixe : toujours prêt, toujours le même frame.
///
/// Les métadonnées sont publiées dès la construction.
pub struct StillCapture {
    frame: Option<Arc<FrameBuffer>>,
    subscription: Option<MetadataSubscription>,
}

impl StillCapture {
    /// Wrap an already sized frame.
    #[must_use]
    pub fn new(frame: FrameBuffer, device_id: Option<String>) -> Self {
        let (publisher, subscription) = MetadataSubscription::channel();
        publisher.publish(CaptureEvent::Ready(CaptureMetadata {
            device_id,
            width: frame.width,
            height: frame.height,
        }));
        Self {
            frame: Some(Arc::new(frame)),
            subscription: Some(subscription),
        }
    }
}

impl CaptureHandle for StillCapture {
    fn is_frame_ready(&self) -> bool {
        self.frame.is_some()
    }

    fn read_frame(&mut self) -> Option<Arc<FrameBuffer>> {
        self.frame.clone()
    }

    fn subscribe(&mut self) -> Option<MetadataSubscription> {
        self.subscription.take()
    }

    fn close(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, w: u32, h: u32) -> PathBuf {
        let path = dir.join("still.png");
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 100, 0, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn open_resizes_to_the_requested_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 40, 20);
        let mut backend = StillBackend::new(&path);
        let mut handle = backend.open(&CaptureRequest::square(8, None)).unwrap();

        assert!(handle.is_frame_ready());
        let frame = handle.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (8, 8));
        assert!(frame.data[0].abs_diff(200) <= 1);
        assert!(frame.data[1].abs_diff(100) <= 1);

        let mut sub = handle.subscribe().unwrap();
        match sub.poll() {
            Some(CaptureEvent::Ready(meta)) => assert_eq!((meta.width, meta.height), (8, 8)),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(handle.subscribe().is_none());
    }

    #[test]
    fn missing_file_is_device_not_found() {
        let mut backend = StillBackend::new("/nonexistent/still.png");
        let err = backend.open(&CaptureRequest::square(8, None)).err();
        assert!(matches!(err, Some(CaptureError::DeviceNotFound(_))));
    }

    #[test]
    fn close_stops_delivering_frames() {
        let mut capture = StillCapture::new(FrameBuffer::new(4, 4), None);
        assert!(capture.read_frame().is_some());
        capture.close();
        capture.close();
        assert!(!capture.is_frame_ready());
        assert!(capture.read_frame().is_none());
    }

    #[test]
    fn enumerates_itself_as_single_device() {
        let backend = StillBackend::new("/tmp/photo.jpg");
        let devices = backend.list_video_inputs().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].label, "photo.jpg");
    }
}
