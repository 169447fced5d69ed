use af_core::traits::{CaptureBackend, DeviceEnumerator};
use af_source::camera::CameraBackend;
use af_source::devices::SystemDevices;
use af_source::pattern::{Pattern, PatternBackend};
use anyhow::Result;

use crate::cli::Cli;

/// Backend de capture et énumérateur assortis.
pub struct CaptureSource {
    /// Ouvre les flux.
    pub backend: Box<dyn CaptureBackend>,
    /// Alimente la liste de sélection.
    pub enumerator: Box<dyn DeviceEnumerator>,
    /// Libellé pour les logs.
    pub kind: &'static str,
}

/// Choisit la source selon la CLI : `--image`, `--pattern`, sinon caméra.
///
/// # Errors
/// Returns an error for an unknown pattern name, or `--image` in a build
/// without the `image-source` feature.
///
/// # Example
/// ```
/// use af_app::cli::Cli;
/// use af_app::sources::build_source;
/// use clap::Parser;
///
/// let cli = Cli::parse_from(["camscii", "--pattern", "checker"]);
/// let source = build_source(&cli).unwrap();
/// assert_eq!(source.kind, "pattern");
/// assert_eq!(source.enumerator.list_video_inputs().unwrap().len(), 4);
/// ```
pub fn build_source(cli: &Cli) -> Result<CaptureSource> {
    if let Some(ref path) = cli.image {
        return image_source(path);
    }

    if let Some(ref name) = cli.pattern {
        let Some(pattern) = Pattern::parse(name) else {
            anyhow::bail!("Mire inconnue : {name}. Supporté : gradient, checker, pulse, noise");
        };
        return Ok(CaptureSource {
            backend: Box::new(PatternBackend::new(pattern)),
            enumerator: Box::new(PatternBackend::new(pattern)),
            kind: "pattern",
        });
    }

    let mut camera = CameraBackend::new();
    let mut devices = SystemDevices::new();
    if let Some(ref ffmpeg) = cli.ffmpeg {
        camera = camera.with_ffmpeg(ffmpeg.clone());
        devices = devices.with_ffmpeg(ffmpeg);
    }
    Ok(CaptureSource {
        backend: Box::new(camera),
        enumerator: Box::new(devices),
        kind: "camera",
    })
}

#[cfg(feature = "image-source")]
fn image_source(path: &std::path::Path) -> Result<CaptureSource> {
    use af_source::image::StillBackend;
    Ok(CaptureSource {
        backend: Box::new(StillBackend::new(path)),
        enumerator: Box::new(StillBackend::new(path)),
        kind: "image",
    })
}

#[cfg(not(feature = "image-source"))]
fn image_source(path: &std::path::Path) -> Result<CaptureSource> {
    anyhow::bail!(
        "--image {} : compilé sans la feature image-source",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn camera_is_the_default_source() {
        let cli = Cli::parse_from(["camscii"]);
        assert_eq!(build_source(&cli).unwrap().kind, "camera");
    }

    #[test]
    fn unknown_pattern_is_an_error() {
        let cli = Cli::parse_from(["camscii", "--pattern", "plasma"]);
        assert!(build_source(&cli).is_err());
    }
}
