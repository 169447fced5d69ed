use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use af_core::error::CaptureError;
use af_core::traits::{DeviceEnumerator, DeviceInfo};

use crate::camera::InputFormat;

/// Racine sysfs des périphériques Video4Linux.
pub const SYSFS_V4L2: &str = "/sys/class/video4linux";

/// Énumérateur des entrées vidéo du système.
///
/// Linux : sysfs. macOS / Windows : sortie de `ffmpeg -list_devices`.
/// Plateforme non supportée : liste vide.
pub struct SystemDevices {
    ffmpeg: PathBuf,
    sysfs_root: PathBuf,
}

impl SystemDevices {
    /// Enumerator using `ffmpeg` from PATH and the real sysfs root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            sysfs_root: PathBuf::from(SYSFS_V4L2),
        }
    }

    /// Use a specific ffmpeg binary.
    #[must_use]
    pub fn with_ffmpeg(mut self, ffmpeg: impl AsRef<Path>) -> Self {
        self.ffmpeg = ffmpeg.as_ref().to_path_buf();
        self
    }

    /// Scan another sysfs root (tests, containers).
    #[must_use]
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// List the video inputs.
    ///
    /// # Errors
    /// Returns [`CaptureError::Unavailable`] when ffmpeg is needed but missing.
    pub fn list(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        match InputFormat::native() {
            Some(InputFormat::V4l2) => Ok(list_v4l2(&self.sysfs_root)),
            Some(InputFormat::AvFoundation) => {
                let text = self.ffmpeg_listing(&["-f", "avfoundation", "-list_devices", "true", "-i", ""])?;
                Ok(parse_avfoundation(&text))
            }
            Some(InputFormat::DShow) => {
                let text = self.ffmpeg_listing(&["-list_devices", "true", "-f", "dshow", "-i", "dummy"])?;
                Ok(parse_dshow(&text))
            }
            None => Ok(Vec::new()),
        }
    }

    /// ffmpeg imprime la liste sur stderr puis échoue : seul stderr compte.
    fn ffmpeg_listing(&self, args: &[&str]) -> Result<String, CaptureError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                CaptureError::Unavailable(format!(
                    "Impossible de lancer {} : {e}",
                    self.ffmpeg.display()
                ))
            })?;
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

impl Default for SystemDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for SystemDevices {
    fn list_video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let devices = self.list()?;
        log::debug!("{} entrée(s) vidéo trouvée(s)", devices.len());
        Ok(devices)
    }
}

/// Scan `<root>/videoN/name`. Les nœuds métadonnées (`index` ≠ 0) sont ignorés.
///
/// Un dossier absent ou illisible donne une liste vide.
#[must_use]
pub fn list_v4l2(root: &Path) -> Vec<DeviceInfo> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut found: Vec<(u32, DeviceInfo)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let number: u32 = name.strip_prefix("video")?.parse().ok()?;
            let dir = entry.path();
            let index = std::fs::read_to_string(dir.join("index")).unwrap_or_default();
            if !index.trim().is_empty() && index.trim() != "0" {
                return None;
            }
            let label = std::fs::read_to_string(dir.join("name"))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            Some((
                number,
                DeviceInfo {
                    id: format!("/dev/{name}"),
                    label,
                },
            ))
        })
        .collect();

    found.sort_by_key(|(n, _)| *n);
    found.into_iter().map(|(_, d)| d).collect()
}

/// Parse `ffmpeg -f avfoundation -list_devices true -i ""`.
///
/// Garde la section vidéo, ignore les écrans (`Capture screen N`).
///
/// # Example
/// ```
/// use af_source::devices::parse_avfoundation;
/// let text = "[AVFoundation indev @ 0x1] AVFoundation video devices:\n\
///             [AVFoundation indev @ 0x1] [0] FaceTime HD Camera\n\
///             [AVFoundation indev @ 0x1] AVFoundation audio devices:\n\
///             [AVFoundation indev @ 0x1] [0] Microphone\n";
/// let devices = parse_avfoundation(text);
/// assert_eq!(devices.len(), 1);
/// assert_eq!(devices[0].id, "0");
/// ```
#[must_use]
pub fn parse_avfoundation(text: &str) -> Vec<DeviceInfo> {
    let mut in_video = false;
    let mut devices = Vec::new();
    for line in text.lines() {
        if line.contains("AVFoundation video devices") {
            in_video = true;
            continue;
        }
        if line.contains("AVFoundation audio devices") {
            in_video = false;
            continue;
        }
        if !in_video {
            continue;
        }
        // "[AVFoundation indev @ 0x…] [0] FaceTime HD Camera"
        let Some((_, rest)) = line.split_once("] [") else {
            continue;
        };
        let Some((index, label)) = rest.split_once("] ") else {
            continue;
        };
        if index.parse::<u32>().is_err() || label.starts_with("Capture screen") {
            continue;
        }
        devices.push(DeviceInfo {
            id: index.to_string(),
            label: label.trim().to_string(),
        });
    }
    devices
}

/// Parse `ffmpeg -list_devices true -f dshow -i dummy`.
///
/// Comprend le format récent (`"Name" (video)` ou `(audio, video)`) et l'ancien (section
/// `DirectShow video devices`). L'id DirectShow est le nom lui-même.
///
/// # Example
/// ```
/// use af_source::devices::parse_dshow;
/// let text = "[dshow @ 01] \"Integrated Camera\" (video)\n\
///             [dshow @ 01]   Alternative name \"@device_pnp_x\"\n\
///             [dshow @ 01] \"Microphone\" (audio)\n";
/// let devices = parse_dshow(text);
/// assert_eq!(devices.len(), 1);
/// assert_eq!(devices[0].id, "Integrated Camera");
/// ```
#[must_use]
pub fn parse_dshow(text: &str) -> Vec<DeviceInfo> {
    let mut legacy_video = false;
    let mut devices = Vec::new();
    for line in text.lines() {
        if line.contains("DirectShow video devices") {
            legacy_video = true;
            continue;
        }
        if line.contains("DirectShow audio devices") {
            legacy_video = false;
            continue;
        }
        if line.contains("Alternative name") {
            continue;
        }
        let tagged_video = line.trim_end().ends_with("video)");
        if !(tagged_video || legacy_video) {
            continue;
        }
        let Some(name) = quoted(line) else {
            continue;
        };
        devices.push(DeviceInfo {
            id: name.to_string(),
            label: name.to_string(),
        });
    }
    devices
}

fn quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}
