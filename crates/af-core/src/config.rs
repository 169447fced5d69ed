use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::charset::{SYMBOLS_DEFAULT, SymbolTable};
use crate::error::CoreError;

/// Taille de grille par défaut (caractères par ligne et par colonne).
pub const DEFAULT_GRID_SIZE: u16 = 64;
/// Variante haute résolution de la grille.
pub const WIDE_GRID_SIZE: u16 = 120;
/// Nombre de niveaux de gris par défaut.
pub const DEFAULT_LEVEL_COUNT: u8 = 5;
/// Intervalle minimal entre deux cycles du pipeline (≈ 6-7 Hz).
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 150;
/// Étirement de contraste autour de 128.
pub const DEFAULT_CONTRAST_FACTOR: f64 = 1.5;

/// Configuration d'une session de capture.
///
/// Immuable pendant la vie d'une session : un changement (hot-reload) démarre
/// une nouvelle session. Sérialisable en TOML.
///
/// # Example
/// ```
/// use af_core::config::MosaicConfig;
/// let config = MosaicConfig::default();
/// assert_eq!(config.grid_size, 64);
/// assert_eq!(config.level_count, 5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MosaicConfig {
    // === Grille ===
    /// Côté N de la grille carrée. Détermine aussi la résolution demandée à la capture.
    pub grid_size: u16,
    /// Nombre de niveaux K.
    pub level_count: u8,
    /// Symboles du plus sombre au plus clair, exactement K caractères.
    pub symbols: String,

    // === Conversion ===
    /// Facteur de contraste : > 1 augmente, < 1 diminue.
    pub contrast_factor: f64,

    // === Cadence ===
    /// Intervalle minimal entre deux cycles, en ms.
    pub update_interval_ms: u64,
    /// Fréquence de la boucle hôte (ticks du scheduler + redraw TUI).
    pub ui_fps: u32,

    // === Capture ===
    /// Flux continu ou instantané unique.
    pub capture_flow: CaptureFlow,
    /// Identifiant du périphérique. `None` = périphérique par défaut.
    pub device: Option<String>,
}

/// How the session consumes the capture stream.
///
/// # Example
/// ```
/// use af_core::config::CaptureFlow;
/// assert_eq!(CaptureFlow::default(), CaptureFlow::Continuous);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum CaptureFlow {
    /// Le scheduler tourne tant que la session vit.
    #[default]
    Continuous,
    /// Un seul cycle après la résolution des métadonnées, puis arrêt du scheduler.
    Snapshot,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            level_count: DEFAULT_LEVEL_COUNT,
            symbols: SYMBOLS_DEFAULT.to_string(),
            contrast_factor: DEFAULT_CONTRAST_FACTOR,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            ui_fps: 60,
            capture_flow: CaptureFlow::Continuous,
            device: None,
        }
    }
}

impl MosaicConfig {
    /// Clamp soft numeric fields to their usable ranges.
    pub fn clamp_all(&mut self) {
        self.ui_fps = self.ui_fps.clamp(15, 240);
        self.update_interval_ms = self.update_interval_ms.max(1);
    }

    /// Check the hard invariants of a session.
    ///
    /// # Errors
    /// Returns a [`CoreError`] when the grid size, level count, contrast or
    /// symbol table are unusable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(4..=512).contains(&self.grid_size) {
            return Err(CoreError::InvalidDimensions {
                width: u32::from(self.grid_size),
                height: u32::from(self.grid_size),
            });
        }
        if self.level_count < 2 || self.level_count == u8::MAX {
            return Err(CoreError::Config(format!(
                "level_count doit être dans [2, 254], reçu {}",
                self.level_count
            )));
        }
        if !self.contrast_factor.is_finite() || self.contrast_factor < 0.0 {
            return Err(CoreError::Config(format!(
                "contrast_factor doit être fini et positif, reçu {}",
                self.contrast_factor
            )));
        }
        if self.update_interval_ms == 0 {
            return Err(CoreError::Config("update_interval_ms doit être ≥ 1".into()));
        }
        self.symbol_table().map(|_| ())
    }

    /// Table de symboles validée contre `level_count`.
    ///
    /// # Errors
    /// Returns [`CoreError::SymbolTableMismatch`] if the lengths differ.
    pub fn symbol_table(&self) -> Result<SymbolTable, CoreError> {
        SymbolTable::new(&self.symbols, self.level_count)
    }

    /// Résolution à demander au collaborateur de capture.
    #[must_use]
    pub fn capture_size(&self) -> (u32, u32) {
        (u32::from(self.grid_size), u32::from(self.grid_size))
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    mosaic: Option<MosaicSection>,
    capture: Option<CaptureSection>,
}

/// Mosaic section, all fields optional for partial override.
#[derive(Deserialize)]
struct MosaicSection {
    grid_size: Option<u16>,
    level_count: Option<u8>,
    symbols: Option<String>,
    contrast_factor: Option<f64>,
    update_interval_ms: Option<u64>,
    ui_fps: Option<u32>,
}

/// Capture section, all fields optional.
#[derive(Deserialize)]
struct CaptureSection {
    flow: Option<CaptureFlow>,
    device: Option<String>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or fails validation.
///
/// # Example
/// ```no_run
/// use af_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<MosaicConfig> {
    let mut config = read_config(path)?;
    config.clamp_all();
    config
        .validate()
        .with_context(|| format!("Config invalide dans {}", path.display()))?;
    Ok(config)
}

/// Comme [`load_config`], sans validation : l'appelant applique ses
/// overrides (CLI) avant de valider.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_config(path: &Path) -> Result<MosaicConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    merge_config(&content).with_context(|| format!("Config illisible : {}", path.display()))
}

/// Parse TOML content on top of the defaults.
///
/// # Errors
/// Returns an error on malformed TOML or when the merged config is invalid.
///
/// # Example
/// ```
/// use af_core::config::parse_config;
/// let config = parse_config("[mosaic]\ngrid_size = 120\n").unwrap();
/// assert_eq!(config.grid_size, 120);
/// assert_eq!(config.level_count, 5);
/// ```
pub fn parse_config(content: &str) -> Result<MosaicConfig> {
    let mut config = merge_config(content)?;
    config.clamp_all();
    config.validate()?;
    Ok(config)
}

/// Fusionne le TOML sur les défauts, sans clamp ni validation.
fn merge_config(content: &str) -> Result<MosaicConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = MosaicConfig::default();

    if let Some(m) = file.mosaic {
        if let Some(v) = m.grid_size {
            config.grid_size = v;
        }
        if let Some(v) = m.level_count {
            config.level_count = v;
        }
        if let Some(v) = m.symbols {
            config.symbols = v;
        }
        if let Some(v) = m.contrast_factor {
            config.contrast_factor = v;
        }
        if let Some(v) = m.update_interval_ms {
            config.update_interval_ms = v;
        }
        if let Some(v) = m.ui_fps {
            config.ui_fps = v;
        }
    }

    if let Some(c) = file.capture {
        if let Some(v) = c.flow {
            config.capture_flow = v;
        }
        if c.device.is_some() {
            config.device = c.device;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let c = MosaicConfig::default();
        assert_eq!(c.grid_size, 64);
        assert_eq!(c.level_count, 5);
        assert_eq!(c.update_interval_ms, 150);
        assert!((c.contrast_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(c.symbols, "@%#*.");
        assert_eq!(c.capture_size(), (64, 64));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let c = parse_config("").unwrap();
        assert_eq!(c, MosaicConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let c = parse_config(
            "[mosaic]\ncontrast_factor = 1.0\n\n[capture]\nflow = \"Snapshot\"\ndevice = \"/dev/video2\"\n",
        )
        .unwrap();
        assert!((c.contrast_factor - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.capture_flow, CaptureFlow::Snapshot);
        assert_eq!(c.device.as_deref(), Some("/dev/video2"));
        assert_eq!(c.grid_size, DEFAULT_GRID_SIZE);
    }

    #[test]
    fn level_count_without_matching_symbols_is_rejected() {
        assert!(parse_config("[mosaic]\nlevel_count = 3\n").is_err());
        assert!(parse_config("[mosaic]\nlevel_count = 3\nsymbols = \"@#.\"\n").is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected_or_clamped() {
        assert!(parse_config("[mosaic]\ngrid_size = 2\n").is_err());
        assert!(parse_config("[mosaic]\ncontrast_factor = -1.0\n").is_err());
        let c = parse_config("[mosaic]\nui_fps = 1000\nupdate_interval_ms = 0\n").unwrap();
        assert_eq!(c.ui_fps, 240);
        assert_eq!(c.update_interval_ms, 1);
    }

    #[test]
    fn load_config_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mosaic]\ngrid_size = 120").unwrap();
        let c = load_config(file.path()).unwrap();
        assert_eq!(c.grid_size, WIDE_GRID_SIZE);
    }

    #[test]
    fn read_config_defers_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mosaic]\nlevel_count = 10").unwrap();
        assert!(load_config(file.path()).is_err());
        let mut c = read_config(file.path()).unwrap();
        assert_eq!(c.level_count, 10);
        c.symbols = crate::charset::SYMBOLS_DENSE.to_string();
        assert!(c.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/camscii.toml")).is_err());
    }
}
