use std::path::PathBuf;

use af_core::config::{CaptureFlow, MosaicConfig};
use clap::Parser;

/// camSCII : mosaïque ASCII temps réel depuis la webcam.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Périphérique vidéo (ex : /dev/video2, 0, "Integrated Camera").
    #[arg(short, long)]
    pub device: Option<String>,

    /// Image fixe à la place de la caméra (PNG, JPEG, BMP, GIF).
    #[arg(long, conflicts_with = "pattern")]
    pub image: Option<PathBuf>,

    /// Mire synthétique à la place de la caméra : gradient, checker, pulse, noise.
    #[arg(long)]
    pub pattern: Option<String>,

    /// Binaire ffmpeg à utiliser pour la caméra.
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Côté de la grille (64 par défaut, 120 pour la variante large).
    #[arg(long)]
    pub grid_size: Option<u16>,

    /// Nombre de niveaux de luminance.
    #[arg(long)]
    pub levels: Option<u8>,

    /// Symboles du plus sombre au plus clair (autant que de niveaux).
    #[arg(long)]
    pub symbols: Option<String>,

    /// Facteur de contraste.
    #[arg(long)]
    pub contrast: Option<f64>,

    /// Intervalle minimal entre deux cycles, en ms.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Un seul cycle après l'ouverture du flux (touche r pour recommencer).
    #[arg(long, default_value_t = false)]
    pub snapshot: bool,

    /// Lister les entrées vidéo et quitter.
    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Imprimer une grille sur stdout et quitter.
    #[arg(long, default_value_t = false, conflicts_with = "plain")]
    pub once: bool,

    /// Flux de grilles sur stdout sans TUI, jusqu'à Ctrl-C.
    #[arg(long, default_value_t = false)]
    pub plain: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Overrides CLI, réappliqués à chaque rechargement de la config.
///
/// # Example
/// ```
/// use af_app::cli::Overrides;
/// use af_core::config::MosaicConfig;
///
/// let overrides = Overrides { grid_size: Some(120), ..Overrides::default() };
/// let mut config = MosaicConfig::default();
/// overrides.apply(&mut config);
/// assert_eq!(config.grid_size, 120);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// `--grid-size`.
    pub grid_size: Option<u16>,
    /// `--levels`.
    pub levels: Option<u8>,
    /// `--symbols`.
    pub symbols: Option<String>,
    /// `--contrast`.
    pub contrast: Option<f64>,
    /// `--interval`.
    pub interval: Option<u64>,
    /// `--device`.
    pub device: Option<String>,
    /// `--snapshot` (ou `--once`).
    pub snapshot: bool,
}

impl Overrides {
    /// Écrase les champs fournis sur la ligne de commande.
    pub fn apply(&self, config: &mut MosaicConfig) {
        if let Some(v) = self.grid_size {
            config.grid_size = v;
        }
        if let Some(v) = self.levels {
            config.level_count = v;
        }
        if let Some(ref v) = self.symbols {
            config.symbols.clone_from(v);
        }
        if let Some(v) = self.contrast {
            config.contrast_factor = v;
        }
        if let Some(v) = self.interval {
            config.update_interval_ms = v;
        }
        if self.device.is_some() {
            config.device.clone_from(&self.device);
        }
        if self.snapshot {
            config.capture_flow = CaptureFlow::Snapshot;
        }
    }
}

impl Cli {
    /// Extrait les overrides de config.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            grid_size: self.grid_size,
            levels: self.levels,
            symbols: self.symbols.clone(),
            contrast: self.contrast,
            interval: self.interval,
            device: self.device.clone(),
            snapshot: self.snapshot || self.once,
        }
    }
}
