use std::path::Path;
use std::sync::Arc;

use af_core::config::MosaicConfig;
use anyhow::Result;
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecursiveMode, Watcher};

/// Recharge `path`, applique `overlay` (overrides CLI), valide, publie.
///
/// Retourne `true` si une nouvelle config a été publiée. Une config invalide
/// est journalisée et ignorée : l'ancienne reste en place.
pub fn reload_into(
    path: &Path,
    config: &ArcSwap<MosaicConfig>,
    overlay: &dyn Fn(&mut MosaicConfig),
) -> bool {
    let loaded = af_core::config::read_config(path).and_then(|mut new_config| {
        overlay(&mut new_config);
        new_config.clamp_all();
        new_config.validate()?;
        Ok(new_config)
    });
    match loaded {
        Ok(new_config) => {
            if **config.load() == new_config {
                log::debug!("Config inchangée : {}", path.display());
                return false;
            }
            config.store(Arc::new(new_config));
            log::info!("Config rechargée depuis {}", path.display());
            true
        }
        Err(e) => {
            log::warn!("Erreur de rechargement config : {e:#}");
            false
        }
    }
}

/// Surveille le fichier config et met à jour l'ArcSwap.
///
/// Retourne le Watcher (doit rester vivant tant que l'app tourne). La boucle
/// principale compare le pointeur publié à celui de sa session et démarre une
/// nouvelle session quand il change.
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use arc_swap::ArcSwap;
/// use af_core::config::MosaicConfig;
/// use af_app::hotreload::spawn_config_watcher;
/// use std::path::Path;
///
/// let config = Arc::new(ArcSwap::from_pointee(MosaicConfig::default()));
/// let _watcher = spawn_config_watcher(Path::new("config/default.toml"), &config, |_| {});
/// ```
pub fn spawn_config_watcher<F>(
    config_path: &Path,
    config: &Arc<ArcSwap<MosaicConfig>>,
    overlay: F,
) -> Result<impl Watcher + use<F>>
where
    F: Fn(&mut MosaicConfig) + Send + 'static,
{
    let config = Arc::clone(config);
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        {
            reload_into(&path, &config, &overlay);
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
