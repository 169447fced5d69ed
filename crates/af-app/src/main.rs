use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use af_app::cli::{Cli, Overrides};
use af_app::{app, headless, hotreload, session, sources};
use af_core::clock::SystemClock;
use af_core::config::MosaicConfig;
use af_render::text::TextRenderer;
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;

/// Délai maximal avant le premier frame en mode sans terminal.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Source de capture
    let source = sources::build_source(&cli)?;
    log::info!("Source : {}", source.kind);

    if cli.list_devices {
        return list_devices(source.enumerator.as_ref());
    }

    // 4. Charger la config + overrides CLI
    let overrides = cli.overrides();
    let config = Arc::new(resolve_config(&cli, &overrides)?);

    // 5. Session (le périphérique vient de la config, --device inclus)
    let mut session = session::CaptureSession::new(source.backend, Arc::clone(&config))?;
    let device = config.device.clone();

    if cli.once || cli.plain {
        return run_plain(&cli, &mut session, device);
    }

    if let Err(e) = session.start(device) {
        // La TUI reste utilisable : l'erreur s'affiche et la liste permet d'en choisir une autre.
        log::warn!("Ouverture caméra : {e}");
    }

    // 6. Hot-reload config (thread interne notify)
    let shared = Arc::new(ArcSwap::new(config));
    let _watcher = if cli.config.exists() {
        let overlay = overrides.clone();
        match hotreload::spawn_config_watcher(&cli.config, &shared, move |c: &mut MosaicConfig| {
            overlay.apply(c);
        }) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Hot-reload indisponible : {e}");
                None
            }
        }
    } else {
        None
    };

    // 7. Terminal ratatui + boucle principale
    let terminal = ratatui::init();
    let mut app_instance = app::App::new(session, shared, source.enumerator);
    let result = app_instance.run(terminal);

    // 8. Restaurer le terminal (TOUJOURS, même en cas d'erreur)
    ratatui::restore();

    result
}

/// `--once` et `--plain` : grilles texte sur stdout.
fn run_plain(
    cli: &Cli,
    session: &mut session::CaptureSession,
    device: Option<String>,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    if cli.plain {
        let flag = Arc::clone(&stop);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .context("Installation du handler Ctrl-C")?;
    }

    session.start(device)?;
    let stdout = std::io::stdout().lock();
    let mut renderer = if cli.plain {
        TextRenderer::new(stdout).with_separator("\n")
    } else {
        TextRenderer::new(stdout)
    };
    let max_renders = cli.once.then_some(1);
    let rendered = headless::run_headless(
        session,
        &mut renderer,
        &SystemClock::new(),
        &stop,
        max_renders,
        OPEN_TIMEOUT,
    )?;
    log::info!("{rendered} grille(s) écrite(s)");

    if let Some(e) = renderer.take_error() {
        // Pipe fermé (ex : `| head`) : pas une erreur de l'utilisateur.
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(e).context("Écriture stdout");
        }
    }
    Ok(())
}

fn list_devices(enumerator: &dyn af_core::traits::DeviceEnumerator) -> Result<()> {
    let devices = enumerator.list_video_inputs()?;
    let mut out = std::io::stdout().lock();
    if devices.is_empty() {
        writeln!(out, "Aucune caméra trouvée")?;
    }
    for device in devices {
        if device.label.is_empty() {
            writeln!(out, "{}", device.id)?;
        } else {
            writeln!(out, "{}\t{}", device.id, device.label)?;
        }
    }
    Ok(())
}

/// Fichier config s'il existe, sinon défauts ; overrides CLI par-dessus.
fn resolve_config(cli: &Cli, overrides: &Overrides) -> Result<MosaicConfig> {
    let mut config = if cli.config.exists() {
        af_core::config::read_config(&cli.config)?
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        MosaicConfig::default()
    };
    overrides.apply(&mut config);
    config.clamp_all();
    config
        .validate()
        .with_context(|| format!("Config invalide ({})", cli.config.display()))?;
    Ok(config)
}
