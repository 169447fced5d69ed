use af_core::config::{CaptureFlow, MosaicConfig};
use af_core::traits::DeviceInfo;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::canvas;
use crate::fps::CycleMeter;
use crate::view::MosaicView;

/// État de session tel qu'affiché (miroir du `SessionState` de l'app).
///
/// # Example
/// ```
/// use af_render::ui::StatusLine;
/// assert_eq!(StatusLine::Running.label(), "▶ LIVE");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusLine {
    /// Aucun flux ouvert.
    Idle,
    /// Flux ouvert, métadonnées pas encore reçues.
    Connecting,
    /// Cycles en cours.
    Running,
    /// Snapshot pris, scheduler arrêté.
    Frozen,
    /// Acquisition échouée.
    DeviceError(String),
}

impl StatusLine {
    /// Libellé court pour la sidebar.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "⏹ IDLE",
            Self::Connecting => "… OPEN",
            Self::Running => "▶ LIVE",
            Self::Frozen => "⏸ SNAP",
            Self::DeviceError(_) => "✖ ERROR",
        }
    }

    fn color(&self) -> Color {
        match self {
            Self::Idle => Color::DarkGray,
            Self::Connecting | Self::Frozen => Color::Yellow,
            Self::Running => Color::Green,
            Self::DeviceError(_) => Color::Red,
        }
    }
}

/// Vue de la liste de périphériques pour la sidebar.
pub struct DeviceListView<'a> {
    /// Entrées énumérées.
    pub devices: &'a [DeviceInfo],
    /// Ligne surlignée.
    pub selected: Option<usize>,
    /// Périphérique actif de la session.
    pub active: Option<&'a str>,
    /// Sélection désactivée (moins de deux entrées).
    pub enabled: bool,
    /// Message affiché à la place d'une liste vide.
    pub placeholder: Option<&'a str>,
}

/// Tout ce que `draw` lit en plus de la mosaïque.
pub struct UiState<'a> {
    /// État de la session.
    pub status: StatusLine,
    /// Config de la session courante.
    pub config: &'a MosaicConfig,
    /// Liste de sélection.
    pub devices: DeviceListView<'a>,
    /// Cadence pipeline.
    pub meter: &'a CycleMeter,
    /// Overlay d'aide visible.
    pub show_help: bool,
}

const SIDEBAR_WIDTH: u16 = 28;

/// Draw the full UI: mosaic + sidebar, help overlay on top.
pub fn draw(frame: &mut Frame, view: &MosaicView, state: &UiState<'_>) {
    let area = frame.area();

    // [mosaïque | sidebar]
    let chunks =
        Layout::horizontal([Constraint::Min(8), Constraint::Length(SIDEBAR_WIDTH)]).split(area);

    let mosaic_area = chunks[0];
    if view.has_content() {
        canvas::render_levels(frame.buffer_mut(), mosaic_area, view.grid(), view.symbols());
    } else {
        draw_placeholder(frame, mosaic_area, &state.status);
    }

    draw_sidebar(frame, chunks[1], state);

    if state.show_help {
        draw_help_overlay(frame, area);
    }
}

/// Message centré tant qu'aucune grille n'a été rendue.
fn draw_placeholder(frame: &mut Frame, area: Rect, status: &StatusLine) {
    let text = match status {
        StatusLine::DeviceError(reason) => format!("Caméra indisponible : {reason}"),
        StatusLine::Idle => "Aucune caméra ouverte".to_string(),
        _ => "En attente du premier frame…".to_string(),
    };
    let y = area.y + area.height / 2;
    let line_area = Rect::new(area.x, y, area.width, area.height.min(1));
    let p = Paragraph::new(Line::from(text))
        .alignment(ratatui::layout::Alignment::Center)
        .style(Style::default().fg(status.color()));
    frame.render_widget(p, line_area);
}

fn sidebar_lines<'a>(state: &'a UiState<'a>) -> Vec<Line<'a>> {
    let config = state.config;
    let heading = Style::default().fg(Color::Yellow);

    let flow = match config.capture_flow {
        CaptureFlow::Continuous => "Continu",
        CaptureFlow::Snapshot => "Snapshot",
    };
    let interval = state
        .meter
        .last_interval_ms()
        .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"));

    let mut lines = vec![
        Line::from(Span::styled(
            state.status.label(),
            Style::default().fg(state.status.color()),
        )),
    ];
    if let StatusLine::DeviceError(reason) = &state.status {
        lines.push(Line::from(Span::styled(
            format!(" {reason}"),
            Style::default().fg(Color::Red),
        )));
    }
    lines.extend([
        Line::from(""),
        Line::from(Span::styled("─ Mosaïque ──", heading)),
        Line::from(format!(" Grille: {0}×{0}", config.grid_size)),
        Line::from(format!(" Niveaux: {}", config.level_count)),
        Line::from(format!(" Symboles: {}", config.symbols)),
        Line::from(format!(" Contr: {:.2}", config.contrast_factor)),
        Line::from(format!(" Interv: {}ms", config.update_interval_ms)),
        Line::from(format!(" Flux: {flow}")),
        Line::from(""),
        Line::from(Span::styled("─ Caméras ───", heading)),
    ]);

    let list = &state.devices;
    if let Some(message) = list.placeholder {
        lines.push(Line::from(Span::styled(
            format!(" {message}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (i, device) in list.devices.iter().enumerate() {
        let is_active = list.active == Some(device.id.as_str());
        let marker = if is_active { "●" } else { "○" };
        let name = if device.label.is_empty() {
            format!("Caméra {}", i + 1)
        } else {
            device.label.clone()
        };
        let mut style = Style::default();
        if !list.enabled {
            style = style.fg(Color::DarkGray);
        } else if list.selected == Some(i) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::from(Span::styled(format!(" {marker} {name}"), style)));
    }

    lines.extend([
        Line::from(""),
        Line::from(Span::styled("─ Info ──────", heading)),
        Line::from(format!(" {:.1} cycles/s", state.meter.rate())),
        Line::from(format!(" Dernier: {interval}")),
        Line::from(format!(" Total: {}", state.meter.total())),
        Line::from(""),
        Line::from(Span::styled(" ? = aide", Style::default().fg(Color::DarkGray))),
    ]);
    lines
}

fn draw_sidebar(frame: &mut Frame, area: Rect, state: &UiState<'_>) {
    let sidebar = Paragraph::new(sidebar_lines(state))
        .block(Block::default().borders(Borders::LEFT).title(" camSCII "));
    frame.render_widget(sidebar, area);
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(Span::styled(
            " camSCII : Contrôles ",
            Style::default().fg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(" q/Esc    Quitter"),
        Line::from(" Ctrl-C   Quitter"),
        Line::from(" ↑/↓      Choisir la caméra"),
        Line::from(" Enter    Basculer sur la caméra"),
        Line::from(" r        Nouveau snapshot"),
        Line::from(" ?        Aide"),
        Line::from(""),
        Line::from(Span::styled(
            " ? ou Esc pour fermer ",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help_width = 38u16.min(area.width);
    let help_height = (help_text.len() as u16 + 2).min(area.height);
    let x = area.x + area.width.saturating_sub(help_width) / 2;
    let y = area.y + area.height.saturating_sub(help_height) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    let help = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Aide ")
            .style(Style::default().bg(Color::Black).fg(Color::White)),
    );

    frame.render_widget(Clear, help_area);
    frame.render_widget(help, help_area);
}
