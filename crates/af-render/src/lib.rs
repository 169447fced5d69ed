/// Renderer collaborators for camSCII.
///
/// Provides the ratatui canvas and layout, the TUI mosaic view, the text
/// renderer used by `--once` / `--plain`, and cycle-rate tracking.
pub mod canvas;
pub mod fps;
pub mod text;
pub mod ui;
pub mod view;
