use std::io::Write;

use af_core::charset::SymbolTable;
use af_core::frame::LevelGrid;
use af_core::traits::Renderer;

/// Matérialise une grille en texte, une ligne par rangée.
///
/// # Example
/// ```
/// use af_core::charset::SymbolTable;
/// use af_core::frame::LevelGrid;
/// use af_render::text::grid_to_string;
///
/// let mut grid = LevelGrid::new(2);
/// grid.set(1, 0, 4);
/// assert_eq!(grid_to_string(&grid, &SymbolTable::default()), "@.\n@@\n");
/// ```
#[must_use]
pub fn grid_to_string(grid: &LevelGrid, symbols: &SymbolTable) -> String {
    let size = usize::from(grid.size());
    let mut out = String::with_capacity(size * (size + 1));
    for y in 0..grid.size() {
        out.extend(grid.row(y).map(|l| symbols.symbol(l)));
        out.push('\n');
    }
    out
}

/// Renderer texte sur n'importe quel `Write` (stdout pour `--once` / `--plain`).
///
/// `Renderer::render` ne peut pas échouer : la première erreur d'écriture est
/// conservée et les grilles suivantes sont ignorées.
///
/// # Example
/// ```
/// use af_core::charset::SymbolTable;
/// use af_core::frame::LevelGrid;
/// use af_core::traits::Renderer;
/// use af_render::text::TextRenderer;
///
/// let mut r = TextRenderer::new(Vec::new());
/// r.render(&LevelGrid::new(1), &SymbolTable::default());
/// assert_eq!(r.into_inner(), b"@\n");
/// ```
pub struct TextRenderer<W: Write> {
    out: W,
    separator: Option<String>,
    written: u64,
    error: Option<std::io::Error>,
}

impl<W: Write> TextRenderer<W> {
    /// Renderer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            separator: None,
            written: 0,
            error: None,
        }
    }

    /// Texte écrit entre deux grilles (mode flux).
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Grilles écrites avec succès.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Première erreur d'écriture, le cas échéant.
    pub fn take_error(&mut self) -> Option<std::io::Error> {
        self.error.take()
    }

    /// Rend le writer sous-jacent.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_grid(&mut self, grid: &LevelGrid, symbols: &SymbolTable) -> std::io::Result<()> {
        if self.written > 0
            && let Some(sep) = &self.separator
        {
            self.out.write_all(sep.as_bytes())?;
        }
        self.out.write_all(grid_to_string(grid, symbols).as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, grid: &LevelGrid, symbols: &SymbolTable) {
        if self.error.is_some() {
            return;
        }
        match self.write_grid(grid, symbols) {
            Ok(()) => self.written += 1,
            Err(e) => {
                log::warn!("Écriture de la grille impossible : {e}");
                self.error = Some(e);
            }
        }
    }
}
