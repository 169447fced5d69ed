use af_core::charset::SymbolTable;
use af_core::frame::LevelGrid;
use af_core::traits::Renderer;

/// Renderer TUI : garde une copie de la dernière grille pour le prochain draw.
///
/// Le pipeline tourne à sa propre cadence (intervalle de mise à jour), le
/// terminal à la sienne (`ui_fps`). La vue fait le pont : `render` copie dans
/// un buffer préalloué, `ui::draw` relit ce buffer autant de fois que voulu.
///
/// # Example
/// ```
/// use af_core::charset::SymbolTable;
/// use af_core::frame::LevelGrid;
/// use af_core::traits::Renderer;
/// use af_render::view::MosaicView;
///
/// let mut view = MosaicView::new(4);
/// assert!(!view.has_content());
/// view.render(&LevelGrid::new(4), &SymbolTable::default());
/// assert!(view.has_content());
/// assert_eq!(view.renders(), 1);
/// ```
pub struct MosaicView {
    grid: LevelGrid,
    symbols: SymbolTable,
    renders: u64,
}

impl MosaicView {
    /// Create an empty view for a `grid_size` grid.
    #[must_use]
    pub fn new(grid_size: u16) -> Self {
        Self {
            grid: LevelGrid::new(grid_size),
            symbols: SymbolTable::default(),
            renders: 0,
        }
    }

    /// Dernière grille reçue.
    #[must_use]
    pub fn grid(&self) -> &LevelGrid {
        &self.grid
    }

    /// Table de symboles de la dernière grille.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// `true` once at least one grid was rendered since the last clear.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.renders > 0
    }

    /// Grilles reçues depuis le dernier `clear`.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Vide la vue (changement de session ou de taille de grille).
    pub fn clear(&mut self, grid_size: u16) {
        self.grid = LevelGrid::new(grid_size);
        self.renders = 0;
    }
}

impl Renderer for MosaicView {
    fn render(&mut self, grid: &LevelGrid, symbols: &SymbolTable) {
        self.grid.copy_from(grid);
        if self.symbols != *symbols {
            self.symbols = symbols.clone();
        }
        self.renders += 1;
    }
}
