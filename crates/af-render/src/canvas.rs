use af_core::charset::SymbolTable;
use af_core::frame::LevelGrid;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;

/// Colonnes terminal par cellule de grille. Une cellule terminal est environ
/// deux fois plus haute que large : doubler garde la mosaïque carrée.
pub const CELL_COLUMNS: u16 = 2;

/// Teinte de gris du niveau `level` sur `level_count`.
///
/// Niveau 0 (le plus sombre) reste lisible sur fond noir.
///
/// # Example
/// ```
/// use af_render::canvas::level_shade;
/// use ratatui::style::Color;
/// assert_eq!(level_shade(0, 5), Color::Rgb(64, 64, 64));
/// assert_eq!(level_shade(4, 5), Color::Rgb(255, 255, 255));
/// ```
#[must_use]
pub fn level_shade(level: u8, level_count: usize) -> Color {
    const FLOOR: u32 = 64;
    let top = level_count.saturating_sub(1).max(1) as u32;
    let level = u32::from(level).min(top);
    let v = (FLOOR + level * (255 - FLOOR) / top) as u8;
    Color::Rgb(v, v, v)
}

/// Taille terminal occupée par une grille `grid_size`.
#[must_use]
pub fn mosaic_extent(grid_size: u16) -> (u16, u16) {
    (grid_size.saturating_mul(CELL_COLUMNS), grid_size)
}

/// Écrit une `LevelGrid` dans un `ratatui::Buffer`, centrée dans `area`.
///
/// Écriture directe cellule par cellule, pas de widget. Ce qui dépasse de
/// `area` est tronqué.
///
/// # Example
/// ```
/// use af_core::charset::SymbolTable;
/// use af_core::frame::LevelGrid;
/// use af_render::canvas::render_levels;
/// use ratatui::buffer::Buffer;
/// use ratatui::layout::Rect;
///
/// let mut grid = LevelGrid::new(2);
/// grid.set(0, 0, 4);
/// let area = Rect::new(0, 0, 4, 2);
/// let mut buf = Buffer::empty(area);
/// render_levels(&mut buf, area, &grid, &SymbolTable::default());
/// assert_eq!(buf[(0, 0)].symbol(), ".");
/// assert_eq!(buf[(2, 0)].symbol(), "@");
/// ```
pub fn render_levels(buf: &mut Buffer, area: Rect, grid: &LevelGrid, symbols: &SymbolTable) {
    let size = grid.size();
    let (width, height) = mosaic_extent(size);
    let left = area.x + area.width.saturating_sub(width) / 2;
    let top = area.y + area.height.saturating_sub(height) / 2;
    let rows = size.min(area.height);
    let cols = size.min(area.width / CELL_COLUMNS);
    let mut utf8 = [0u8; 4];

    for gy in 0..rows {
        for gx in 0..cols {
            let level = grid.level(gx, gy);
            let symbol: &str = symbols.symbol(level).encode_utf8(&mut utf8);
            let fg = level_shade(level, symbols.len());
            for dx in 0..CELL_COLUMNS {
                if let Some(cell) = buf.cell_mut((left + gx * CELL_COLUMNS + dx, top + gy)) {
                    cell.set_symbol(symbol).set_fg(fg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shades_are_monotonic() {
        let mut prev = 0u8;
        for level in 0..10 {
            let Color::Rgb(v, _, _) = level_shade(level, 10) else {
                panic!("rgb expected");
            };
            assert!(v > prev || level == 0);
            prev = v;
        }
        assert_eq!(prev, 255);
    }

    #[test]
    fn absent_cells_render_as_darkest_symbol() {
        let grid = LevelGrid::new(3);
        let area = Rect::new(0, 0, 6, 3);
        let mut buf = Buffer::empty(area);
        render_levels(&mut buf, area, &grid, &SymbolTable::default());
        for y in 0..3 {
            for x in 0..6 {
                assert_eq!(buf[(x, y)].symbol(), "@");
            }
        }
    }

    #[test]
    fn mosaic_is_centered_and_clipped() {
        let mut grid = LevelGrid::new(2);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            grid.set(x, y, 4);
        }
        let area = Rect::new(0, 0, 8, 4);
        let mut buf = Buffer::empty(area);
        render_levels(&mut buf, area, &grid, &SymbolTable::default());
        // 4 colonnes × 2 lignes centrées dans 8 × 4 : origine (2, 1).
        assert_eq!(buf[(1, 1)].symbol(), " ");
        assert_eq!(buf[(2, 1)].symbol(), ".");
        assert_eq!(buf[(5, 2)].symbol(), ".");
        assert_eq!(buf[(6, 2)].symbol(), " ");

        let small = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(small);
        render_levels(&mut buf, small, &grid, &SymbolTable::default());
        assert_eq!(buf[(1, 0)].symbol(), ".");
    }
}
