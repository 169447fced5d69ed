use af_core::frame::{FrameBuffer, SampleGrid};

/// Échantillonne un frame N×N en grille RGB, par sélection directe du pixel.
///
/// La capture livre déjà des frames `grid_size × grid_size` : la cellule
/// (x, y) lit les 4 octets à `(y * grid_size + x) * 4`. Pas de moyenne ni
/// d'interpolation. Une cellule dont R, G ou B dépasse la fin du buffer est
/// absente.
///
/// # Example
/// ```
/// use af_core::frame::FrameBuffer;
/// use af_ascii::sampler::sample;
///
/// let frame = FrameBuffer::solid(4, 4, 10, 20, 30);
/// let grid = sample(&frame, 4);
/// assert_eq!(grid.get(3, 2), Some([10, 20, 30]));
/// ```
#[must_use]
pub fn sample(frame: &FrameBuffer, grid_size: u16) -> SampleGrid {
    let mut grid = SampleGrid::new(grid_size);
    sample_into(frame, &mut grid);
    grid
}

/// Variante sans allocation : réécrit toutes les cellules de `grid`.
///
/// La taille de `grid` fait foi pour le pas d'échantillonnage.
#[inline]
pub fn sample_into(frame: &FrameBuffer, grid: &mut SampleGrid) {
    let data = frame.data.as_slice();
    for (i, cell) in grid.cells_mut().iter_mut().enumerate() {
        let idx = i * 4;
        *cell = match data.get(idx..idx + 3) {
            Some(&[r, g, b]) => Some([r, g, b]),
            _ => None,
        };
    }
}
