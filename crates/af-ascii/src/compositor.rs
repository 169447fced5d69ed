use af_core::config::MosaicConfig;
use af_core::frame::{FrameBuffer, LevelGrid, SampleGrid};

use crate::luminance::to_luminance;
use crate::quantize::quantize;
use crate::sampler::sample_into;

/// Compositor : frame brut → grille de niveaux, double-bufferisé.
///
/// Chaque cycle reconstruit entièrement le buffer arrière (échantillonnage,
/// tone mapping, quantification), puis l'échange avec le buffer avant. La
/// grille rendue n'est plus modifiée ensuite. Zéro allocation après `new`.
///
/// # Example
/// ```
/// use af_ascii::compositor::Compositor;
/// use af_core::frame::FrameBuffer;
///
/// let mut compositor = Compositor::new(4, 5, 1.5);
/// let grid = compositor.process(&FrameBuffer::solid(4, 4, 255, 255, 255));
/// assert!(grid.levels().all(|l| l == 4));
/// ```
pub struct Compositor {
    level_count: u8,
    contrast: f64,
    samples: SampleGrid,
    front: LevelGrid,
    back: LevelGrid,
    cycles: u64,
    size_warn_logged: bool,
}

impl Compositor {
    /// Create a compositor with preallocated grids.
    #[must_use]
    pub fn new(grid_size: u16, level_count: u8, contrast: f64) -> Self {
        Self {
            level_count,
            contrast,
            samples: SampleGrid::new(grid_size),
            front: LevelGrid::new(grid_size),
            back: LevelGrid::new(grid_size),
            cycles: 0,
            size_warn_logged: false,
        }
    }

    /// Compositor sized and tuned from a session config.
    #[must_use]
    pub fn from_config(config: &MosaicConfig) -> Self {
        Self::new(config.grid_size, config.level_count, config.contrast_factor)
    }

    /// Convertit `frame` et rend la nouvelle grille avant.
    ///
    /// Ne lève jamais : les cellules sans données sont marquées absentes.
    pub fn process(&mut self, frame: &FrameBuffer) -> &LevelGrid {
        let size = u32::from(self.samples.size());
        if (frame.width != size || frame.height != size) && !self.size_warn_logged {
            log::warn!(
                "Frame {}×{} pour une grille {size}×{size} : échantillonnage au pas de la grille",
                frame.width,
                frame.height
            );
            self.size_warn_logged = true;
        }

        sample_into(frame, &mut self.samples);

        let (level_count, contrast) = (self.level_count, self.contrast);
        for (out, cell) in self
            .back
            .raw_cells_mut()
            .iter_mut()
            .zip(self.samples.cells())
        {
            *out = match *cell {
                Some([r, g, b]) => quantize(to_luminance(r, g, b, contrast), level_count),
                None => LevelGrid::ABSENT,
            };
        }

        std::mem::swap(&mut self.front, &mut self.back);
        self.cycles += 1;

        let absent = self.front.absent_count();
        if absent > 0 {
            log::debug!("Frame incomplet : {absent} cellules absentes (niveau 0)");
        }
        &self.front
    }

    /// Dernière grille produite (absente partout avant le premier cycle).
    #[must_use]
    pub fn front(&self) -> &LevelGrid {
        &self.front
    }

    /// Nombre de cycles complétés.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// One-shot conversion. DO NOT use in hot path (allocates three grids).
///
/// # Example
/// ```
/// use af_ascii::compositor::convert;
/// use af_core::frame::FrameBuffer;
/// let grid = convert(&FrameBuffer::solid(2, 2, 0, 0, 0), 2, 5, 1.5);
/// assert_eq!(grid.level(1, 1), 0);
/// ```
#[must_use]
pub fn convert(frame: &FrameBuffer, grid_size: u16, level_count: u8, contrast: f64) -> LevelGrid {
    let mut compositor = Compositor::new(grid_size, level_count, contrast);
    compositor.process(frame).clone()
}
