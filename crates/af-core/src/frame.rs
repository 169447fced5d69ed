/// Frame brute livrée par la capture. Immuable une fois publiée.
///
/// Stocke les pixels en RGBA row-major, 4 bytes par pixel. Les sources la
/// partagent en `Arc<FrameBuffer>` ; le pipeline ne la modifie jamais.
///
/// # Example
/// ```
/// use af_core::frame::FrameBuffer;
/// let fb = FrameBuffer::new(10, 10);
/// assert_eq!(fb.data.len(), 400);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixels RGBA, row-major, 4 bytes par pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Crée un buffer noir transparent aux dimensions données.
    ///
    /// # Example
    /// ```
    /// use af_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::new(100, 50);
    /// assert_eq!(fb.width, 100);
    /// assert_eq!(fb.data.len(), 100 * 50 * 4);
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; Self::byte_len(width, height)],
            width,
            height,
        }
    }

    /// Crée un buffer uniforme, alpha opaque.
    ///
    /// # Example
    /// ```
    /// use af_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::solid(2, 2, 128, 128, 128);
    /// assert_eq!(&fb.data[..4], &[128, 128, 128, 255]);
    /// ```
    #[must_use]
    pub fn solid(width: u32, height: u32, r: u8, g: u8, b: u8) -> Self {
        let mut fb = Self::new(width, height);
        for px in fb.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
        fb
    }

    /// Number of bytes a `width × height` RGBA frame occupies.
    #[inline]
    #[must_use]
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// `true` when `data` holds at least `width × height × 4` bytes.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.data.len() >= Self::byte_len(self.width, self.height)
    }
}

/// Triplet RGB échantillonné (alpha ignoré).
pub type Rgb = [u8; 3];

/// Grille N×N de triplets RGB, row-major, longueur fixe.
///
/// Une cellule dont les octets manquent (buffer tronqué) vaut `None` :
/// l'absence est explicite, jamais un trou.
///
/// # Example
/// ```
/// use af_core::frame::SampleGrid;
/// let grid = SampleGrid::new(4);
/// assert_eq!(grid.cells().len(), 16);
/// assert_eq!(grid.get(3, 3), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleGrid {
    cells: Vec<Option<Rgb>>,
    size: u16,
}

impl SampleGrid {
    /// Crée une grille dont toutes les cellules sont absentes.
    #[must_use]
    pub fn new(size: u16) -> Self {
        Self {
            cells: vec![None; usize::from(size) * usize::from(size)],
            size,
        }
    }

    /// Side length N.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Cell at column `x`, row `y`.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<Rgb> {
        self.cells[usize::from(y) * usize::from(self.size) + usize::from(x)]
    }

    /// Write a cell.
    #[inline(always)]
    pub fn set(&mut self, x: u16, y: u16, rgb: Option<Rgb>) {
        self.cells[usize::from(y) * usize::from(self.size) + usize::from(x)] = rgb;
    }

    /// All cells, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Option<Rgb>] {
        &self.cells
    }

    /// Mutable access for in-place rebuilds.
    #[inline]
    pub fn cells_mut(&mut self) -> &mut [Option<Rgb>] {
        &mut self.cells
    }
}

/// Grille N×N de niveaux quantifiés, row-major. Artefact remis au renderer.
///
/// Les cellules absentes sont stockées avec la sentinelle [`LevelGrid::ABSENT`] ;
/// tous les accesseurs publics qui rendent un niveau la résolvent en 0.
///
/// # Example
/// ```
/// use af_core::frame::LevelGrid;
/// let mut grid = LevelGrid::new(2);
/// grid.set(0, 0, 3);
/// assert_eq!(grid.level(0, 0), 3);
/// assert_eq!(grid.level(1, 1), 0); // absente → niveau 0
/// assert_eq!(grid.get(1, 1), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelGrid {
    cells: Vec<u8>,
    size: u16,
}

impl LevelGrid {
    /// Sentinelle d'absence. Jamais un niveau valide (K ≤ 255 ⇒ niveau max 254).
    pub const ABSENT: u8 = u8::MAX;

    /// Crée une grille entièrement absente.
    #[must_use]
    pub fn new(size: u16) -> Self {
        Self {
            cells: vec![Self::ABSENT; usize::from(size) * usize::from(size)],
            size,
        }
    }

    /// Side length N.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Niveau brut de la cellule, `None` si absente.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<u8> {
        match self.cells[self.index(x, y)] {
            Self::ABSENT => None,
            level => Some(level),
        }
    }

    /// Niveau résolu : une cellule absente vaut 0 (le plus sombre).
    #[inline(always)]
    #[must_use]
    pub fn level(&self, x: u16, y: u16) -> u8 {
        self.get(x, y).unwrap_or(0)
    }

    /// Write a level.
    #[inline(always)]
    pub fn set(&mut self, x: u16, y: u16, level: u8) {
        let idx = self.index(x, y);
        self.cells[idx] = level;
    }

    /// Mark a cell absent.
    #[inline(always)]
    pub fn set_absent(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);
        self.cells[idx] = Self::ABSENT;
    }

    /// Mutable access to the raw cells (sentinel included) for in-place rebuilds.
    #[inline]
    pub fn raw_cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Resolved levels of one row.
    pub fn row(&self, y: u16) -> impl Iterator<Item = u8> + '_ {
        let start = usize::from(y) * usize::from(self.size);
        self.cells[start..start + usize::from(self.size)]
            .iter()
            .map(|&c| if c == Self::ABSENT { 0 } else { c })
    }

    /// Resolved levels, row-major.
    pub fn levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.cells
            .iter()
            .map(|&c| if c == Self::ABSENT { 0 } else { c })
    }

    /// Number of cells marked absent.
    #[must_use]
    pub fn absent_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Self::ABSENT).count()
    }

    /// Copy all cells from `other` into this grid.
    ///
    /// If dimensions differ, this grid is resized first (only happens when a
    /// new session changes the grid size).
    pub fn copy_from(&mut self, other: &LevelGrid) {
        if self.size == other.size {
            self.cells.copy_from_slice(&other.cells);
        } else {
            self.cells.clone_from(&other.cells);
            self.size = other.size;
        }
    }

    #[inline(always)]
    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.size) + usize::from(x)
    }
}
