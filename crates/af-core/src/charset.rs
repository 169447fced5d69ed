use crate::error::CoreError;

/// Table par défaut, 5 niveaux, du plus sombre au plus clair.
pub const SYMBOLS_DEFAULT: &str = "@%#*.";

/// Table 10 niveaux, même orientation sombre→clair.
pub const SYMBOLS_DENSE: &str = "@%#*+=-:. ";

/// Blocs Unicode, sombre→clair.
pub const SYMBOLS_BLOCKS: &str = "█▓▒░ ";

/// Table niveau → symbole, ordonnée du plus sombre au plus clair.
///
/// Sa longueur est exactement le nombre de niveaux K du quantizer.
///
/// # Example
/// ```
/// use af_core::charset::SymbolTable;
/// let table = SymbolTable::default();
/// assert_eq!(table.len(), 5);
/// assert_eq!(table.symbol(0), '@');
/// assert_eq!(table.symbol(4), '.');
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<char>,
}

impl SymbolTable {
    /// Build a table and check it has one symbol per level.
    ///
    /// # Errors
    /// Returns [`CoreError::SymbolTableMismatch`] when the symbol count differs
    /// from `level_count`.
    ///
    /// # Example
    /// ```
    /// use af_core::charset::SymbolTable;
    /// assert!(SymbolTable::new("@#.", 3).is_ok());
    /// assert!(SymbolTable::new("@#.", 5).is_err());
    /// ```
    pub fn new(symbols: &str, level_count: u8) -> Result<Self, CoreError> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.len() != usize::from(level_count) {
            return Err(CoreError::SymbolTableMismatch {
                expected: usize::from(level_count),
                actual: symbols.len(),
            });
        }
        Ok(Self { symbols })
    }

    /// Number of levels K.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// `true` for an empty table (never produced by [`SymbolTable::new`] with K ≥ 1).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol for `level`. Out-of-range levels fall back to the darkest symbol.
    #[inline(always)]
    #[must_use]
    pub fn symbol(&self, level: u8) -> char {
        self.symbols
            .get(usize::from(level))
            .or_else(|| self.symbols.first())
            .copied()
            .unwrap_or(' ')
    }

    /// Symbols, dark→light.
    #[must_use]
    pub fn as_slice(&self) -> &[char] {
        &self.symbols
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            symbols: SYMBOLS_DEFAULT.chars().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_dark_to_light() {
        for preset in [SYMBOLS_DEFAULT, SYMBOLS_DENSE, SYMBOLS_BLOCKS] {
            let k = preset.chars().count() as u8;
            let table = SymbolTable::new(preset, k).unwrap();
            assert_eq!(table.len(), usize::from(k));
            assert_ne!(table.symbol(0), ' ', "level 0 must be the densest symbol");
        }
    }

    #[test]
    fn out_of_range_level_falls_back_to_darkest() {
        let table = SymbolTable::default();
        assert_eq!(table.symbol(200), '@');
    }

    #[test]
    fn multibyte_symbols_count_as_one_level() {
        let table = SymbolTable::new(SYMBOLS_BLOCKS, 5).unwrap();
        assert_eq!(table.symbol(0), '█');
    }
}
