/// Point fixe de l'étirement de contraste.
pub const MIDPOINT: f64 = 128.0;

/// Luminance d'un triplet RGB après remap de contraste, bornée à [0, 255].
///
/// `gray = (r + g + b) / 3` (moyenne non pondérée, pas BT.709), puis
/// `(gray - 128) * contrast + 128`, puis clamp dur. Calcul en `f64` pour
/// rester bit-identique à la référence double précision.
///
/// # Example
/// ```
/// use af_ascii::luminance::to_luminance;
/// assert_eq!(to_luminance(0, 0, 0, 1.5), 0.0);
/// assert_eq!(to_luminance(255, 255, 255, 1.5), 255.0);
/// assert_eq!(to_luminance(128, 128, 128, 1.5), 128.0);
/// ```
#[inline(always)]
#[must_use]
pub fn to_luminance(r: u8, g: u8, b: u8, contrast: f64) -> f64 {
    let gray = (f64::from(r) + f64::from(g) + f64::from(b)) / 3.0;
    apply_contrast(gray, contrast)
}

/// Linear stretch around [`MIDPOINT`], clamped to [0, 255].
///
/// A NaN result (NaN contrast) collapses to 0.
#[inline(always)]
#[must_use]
pub fn apply_contrast(gray: f64, contrast: f64) -> f64 {
    let stretched = (gray - MIDPOINT) * contrast + MIDPOINT;
    if stretched.is_nan() {
        return 0.0;
    }
    stretched.clamp(0.0, 255.0)
}
