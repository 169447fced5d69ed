/// Bucketise une luminance [0, 255] sur `level_count` niveaux.
///
/// `floor((luminance / 255) * (level_count - 1))`. Bucketing linéaire, pas
/// d'égalisation d'histogramme : le banding est attendu. L'entrée est bornée
/// avant calcul, donc la sortie est toujours dans `[0, level_count - 1]`.
///
/// # Example
/// ```
/// use af_ascii::quantize::quantize;
/// assert_eq!(quantize(0.0, 5), 0);
/// assert_eq!(quantize(128.0, 5), 2);
/// assert_eq!(quantize(255.0, 5), 4);
/// ```
#[inline(always)]
#[must_use]
pub fn quantize(luminance: f64, level_count: u8) -> u8 {
    if level_count <= 1 {
        return 0;
    }
    let top = level_count - 1;
    let lum = if luminance.is_nan() {
        0.0
    } else {
        luminance.clamp(0.0, 255.0)
    };
    let level = ((lum / 255.0) * f64::from(top)).floor() as u8;
    level.min(top)
}
