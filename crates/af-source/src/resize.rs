use af_core::frame::FrameBuffer;
use anyhow::{Context, Result};
use fast_image_resize::images::Image;
use fast_image_resize::{PixelType, ResizeOptions, Resizer as FirResizer};

/// Recadrage centré au format carré, `(left, top, side)`.
///
/// La grille ne gère que l'échantillonnage carré : on coupe les bords plutôt
/// que de déformer l'image.
///
/// # Example
/// ```
/// use af_source::resize::square_crop;
/// assert_eq!(square_crop(640, 480), (80, 0, 480));
/// assert_eq!(square_crop(100, 100), (0, 0, 100));
/// ```
#[must_use]
pub fn square_crop(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Resizer réutilisable wrappant fast_image_resize, recadrage carré inclus.
///
/// Utilisé par les sources qui ne savent pas livrer N×N d'elles-mêmes
/// (image fixe). La caméra passe par le filtre `scale` de ffmpeg.
///
/// # Example
/// ```
/// use af_source::resize::SquareResizer;
/// let r = SquareResizer::new();
/// ```
pub struct SquareResizer {
    inner: FirResizer,
    /// Scratch copy of the source (fast_image_resize wants `&mut` on it).
    src_buf: Vec<u8>,
}

impl SquareResizer {
    /// Create a new resizer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: FirResizer::new(),
            src_buf: Vec::new(),
        }
    }

    /// Recadre `src` au carré centré puis le redimensionne dans `dst`.
    ///
    /// `dst` doit être carré ; ses dimensions déterminent la sortie.
    ///
    /// # Errors
    /// Returns an error if either buffer does not match its dimensions.
    ///
    /// # Example
    /// ```
    /// use af_source::resize::SquareResizer;
    /// use af_core::frame::FrameBuffer;
    /// let mut r = SquareResizer::new();
    /// let src = FrameBuffer::solid(200, 100, 50, 50, 50);
    /// let mut dst = FrameBuffer::new(16, 16);
    /// r.resize_into(&src, &mut dst).unwrap();
    /// assert!(dst.data[0].abs_diff(50) <= 1);
    /// ```
    pub fn resize_into(&mut self, src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
        if src.width == dst.width && src.height == dst.height {
            dst.data.copy_from_slice(&src.data);
            return Ok(());
        }

        self.src_buf.clear();
        self.src_buf.extend_from_slice(&src.data);

        let src_image =
            Image::from_slice_u8(src.width, src.height, &mut self.src_buf, PixelType::U8x4)
                .context("Dimensions source invalides")?;
        let mut dst_image =
            Image::from_slice_u8(dst.width, dst.height, &mut dst.data, PixelType::U8x4)
                .context("Dimensions destination invalides")?;

        let (left, top, side) = square_crop(src.width, src.height);
        let options = ResizeOptions::new().crop(
            f64::from(left),
            f64::from(top),
            f64::from(side),
            f64::from(side),
        );

        self.inner
            .resize(&src_image, &mut dst_image, Some(&options))
            .context("Resize failed")?;

        Ok(())
    }
}

impl Default for SquareResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience for one-shot usage: `src` → `size × size`.
///
/// # Errors
/// Returns an error if the resize operation fails.
///
/// # Example
/// ```
/// use af_source::resize::resize_square;
/// use af_core::frame::FrameBuffer;
/// let dst = resize_square(&FrameBuffer::new(320, 240), 64).unwrap();
/// assert_eq!((dst.width, dst.height), (64, 64));
/// ```
pub fn resize_square(src: &FrameBuffer, size: u32) -> Result<FrameBuffer> {
    let mut dst = FrameBuffer::new(size, size);
    SquareResizer::new().resize_into(src, &mut dst)?;
    Ok(dst)
}
