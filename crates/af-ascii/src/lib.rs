/// Frame-to-symbol conversion engine for camSCII.
///
/// Sampler → Tone Mapper → Quantizer, chained by the double-buffered
/// [`compositor::Compositor`].
pub mod compositor;
pub mod luminance;
pub mod quantize;
pub mod sampler;

pub use compositor::Compositor;
