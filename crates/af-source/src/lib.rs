/// Capture backends for camSCII (camera via ffmpeg, still image, test patterns).

pub mod camera;
pub mod devices;
pub mod pattern;

#[cfg(feature = "image-source")]
pub mod image;
#[cfg(feature = "image-source")]
pub mod resize;
