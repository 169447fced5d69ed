/// Configuration, types, and shared structures for camSCII.
///
/// This crate contains the frame and grid types, the symbol table, the
/// collaborator traits (capture, enumeration, rendering) and configuration
/// logic used across the camSCII workspace.

pub mod charset;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod traits;

pub use charset::SymbolTable;
pub use config::MosaicConfig;
pub use error::{CaptureError, CoreError};
pub use frame::{FrameBuffer, LevelGrid, SampleGrid};

