//! camSCII : session de capture, cadence et surfaces (TUI, stdout).

pub mod app;
pub mod cli;
pub mod headless;
pub mod hotreload;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod sources;
