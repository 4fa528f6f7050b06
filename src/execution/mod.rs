//! Launch execution

pub mod launcher;

pub use launcher::{prepare_pipeline, EventHandler, LaunchError, LaunchEvent, Launcher};
