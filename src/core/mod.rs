//! Core domain models for the launcher
//!
//! This module defines the launch configuration, the pipeline graph and its
//! steps, runtime parameters and the execution states reported back by the
//! orchestration backend.

pub mod config;
pub mod parameter;
pub mod pipeline;
pub mod settings;
pub mod state;
pub mod step;

pub use config::*;
pub use parameter::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
