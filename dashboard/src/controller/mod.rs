//! Pipeline refresh controllers

pub mod build_logs;
pub mod interval;
pub mod merge;
pub mod pipeline;

pub use pipeline::{ControllerStatus, Options, PipelineController};
