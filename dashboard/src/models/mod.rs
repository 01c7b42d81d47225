//! Domain models

pub mod environment;
pub mod pipeline;
