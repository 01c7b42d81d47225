//! Application wiring and lifecycle

pub mod dashboard;
pub mod options;
pub mod run;
pub mod state;
