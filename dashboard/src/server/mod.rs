//! Local HTTP view API

pub mod handlers;
pub mod serve;
pub mod state;
