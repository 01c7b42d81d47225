//! pipedash library
//!
//! Keeps a live view of deployment pipelines across environments. Each
//! pipeline gets a refresh controller that polls the upstream services,
//! merges definition and state, and adapts its interval to activity.

pub mod app;
pub mod cache;
pub mod controller;
pub mod errors;
pub mod filesys;
pub mod gateway;
pub mod logs;
pub mod models;
pub mod render;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
