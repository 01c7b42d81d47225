//! In-memory caches

pub mod timed;
