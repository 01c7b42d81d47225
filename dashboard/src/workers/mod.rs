//! Background workers

pub mod cache_purge;
