//! Pipeline API wire models
//!
//! Request and response bodies for the upstream pipeline, build and log
//! services. Every service speaks JSON over HTTP with the operation named
//! in a target header, so each module also carries its target prefix.

pub mod models;
