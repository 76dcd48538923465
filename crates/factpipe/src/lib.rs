//! `factpipe` crate (library surface).
//!
//! The primary entrypoint for end users is the `factpipe` binary (CLI + HTTP server).
//! This library exposes the HTTP router so it can be embedded or tested without a socket,
//! and re-exports the lower crates under stable names.

pub use factpipe_core as core;
pub use factpipe_local as local;

pub mod server;
