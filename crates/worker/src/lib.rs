//! `comfyrun-worker` library crate.
//!
//! Materialization, stage events and the end-to-end job handler. The
//! binary entrypoint lives in `main.rs`.

pub mod events;
pub mod handler;
pub mod materialize;

pub use handler::JobHandler;
