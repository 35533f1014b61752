//! Domain types for the render worker.
//!
//! Configuration, job input validation, artifact descriptors, result
//! assembly and the error taxonomy. Nothing in this crate performs
//! network I/O.

pub mod artifact;
pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod result;
