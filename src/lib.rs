//! har-replay - Serve recorded HAR traffic as a local HTTP server
//!
//! Replays previously captured HTTP archives so clients can be tested
//! against deterministic responses without a real backend.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod har;
pub mod network;
pub mod policy;
pub mod replay;

pub use error::{ReplayError, Result};
