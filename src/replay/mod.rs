//! Replay engine for serving archived HTTP responses

mod compile;
mod engine;
mod store;

pub use engine::ReplayEngine;
pub use store::{ReplayResponse, ResponseStore, StoreStats};
