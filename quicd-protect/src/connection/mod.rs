//! # Per-Connection Keying State (RFC 9001 Section 4, 5)

pub mod state;

pub use state::KeyingState;
