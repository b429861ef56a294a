//! Nullable infrastructure for deterministic testing.
//!
//! The node talks to time and storage through traits. This crate provides
//! stand-ins that return deterministic values, can be steered from a test,
//! and never touch the filesystem.

pub mod clock;
pub mod store;

pub use clock::NullClock;
pub use store::NullStore;
