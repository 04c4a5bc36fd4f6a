//! Shared utilities for the streaming (sweep-line) transforms.
//!
//! Sweep-line transforms keep O(k) state where k is the maximum number of
//! overlapping intervals, and rely on sorted input.

pub mod validation;

pub use validation::SortValidator;
