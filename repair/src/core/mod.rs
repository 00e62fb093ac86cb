//! Deterministic, pure logic for the repair loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod budget;
pub mod feedback;
pub mod schema;
pub mod state;
pub mod text;
pub mod transition;
pub mod types;
pub mod verdict;
