//! src/transformer/common/mod.rs
//!
//! Utilities shared between the worker threads and the operations they run.

pub mod thread;
