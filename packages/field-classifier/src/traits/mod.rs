//! Core trait abstractions for the classification library.
//!
//! These traits define the seams where LLM providers and batch/result
//! storage plug in.

pub mod backend;
pub mod store;
