//! # Knowledge Assistant Core
//!
//! Pure retrieval and screening logic for Knowledge Assistant: data models,
//! the sliding-window chunker, cosine ranking, the embedding and generation
//! gateway traits, and the rule-based guardrails.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The application
//! crate supplies concrete gateways and owns the on-disk index.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod guardrails;
pub mod models;
pub mod search;

pub use error::{Error, Result};
