//! Application Layer - Series retrieval.

mod engine;

pub use engine::RetrievalEngine;
