//! Resolvers: nearest-record retrieval for keyword candidates.
//!
//! The index itself sits behind `VectorIndex`. `TypesenseIndex` is the
//! production backend; `EmptyIndex` is used when no index is configured.

pub mod index;
pub mod retriever;
pub mod types;
pub mod typesense;

pub use index::{EmptyIndex, VectorIndex};
pub use retriever::{SimilarityRetriever, DEFAULT_SIMILARITY_FLOOR};
pub use types::*;
pub use typesense::{TypesenseConfig, TypesenseIndex};
