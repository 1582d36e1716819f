//! Qdrant vector store integration
//!
//! The harness only needs three vector-store operations: make sure a
//! collection exists, upsert points, and run a nearest-neighbour query.
//! They are expressed as the `VectorStore` trait so the search tool and
//! indexer can run against an in-memory double in tests.

pub mod client;

pub use client::{Point, QdrantClient, ScoredPoint, VectorStore};
