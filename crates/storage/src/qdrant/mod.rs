//! Qdrant vector backend

mod client;

pub use client::QdrantVectorStore;
