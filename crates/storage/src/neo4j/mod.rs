//! Neo4j graph backend

mod client;

pub use client::Neo4jGraphStore;
