//! Multi-language extraction of symbols and edges
//!
//! Tree-sitter grammar adapters cover Rust, Python, JavaScript, TypeScript,
//! TSX and Go. Other common languages go through a line-based degraded
//! extractor that only reports top-level declarations.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod extraction_framework;
mod go;
mod javascript;
mod python;
mod rust;
mod typescript;

pub mod adapter;
pub mod common;
pub mod degraded;
pub mod parser_manager;

pub use adapter::{GrammarAdapter, QueryKind};
pub use degraded::{extract_degraded, is_degraded_language};
pub use parser_manager::{ParserManager, ParserOptions};
