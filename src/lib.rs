//! grimoire - a local documentation knowledge base
//!
//! This crate provides:
//! - A hierarchical chunker that splits parsed markdown into summary, section and paragraph chunks
//! - A single-file SQLite store with a full-text index and an embedding index kept in sync
//! - Hybrid retrieval fusing vector and lexical rankings with Reciprocal Rank Fusion
//! - CLI commands for ingesting language packs and an MCP server over stdio

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod mcp;
pub mod pack;
pub mod parse;
pub mod progress;
pub mod rank;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
