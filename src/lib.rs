//! # async-classifier
//!
//! Static sync/async classification of calls into an embedded runtime API,
//! derived from `.d.ts` declaration files and alias productions in source.
//!
//! ## Architecture
//!
//! - **config**: Runtime roots, async wrapper names, traversal limits
//! - **lexer**: Token stream for declaration documents
//! - **declaration**: Declaration document parsing into registry fragments
//! - **registry**: Canonical runtime path to method descriptor map, named types
//! - **alias**: Alias extraction from JavaScript/TypeScript sources using tree-sitter
//! - **resolve**: Alias-aware path resolution back to canonical runtime paths
//! - **scan**: Project root discovery and the two-pass project scan
//! - **cache**: Per-root classification state, memoization and invalidation

pub mod alias;
pub mod cache;
pub mod cli;
pub mod config;
pub mod declaration;
pub mod lexer;
pub mod registry;
pub mod resolve;
pub mod scan;
