//! Relationship Resolution
//!
//! Turns per-file extraction results into the final, deduplicated graph:
//! - `CONTAINS` from each file to the definitions it holds
//! - `DEFINES` from each class to its methods
//! - `IMPORTS` from each file to a library or another project file
//! - `CALLS` from each function/method to its resolved callee or an external placeholder

pub mod resolver;
pub mod symbol_table;

pub use resolver::{ResolveStats, ResolvedGraph, Resolver};
pub use symbol_table::{Resolution, SymbolTable};
