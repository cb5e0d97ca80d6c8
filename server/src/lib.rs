//! Local entry point for the code-search tools: symbol extraction, the
//! structural-stub fallback, and the MCP tool handlers built on top of
//! `codesearch_core`. The wire transport these are served over is out of
//! scope here — see `tools::ToolContext` for the boundary.

#[cfg(feature = "treesitter")]
pub mod ast;
pub mod stubs;
pub mod tools;
