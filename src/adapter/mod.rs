//! Language Adapter Framework
//!
//! Each language provides a tree-sitter grammar plus a small normalization
//! table mapping grammar shape onto the generic syntax tree. The conversion
//! and query pipeline never see language-specific logic.

pub mod framework;
pub mod javascript;
pub mod python;

pub use framework::{AdapterRegistry, LanguageAdapter, default_registry, registry_for};
pub use javascript::JavaScriptAdapter;
pub use python::PythonAdapter;
