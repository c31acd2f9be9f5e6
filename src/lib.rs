//! mdsite: a pandoc-driven static site generator.
//!
//! Markdown sources with templated frontmatter are rendered in two phases
//! (frontmatter first, body second), converted to HTML through an external
//! pandoc-compatible command, and wrapped in page templates.

pub mod assets;
pub mod build;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod frontmatter;
pub mod logger;
pub mod pandoc;
pub mod render;
pub mod report;
pub mod tree;
