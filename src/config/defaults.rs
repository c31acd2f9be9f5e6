//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn output() -> PathBuf {
        "output".into()
    }

    pub fn default_template() -> String {
        "default.html.jinja".into()
    }

    pub fn intermediates() -> Option<PathBuf> {
        None
    }

    pub fn marker() -> PathBuf {
        ".build_time".into()
    }

    pub fn copy_include() -> Vec<String> {
        Vec::new()
    }

    pub fn copy_exclude() -> Vec<String> {
        vec!["*.md".into()]
    }
}

// ============================================================================
// [pandoc] Section Defaults
// ============================================================================

pub mod pandoc {
    use serde_json::{Map, Value};

    pub fn command() -> Vec<String> {
        vec!["pandoc".into()]
    }

    pub fn from() -> String {
        "markdown+smart".into()
    }

    pub fn to() -> String {
        "html".into()
    }

    pub fn args() -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("mathjax".into(), Value::Bool(true));
        args
    }
}
