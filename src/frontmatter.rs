//! Frontmatter splitting and parsing.
//!
//! A markdown source file starts with a frontmatter block fenced by a
//! repeated delimiter line; the delimiter picks the data format:
//!
//! ```text
//! ---   YAML
//! ;;;   JSON
//! +++   TOML
//! ```
//!
//! [`split`] separates the raw frontmatter text from the body without
//! touching either; [`parse`] turns the (already template-rendered)
//! frontmatter text into a JSON object.

use crate::error::FrontmatterParseError;
use serde_json::{Map, Value};

/// Supported frontmatter formats, keyed by their fence delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

/// Delimiter → format mapping. Order matters only for documentation.
pub const DELIMITERS: [(&str, Format); 3] = [
    ("---", Format::Yaml),
    (";;;", Format::Json),
    ("+++", Format::Toml),
];

impl Format {
    /// The three-character fence line that selects this format.
    pub const fn delimiter(self) -> &'static str {
        match self {
            Format::Yaml => "---",
            Format::Json => ";;;",
            Format::Toml => "+++",
        }
    }
}

/// Split a source document into `(format, frontmatter, body)`.
///
/// The opening delimiter must be the very first line. The frontmatter is
/// everything up to the next occurrence of the same delimiter on its own
/// line (shortest match); the body is everything after that line, newlines
/// included. Returns `None` when no frontmatter block can be found; the
/// caller attaches the file path.
pub fn split(content: &str) -> Option<(Format, &str, &str)> {
    for (delim, format) in DELIMITERS {
        let Some(rest) = content.strip_prefix(delim) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix('\n') else {
            continue;
        };
        // Shortest match: first closing fence wins.
        let fence = format!("\n{delim}\n");
        let end = rest.find(&fence)?;
        let frontmatter = &rest[..end];
        let body = &rest[end + fence.len()..];
        return Some((format, frontmatter, body));
    }
    None
}

/// Parse rendered frontmatter text into a JSON object in the given format.
///
/// An empty (or YAML-null) block parses to an empty mapping; any other
/// non-mapping top-level value is an error.
pub fn parse(format: Format, text: &str) -> Result<Map<String, Value>, FrontmatterParseError> {
    let value: Value = match format {
        Format::Yaml => serde_yaml::from_str(text)?,
        Format::Json => serde_json::from_str(text)?,
        Format::Toml => {
            let table: toml::Table = toml::from_str(text)?;
            toml_to_json(toml::Value::Table(table))
        }
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(FrontmatterParseError::NotAMapping(value_kind(&other))),
    }
}

/// Convert a TOML value into a JSON value. Datetimes become their string
/// representation.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_yaml_roundtrip() {
        let content = "---\ntitle: hello\ndraft: false\n---\n# Heading\n\nbody text\n";
        let (format, frontmatter, body) = split(content).unwrap();
        assert_eq!(format, Format::Yaml);
        assert_eq!(frontmatter, "title: hello\ndraft: false");
        assert_eq!(body, "# Heading\n\nbody text\n");
    }

    #[test]
    fn split_json_and_toml_delimiters() {
        let (format, frontmatter, _) = split(";;;\n{\"a\": 1}\n;;;\nbody").unwrap();
        assert_eq!(format, Format::Json);
        assert_eq!(frontmatter, "{\"a\": 1}");

        let (format, frontmatter, _) = split("+++\na = 1\n+++\nbody").unwrap();
        assert_eq!(format, Format::Toml);
        assert_eq!(frontmatter, "a = 1");
    }

    #[test]
    fn split_empty_frontmatter() {
        let (format, frontmatter, body) = split("---\n\n---\nbody\n").unwrap();
        assert_eq!(format, Format::Yaml);
        assert_eq!(frontmatter, "");
        assert_eq!(body, "body\n");
    }

    #[test]
    fn split_takes_first_closing_fence() {
        // The body may itself contain a fence line; only the first one closes.
        let (_, frontmatter, body) = split("---\na: 1\n---\nmiddle\n---\ntail\n").unwrap();
        assert_eq!(frontmatter, "a: 1");
        assert_eq!(body, "middle\n---\ntail\n");
    }

    #[test]
    fn split_requires_opening_fence_at_start() {
        assert!(split("\n---\na: 1\n---\nbody").is_none());
        assert!(split("# no frontmatter at all\n").is_none());
    }

    #[test]
    fn split_requires_matching_closing_fence() {
        // A different delimiter does not close the block.
        assert!(split("---\na: 1\n+++\nbody").is_none());
        assert!(split("---\na: 1\n").is_none());
    }

    #[test]
    fn split_is_exact_no_whitespace_normalization() {
        let (_, frontmatter, body) = split("---\n  a:   1\t\n---\n  indented body").unwrap();
        assert_eq!(frontmatter, "  a:   1\t");
        assert_eq!(body, "  indented body");
    }

    #[test]
    fn parse_yaml_mapping() {
        let map = parse(Format::Yaml, "title: hi\ntags:\n  - a\n  - b\n").unwrap();
        assert_eq!(map["title"], "hi");
        assert_eq!(map["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn parse_empty_yaml_is_empty_mapping() {
        assert!(parse(Format::Yaml, "").unwrap().is_empty());
    }

    #[test]
    fn parse_json_and_toml() {
        let map = parse(Format::Json, "{\"n\": 3}").unwrap();
        assert_eq!(map["n"], 3);

        let map = parse(Format::Toml, "name = \"x\"\n[nested]\nk = true\n").unwrap();
        assert_eq!(map["name"], "x");
        assert_eq!(map["nested"]["k"], true);
    }

    #[test]
    fn parse_rejects_non_mapping() {
        let err = parse(Format::Yaml, "- just\n- a\n- list\n").unwrap_err();
        assert!(matches!(err, FrontmatterParseError::NotAMapping("array")));
    }

    #[test]
    fn parse_reports_syntax_errors() {
        assert!(parse(Format::Json, "{broken").is_err());
        assert!(parse(Format::Toml, "= nope").is_err());
    }
}
