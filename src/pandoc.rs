//! External converter invocation.
//!
//! Markdown bodies are piped through a pandoc-compatible subprocess on
//! stdin and the converted output read back from stdout. Converter
//! arguments come from a JSON object so they can be declared in config and
//! overridden per document in frontmatter.

use crate::error::BuildError;
use serde_json::{Map, Value};
use std::{
    io::Write,
    process::{Command, Stdio},
};

/// Shorthand names for filters shipped alongside the generator. A string
/// value for the `filter` argument is looked up here before being passed
/// through verbatim.
pub const BUILTIN_FILTERS: [(&str, &str); 2] = [
    ("csv-table", "mdsite-csv-table"),
    ("links-md2html", "mdsite-links-md2html"),
];

/// Resolve a filter shorthand to its executable name.
pub fn resolve_filter(name: &str) -> &str {
    BUILTIN_FILTERS
        .iter()
        .find(|(short, _)| *short == name)
        .map(|(_, full)| *full)
        .unwrap_or(name)
}

/// Turn an argument object into a flag list, preserving key order.
///
/// - `true` emits a bare `--key`, `false` emits nothing
/// - a string emits `--key value` (with filter shorthand resolution)
/// - an array emits one `--key value` pair per element
pub fn build_args(args: &Map<String, Value>) -> Result<Vec<String>, BuildError> {
    let mut flags = Vec::new();
    for (key, value) in args {
        match value {
            Value::Bool(true) => flags.push(format!("--{key}")),
            Value::Bool(false) => {}
            Value::String(s) => {
                flags.push(format!("--{key}"));
                flags.push(arg_value(key, s));
            }
            Value::Array(items) => {
                for item in items {
                    flags.push(format!("--{key}"));
                    flags.push(arg_value(key, &stringify(key, item)?));
                }
            }
            _ => return Err(BuildError::PandocArg { key: key.clone() }),
        }
    }
    Ok(flags)
}

fn arg_value(key: &str, value: &str) -> String {
    if key == "filter" {
        resolve_filter(value).to_owned()
    } else {
        value.to_owned()
    }
}

fn stringify(key: &str, value: &Value) -> Result<String, BuildError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(BuildError::PandocArg { key: key.to_owned() }),
    }
}

/// Convert source text via the external converter.
///
/// The full invocation is `command... --from <from> --to <to> <extra_args>`
/// with the source on stdin.
pub fn convert_text(
    source: &str,
    from: &str,
    to: &str,
    command: &[String],
    extra_args: &[String],
) -> Result<String, BuildError> {
    let (program, base_args) = command.split_first().ok_or_else(|| BuildError::Conversion {
        detail: "converter command is empty".into(),
    })?;

    let mut child = Command::new(program)
        .args(base_args)
        .arg("--from")
        .arg(from)
        .arg("--to")
        .arg(to)
        .args(extra_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| BuildError::Conversion {
            detail: format!("failed to spawn `{program}`: {err}"),
        })?;

    // Feed stdin from a separate thread while draining stdout here. Writing
    // the whole source first deadlocks against converters that stream: they
    // stall on a full stdout pipe while we stall on a full stdin pipe.
    let writer = child.stdin.take().map(|mut stdin| {
        let source = source.to_owned();
        std::thread::spawn(move || stdin.write_all(source.as_bytes()))
    });

    let output = child.wait_with_output().map_err(|err| BuildError::Conversion {
        detail: format!("failed to wait for `{program}`: {err}"),
    })?;

    let write_result = writer.map(|handle| handle.join());

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let detail = if stderr.is_empty() {
            format!("`{program}` exited with {}", output.status)
        } else {
            format!("`{program}` exited with {}: {stderr}", output.status)
        };
        return Err(BuildError::Conversion { detail });
    }

    match write_result {
        Some(Ok(Err(err))) => {
            return Err(BuildError::Conversion {
                detail: format!("failed to write to `{program}` stdin: {err}"),
            });
        }
        Some(Err(_)) => {
            return Err(BuildError::Conversion {
                detail: format!("stdin writer for `{program}` panicked"),
            });
        }
        Some(Ok(Ok(()))) | None => {}
    }

    String::from_utf8(output.stdout).map_err(|err| BuildError::Conversion {
        detail: format!("`{program}` produced invalid UTF-8: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn bool_args_emit_bare_flags() {
        let flags = build_args(&obj(json!({"toc": true, "mathjax": false}))).unwrap();
        assert_eq!(flags, vec!["--toc"]);
    }

    #[test]
    fn args_preserve_declaration_order() {
        let flags = build_args(&obj(json!({
            "toc": true,
            "filter": ["a", "b"]
        })))
        .unwrap();
        assert_eq!(flags, vec!["--toc", "--filter", "a", "--filter", "b"]);
    }

    #[test]
    fn string_args_emit_pairs() {
        let flags = build_args(&obj(json!({"template": "page.html"}))).unwrap();
        assert_eq!(flags, vec!["--template", "page.html"]);
    }

    #[test]
    fn builtin_filters_resolve() {
        assert_eq!(resolve_filter("csv-table"), "mdsite-csv-table");
        assert_eq!(resolve_filter("links-md2html"), "mdsite-links-md2html");
        assert_eq!(resolve_filter("my-filter.lua"), "my-filter.lua");

        let flags = build_args(&obj(json!({"filter": "csv-table"}))).unwrap();
        assert_eq!(flags, vec!["--filter", "mdsite-csv-table"]);
    }

    #[test]
    fn unsupported_value_is_rejected() {
        let err = build_args(&obj(json!({"depth": {"nested": 1}}))).unwrap_err();
        match err {
            BuildError::PandocArg { key } => assert_eq!(key, "depth"),
            other => panic!("expected pandoc arg error, got {other:?}"),
        }
    }

    #[test]
    fn convert_via_cat_echoes_stdin() {
        let command = vec!["sh".to_owned(), "-c".to_owned(), "cat".to_owned()];
        let out = convert_text("# hi\n", "markdown", "html", &command, &[]).unwrap();
        assert_eq!(out, "# hi\n");
    }

    #[test]
    fn convert_handles_input_larger_than_pipe_buffers() {
        // A streaming converter fills its stdout pipe long before a 1 MiB
        // source fits in the stdin pipe; both directions must make progress.
        let command = vec!["sh".to_owned(), "-c".to_owned(), "cat".to_owned()];
        let source = "lorem ipsum dolor sit amet\n".repeat(40_000);
        let out = convert_text(&source, "markdown", "html", &command, &[]).unwrap();
        assert_eq!(out.len(), source.len());
    }

    #[test]
    fn converter_failure_carries_stderr() {
        let command = vec![
            "sh".to_owned(),
            "-c".to_owned(),
            "echo boom >&2; exit 3".to_owned(),
        ];
        let err = convert_text("x", "markdown", "html", &command, &[]).unwrap_err();
        match err {
            BuildError::Conversion { detail } => assert!(detail.contains("boom")),
            other => panic!("expected conversion error, got {other:?}"),
        }
    }
}
