//! Structured build-failure reporting.
//!
//! Turns an aggregate [`BuildError`] into a short, pointed summary on
//! stderr (source file, line, offending template line, root cause) and
//! writes full diagnostics into a timestamped dump directory under
//! `.mdsite/` so the terminal stays readable.

use crate::error::{BuildError, as_build_error, chain, find_in_chain};
use colored::Colorize;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

static LINE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[lL]ine (\d+)").unwrap());
static FILE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r#"file ['"]([^'"]+)['"]"#).unwrap());

/// Root-cause messages shorter than this get a kind prefix so the summary
/// line is not just `invalid operation`.
const TERSE_MESSAGE_LEN: usize = 30;

/// What a build failure looked like once reported.
#[derive(Debug)]
pub struct Report {
    pub n_failed: usize,
    pub n_total: usize,
    pub dump_dir: PathBuf,
}

/// Report a build failure: print the summary to stderr and write full
/// diagnostics under `<root>/.mdsite/<timestamp>/`.
pub fn handle_build_error(err: &BuildError, root: &Path) -> Report {
    let (n_failed, n_total) = err.counts();
    let dump_dir = create_dump_dir(root);

    match err {
        BuildError::Multi { failures, .. } => {
            eprintln!("{}", format_multiple_errors(failures));
            for (path, cause) in failures {
                dump_error_context(&dump_dir, path, cause);
            }
        }
        BuildError::Single { path, cause, .. } => {
            eprintln!("{}", format_single_error(Some(path), cause));
            dump_error_context(&dump_dir, path, cause);
        }
        other => {
            eprintln!("{}", format_single_error(None, other));
            dump_error_context(&dump_dir, "build", other);
        }
    }

    eprintln!(
        "{}",
        format!("{n_failed}/{n_total} files failed to convert").bright_red().bold()
    );
    eprintln!("  Full details: {}/", dump_dir.display());

    Report {
        n_failed,
        n_total,
        dump_dir,
    }
}

fn create_dump_dir(root: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let dir = root.join(".mdsite").join(stamp.to_string());
    let _ = fs::create_dir_all(&dir);
    dir
}

// ============================================================================
// Summary formatting
// ============================================================================

/// One failure, formatted as location + offending line + root cause.
pub fn format_single_error(path: Option<&str>, err: &BuildError) -> String {
    let (file, line) = source_info(err);
    let file = path.map(str::to_owned).or(file);

    let mut out = String::new();
    out.push_str(&format_location(file.as_deref(), line));
    if let (Some(line), Some(template)) = (line, template_text(err)) {
        if let Some(source_line) = extract_source_line(template, line) {
            out.push('\n');
            out.push_str("    ");
            out.push_str(source_line.trim_end());
        }
    }
    out.push('\n');
    out.push_str("  ");
    out.push_str(&root_cause_message(err));
    out
}

/// Header plus one numbered block per failed document.
pub fn format_multiple_errors(
    failures: &std::collections::BTreeMap<String, BuildError>,
) -> String {
    let mut out = format!("{} files failed to convert:", failures.len());
    for (i, (path, cause)) in failures.iter().enumerate() {
        out.push('\n');
        out.push('\n');
        out.push_str(&format!("{}. ", i + 1));
        out.push_str(&format_single_error(Some(path), cause));
    }
    out
}

/// `on <file>:<line>:` with graceful degradation when either is unknown.
pub fn format_location(file: Option<&str>, line: Option<u32>) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!("on {file}:{line}:"),
        (Some(file), None) => format!("on {file}:"),
        (None, Some(line)) => format!("on line {line}:"),
        (None, None) => "(unknown location)".to_owned(),
    }
}

/// Extract source file and line from anywhere in the cause chain.
///
/// Structured data wins: the template engine's own line number and the
/// `file_meta.path_raw` captured in the render context. Display-text
/// regexes are the fallback for causes that only mention their location
/// prose-style.
fn source_info(err: &BuildError) -> (Option<String>, Option<u32>) {
    let line = find_in_chain(err, |link| {
        link.downcast_ref::<minijinja::Error>().and_then(|e| e.line())
    })
    .map(|l| l as u32)
    .or_else(|| {
        find_in_chain(err, |link| {
            LINE_RE
                .captures(&link.to_string())
                .and_then(|c| c[1].parse().ok())
        })
    });

    let file = find_in_chain(err, |link| {
        as_build_error(link).and_then(|e| match e {
            BuildError::TemplateRender { context, .. } => context
                .get("file_meta")
                .and_then(|m| m.get("path_raw"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            BuildError::Single { path, .. } => Some(path.clone()),
            _ => None,
        })
    })
    .or_else(|| {
        find_in_chain(err, |link| {
            FILE_RE
                .captures(&link.to_string())
                .map(|c| c[1].to_owned())
        })
    });

    (file, line)
}

/// The template text closest to the failure, if any cause carries one.
fn template_text(err: &BuildError) -> Option<&str> {
    find_in_chain(err, |link| {
        as_build_error(link).and_then(|e| match e {
            BuildError::TemplateCreate { template, .. }
            | BuildError::TemplateRender { template, .. } => Some(template.as_str()),
            _ => None,
        })
    })
}

/// The render context closest to the failure, if any cause carries one.
fn context_value(err: &BuildError) -> Option<&Value> {
    find_in_chain(err, |link| {
        as_build_error(link).and_then(|e| match e {
            BuildError::TemplateRender { context, .. } => Some(context),
            _ => None,
        })
    })
}

/// 1-based line lookup in template text.
pub fn extract_source_line(template: &str, line: u32) -> Option<&str> {
    template.lines().nth(line.checked_sub(1)? as usize)
}

/// Message of the deepest cause, prefixed with the failing stage's kind
/// name when the message alone is too terse to identify the stage.
pub fn root_cause_message(err: &BuildError) -> String {
    let deepest = chain(err).last().unwrap_or(err);
    let mut msg = deepest.to_string();
    for prefix in ["error rendering template", "error creating template"] {
        if let Some(rest) = msg.strip_prefix(prefix) {
            msg = rest.trim_start_matches([':', ' ']).to_owned();
        }
    }

    let kind = find_in_chain(err, |link| as_build_error(link).map(BuildError::kind_name)).map(
        |kind| {
            // Skip the aggregate wrapper; name the stage that failed.
            if kind == "aggregate" {
                chain(err)
                    .filter_map(as_build_error)
                    .map(BuildError::kind_name)
                    .find(|k| *k != "aggregate")
                    .unwrap_or(kind)
            } else {
                kind
            }
        },
    );

    if msg.len() < TERSE_MESSAGE_LEN || !msg.contains('\'') {
        if let Some(kind) = kind {
            return format!("{kind}: {msg}");
        }
    }
    msg
}

// ============================================================================
// Diagnostic dumps
// ============================================================================

/// Write full diagnostics for one failure. Best effort: a failing dump
/// never masks the build error being reported.
fn dump_error_context(dir: &Path, path: &str, err: &BuildError) {
    let slug = sanitize_filename(path);

    let mut traceback = String::new();
    for (i, link) in chain(err).enumerate() {
        if i == 0 {
            traceback.push_str(&format!("error: {link}\n"));
        } else {
            traceback.push_str(&format!("caused by: {link}\n"));
        }
    }
    let _ = fs::write(dir.join(format!("traceback_{slug}.txt")), traceback);

    if let Some(context) = context_value(err) {
        let text = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
        let _ = fs::write(dir.join(format!("context_{slug}.json")), text);
    }

    if let Some(template) = template_text(err) {
        let _ = fs::write(dir.join(format!("template_{slug}.txt")), template);
    }
}

/// Flatten a source path into a filename-safe slug.
pub fn sanitize_filename(path: &str) -> String {
    // Truncation counts chars, not bytes: paths may carry multibyte
    // alphanumerics and String::truncate panics off a char boundary.
    let slug: String = path
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .skip_while(|c| *c == '_')
        .take(100)
        .collect();
    if slug.is_empty() {
        "unknown".to_owned()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render_error_at_line(line: u32) -> BuildError {
        let mut template = String::new();
        for _ in 1..line {
            template.push_str("ok line\n");
        }
        template.push_str("{% for x in 42 %}{% endfor %}");

        let env = minijinja::Environment::new();
        let tmpl = env.template_from_str(&template).unwrap();
        let source = tmpl.render(minijinja::context! {}).unwrap_err();
        BuildError::TemplateRender {
            template,
            context: json!({"file_meta": {"path_raw": "blog/post.md"}}),
            source,
        }
    }

    #[test]
    fn location_formats() {
        assert_eq!(format_location(Some("a.md"), Some(7)), "on a.md:7:");
        assert_eq!(format_location(Some("a.md"), None), "on a.md:");
        assert_eq!(format_location(None, Some(7)), "on line 7:");
        assert_eq!(format_location(None, None), "(unknown location)");
    }

    #[test]
    fn source_info_prefers_structured_data() {
        let err = render_error_at_line(7);
        let (file, line) = source_info(&err);
        assert_eq!(file.as_deref(), Some("blog/post.md"));
        assert_eq!(line, Some(7));
    }

    #[test]
    fn line_extraction_falls_back_to_message_text() {
        // No structured line anywhere in this chain; only the message
        // pattern can supply one, in either capitalization.
        let err = BuildError::Conversion {
            detail: "parse failure at Line 12 of input".into(),
        };
        assert_eq!(source_info(&err).1, Some(12));

        let err = BuildError::Conversion {
            detail: "bad token on line 3".into(),
        };
        assert_eq!(source_info(&err).1, Some(3));
    }

    #[test]
    fn single_wrapper_does_not_hide_render_details() {
        let err = BuildError::Single {
            path: "/site/content/blog/post.md".into(),
            n_total: 4,
            cause: Box::new(render_error_at_line(7)),
        };
        let (file, line) = source_info(&err);
        assert_eq!(file.as_deref(), Some("/site/content/blog/post.md"));
        assert_eq!(line, Some(7));
        assert!(template_text(&err).is_some());
        assert!(context_value(&err).is_some());
    }

    #[test]
    fn single_error_names_file_and_line() {
        let err = render_error_at_line(7);
        let formatted = format_single_error(None, &err);
        assert!(formatted.starts_with("on blog/post.md:7:"));
        assert!(formatted.contains("{% for x in 42 %}"));
    }

    #[test]
    fn extract_source_line_is_one_based() {
        let template = "first\nsecond\nthird";
        assert_eq!(extract_source_line(template, 1), Some("first"));
        assert_eq!(extract_source_line(template, 3), Some("third"));
        assert_eq!(extract_source_line(template, 0), None);
        assert_eq!(extract_source_line(template, 9), None);
    }

    #[test]
    fn terse_root_cause_gets_kind_prefix() {
        let err = BuildError::Single {
            path: "a.md".into(),
            n_total: 1,
            cause: Box::new(BuildError::Conversion { detail: "boom".into() }),
        };
        let msg = root_cause_message(&err);
        assert!(msg.starts_with("conversion:"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn sanitize_flattens_separators() {
        assert_eq!(sanitize_filename("blog/post.md"), "blog_post.md");
        assert_eq!(sanitize_filename("a\\b:c.md"), "a_b_c.md");
        assert_eq!(sanitize_filename("/leading/slash.md"), "leading_slash.md");
        assert_eq!(sanitize_filename(""), "unknown");
        assert_eq!(sanitize_filename("///").len(), 7); // "unknown"
    }

    #[test]
    fn sanitize_truncates_on_char_boundaries() {
        // 40 three-byte chars: 120 bytes, under the 100-char cap.
        let short = "あ".repeat(40);
        assert_eq!(sanitize_filename(&short).chars().count(), 40);

        let long = format!("/содержимое/{}.md", "статья".repeat(30));
        let slug = sanitize_filename(&long);
        assert_eq!(slug.chars().count(), 100);
        assert!(!slug.starts_with('_'));
    }

    #[test]
    fn multiple_errors_enumerate_failures() {
        let mut failures = std::collections::BTreeMap::new();
        failures.insert(
            "a.md".to_owned(),
            BuildError::Conversion { detail: "x".into() },
        );
        failures.insert("b.md".to_owned(), render_error_at_line(2));
        let formatted = format_multiple_errors(&failures);
        assert!(formatted.starts_with("2 files failed to convert:"));
        assert!(formatted.contains("1. on a.md"));
        assert!(formatted.contains("2. on b.md:2:"));
    }
}
