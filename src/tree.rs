//! Document tree construction.
//!
//! Walks the content directory, splits each markdown file into frontmatter
//! and body, and renders the frontmatter as a template (phase one of the
//! two-phase render). The result is a [`DocumentTree`] keyed by the
//! document's extension-less relative path, so templates can reference
//! sibling and child documents by key.

use crate::{
    config::SiteConfig,
    error::BuildError,
    frontmatter, log,
    render::{Renderer, merge_contexts},
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};
use walkdir::WalkDir;

/// Key of a directory's index document inside its key prefix.
pub const SECTION_INDEX: &str = "_index";

/// Documents keyed by extension-less relative path (`blog/post`).
pub type DocumentTree = BTreeMap<String, Document>;

/// Source-file metadata exposed to templates under `file_meta`.
#[derive(Debug, Clone, Serialize)]
pub struct FileMeta {
    /// Extension-less relative path; same as the tree key.
    pub path: String,
    /// Output path relative to the output directory.
    pub path_html: String,
    /// Absolute source path, forward slashes.
    pub path_raw: String,
    /// Source mtime in seconds since the epoch.
    pub modified_time: f64,
    /// Source mtime as a human-readable local timestamp.
    pub modified_time_str: String,
}

impl FileMeta {
    fn new(key: String, normalize_index: bool, abs_path: &Path) -> Result<Self, BuildError> {
        let metadata = fs::metadata(abs_path).map_err(|source| BuildError::Io {
            context: "failed to stat source file",
            path: abs_path.to_path_buf(),
            source,
        })?;
        let modified = metadata.modified().map_err(|source| BuildError::Io {
            context: "failed to read mtime of",
            path: abs_path.to_path_buf(),
            source,
        })?;
        let modified_time = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let modified_time_str = chrono::DateTime::<chrono::Local>::from(modified)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Ok(Self {
            path_html: html_path(&key, normalize_index),
            path_raw: abs_path.to_string_lossy().replace('\\', "/"),
            path: key,
            modified_time,
            modified_time_str,
        })
    }

    pub fn to_value(&self) -> Result<Value, BuildError> {
        serde_json::to_value(self).map_err(|source| BuildError::ContextSerialize {
            what: "file_meta",
            source,
        })
    }
}

/// A parsed content document: rendered-and-parsed frontmatter plus the raw
/// (not yet rendered) markdown body.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub frontmatter: Map<String, Value>,
    pub body: String,
    pub file_meta: FileMeta,
}

impl Document {
    pub fn to_value(&self) -> Result<Value, BuildError> {
        serde_json::to_value(self).map_err(|source| BuildError::ContextSerialize {
            what: "document",
            source,
        })
    }
}

/// Derive the output path for a document key.
///
/// With index normalization, a trailing `_index` segment becomes
/// `index.html` so directory indexes land where web servers expect them.
fn html_path(key: &str, normalize_index: bool) -> String {
    if normalize_index {
        if key == SECTION_INDEX {
            return "index.html".into();
        }
        if let Some(prefix) = key.strip_suffix(&format!("/{SECTION_INDEX}")) {
            return format!("{prefix}/index.html");
        }
    }
    format!("{key}.html")
}

/// Build the document tree for a configured site.
///
/// Phase one of the pipeline: every `*.md` file under the content directory
/// is read, split, and its frontmatter rendered against the initial context
/// plus its own `file_meta`. Bodies stay untouched until conversion.
pub fn build_document_tree(
    config: &SiteConfig,
    renderer: &Renderer,
    initial_context: &Map<String, Value>,
) -> Result<DocumentTree, BuildError> {
    let sources = collect_markdown_files(&config.build.content)?;
    log!("tree"; "found {} markdown files", sources.len());

    if config.build.normalize_index {
        check_index_conflicts(&sources)?;
    }

    let mut tree = DocumentTree::new();
    for (key, abs_path) in sources {
        let content = fs::read_to_string(&abs_path).map_err(|source| BuildError::Io {
            context: "failed to read source file",
            path: abs_path.clone(),
            source,
        })?;

        let Some((format, raw_frontmatter, body)) = frontmatter::split(&content) else {
            return Err(BuildError::NoFrontmatter { path: abs_path });
        };

        let file_meta = FileMeta::new(key.clone(), config.build.normalize_index, &abs_path)?;

        // Phase one: the frontmatter text itself is a template.
        let fm_context = merge_contexts([
            initial_context.clone(),
            Map::from_iter([("file_meta".to_owned(), file_meta.to_value()?)]),
        ]);
        let rendered = renderer.render(raw_frontmatter, &fm_context)?;

        let parsed = frontmatter::parse(format, &rendered).map_err(|source| {
            BuildError::FrontmatterParse {
                path: abs_path.clone(),
                source,
            }
        })?;

        tree.insert(
            key,
            Document {
                frontmatter: parsed,
                body: body.to_owned(),
                file_meta,
            },
        );
    }

    Ok(tree)
}

/// Collect `(key, absolute path)` pairs for every markdown file, sorted by
/// key so tree construction order is deterministic.
fn collect_markdown_files(content_dir: &Path) -> Result<Vec<(String, PathBuf)>, BuildError> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(content_dir).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| content_dir.to_path_buf());
            BuildError::Io {
                context: "failed to walk content directory at",
                path,
                source: err.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let rel = path.strip_prefix(content_dir).unwrap_or(path);
        let key = to_posix(rel)
            .strip_suffix(".md")
            .map(str::to_owned)
            .unwrap_or_else(|| to_posix(rel));
        sources.push((key, path.to_path_buf()));
    }
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(sources)
}

/// Fail fast when a directory contains both `index.md` and `_index.md`.
fn check_index_conflicts(sources: &[(String, PathBuf)]) -> Result<(), BuildError> {
    let keys: BTreeSet<&str> = sources.iter().map(|(k, _)| k.as_str()).collect();
    for (key, _) in sources {
        let dir = if key == SECTION_INDEX {
            ""
        } else if let Some(prefix) = key.strip_suffix(&format!("/{SECTION_INDEX}")) {
            prefix
        } else {
            continue;
        };
        let twin = if dir.is_empty() {
            "index".to_owned()
        } else {
            format!("{dir}/index")
        };
        if keys.contains(twin.as_str()) {
            return Err(BuildError::IndexConflict {
                directory: if dir.is_empty() { "(root)".into() } else { dir.into() },
                files: vec![format!("{twin}.md"), format!("{key}.md")],
            });
        }
    }
    Ok(())
}

fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Keys of a document's children: strict prefix matches in the tree,
/// excluding the document itself.
pub fn child_docs(tree: &DocumentTree, key: &str) -> Result<Value, BuildError> {
    let mut children = Map::new();
    for (other_key, doc) in tree {
        if other_key != key && other_key.starts_with(key) {
            children.insert(other_key.clone(), doc.to_value()?);
        }
    }
    Ok(json!(children))
}
