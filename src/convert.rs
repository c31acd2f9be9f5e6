//! Per-document conversion and batch orchestration.
//!
//! Phase two of the pipeline: each document's body is rendered as a
//! template against its full context, piped through the converter, then
//! wrapped in its page template. Documents convert in parallel and
//! failures are collected per document rather than aborting the batch.

use crate::{
    config::SiteConfig,
    error::BuildError,
    log, pandoc,
    render::{Renderer, merge_contexts},
    tree::{Document, DocumentTree, child_docs},
};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Assemble the render context for one document.
///
/// Layers, later wins: the document's own frontmatter keys spread at the
/// top level, then `frontmatter`, `file_meta`, `config`, `docs`, and
/// `child_docs` as nested objects.
pub fn build_context(
    key: &str,
    doc: &Document,
    docs: &DocumentTree,
    config_value: &Value,
) -> Result<Map<String, Value>, BuildError> {
    let mut all_docs = Map::new();
    for (k, d) in docs {
        all_docs.insert(k.clone(), d.to_value()?);
    }

    let mut named = Map::new();
    named.insert(
        "frontmatter".into(),
        Value::Object(doc.frontmatter.clone()),
    );
    named.insert("file_meta".into(), doc.file_meta.to_value()?);
    named.insert("config".into(), config_value.clone());
    named.insert("docs".into(), Value::Object(all_docs));
    named.insert("child_docs".into(), child_docs(docs, key)?);

    Ok(merge_contexts([doc.frontmatter.clone(), named]))
}

/// Convert one document end to end and write its output file.
pub fn convert_one(
    key: &str,
    doc: &Document,
    docs: &DocumentTree,
    config: &SiteConfig,
    config_value: &Value,
    renderer: &Renderer,
) -> Result<(), BuildError> {
    let context = build_context(key, doc, docs, config_value)?;
    let intermediates = config.build.intermediates.as_deref();
    dump_intermediate(
        intermediates,
        "frontmatter",
        key,
        "txt",
        &format!("{:#?}", doc.frontmatter),
    );
    dump_intermediate(
        intermediates,
        "frontmatter",
        key,
        "json",
        &serde_json::to_string_pretty(&doc.frontmatter).unwrap_or_default(),
    );

    // Body render, then conversion.
    let markdown = renderer.render(&doc.body, &context)?;
    dump_intermediate(intermediates, "body", key, "md", &markdown);

    let args = merged_pandoc_args(&config.pandoc.args, &doc.frontmatter)?;
    let extra_args = pandoc::build_args(&args)?;
    let html = pandoc::convert_text(
        &markdown,
        &config.pandoc.from,
        &config.pandoc.to,
        &config.pandoc.command,
        &extra_args,
    )?;
    dump_intermediate(intermediates, "converted", key, "html", &html);

    // Page template wraps the converted body; `content` always wins.
    let template_name = doc
        .frontmatter
        .get("template")
        .and_then(Value::as_str)
        .unwrap_or(&config.build.default_template);
    let page_context = merge_contexts([
        context,
        Map::from_iter([("content".to_owned(), Value::String(html))]),
    ]);
    let mut page = renderer.render_file(template_name, &page_context)?;

    if config.build.minify {
        let mut cfg = minify_html::Cfg::new();
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.minify_css = true;
        cfg.minify_js = true;
        page = String::from_utf8_lossy(&minify_html::minify(page.as_bytes(), &cfg)).into_owned();
    }

    let out_path = config.build.output.join(&doc.file_meta.path_html);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::Io {
            context: "failed to create output directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&out_path, page).map_err(|source| BuildError::Io {
        context: "failed to write output file",
        path: out_path,
        source,
    })?;

    Ok(())
}

/// Merge the document's reserved `pandoc` frontmatter key over the global
/// converter arguments (document wins). Anything other than a mapping under
/// that key is a configuration error, not a silent no-op.
fn merged_pandoc_args(
    global: &Map<String, Value>,
    frontmatter: &Map<String, Value>,
) -> Result<Map<String, Value>, BuildError> {
    let mut args = global.clone();
    match frontmatter.get("pandoc") {
        Some(Value::Object(overrides)) => args.extend(overrides.clone()),
        Some(other) => {
            return Err(BuildError::PandocOverride {
                kind: crate::frontmatter::value_kind(other),
            });
        }
        None => {}
    }
    Ok(args)
}

/// Best-effort dump of a per-document intermediate artifact under
/// `<dir>/<kind>/<key>.<ext>`. Failures here never fail the build.
fn dump_intermediate(dir: Option<&Path>, kind: &str, key: &str, ext: &str, content: &str) {
    let Some(dir) = dir else { return };
    let path = dir.join(kind).join(format!("{key}.{ext}"));
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_ok() {
            let _ = fs::write(path, content);
        }
    }
}

/// Convert every document in the tree, in parallel.
///
/// With `rebuild_time` set, documents whose source mtime is at or before
/// the watermark are skipped. Failures are collected per document; one
/// failure yields [`BuildError::Single`], several yield
/// [`BuildError::Multi`].
pub fn convert_all(
    docs: &DocumentTree,
    config: &SiteConfig,
    renderer: &Renderer,
    rebuild_time: Option<f64>,
) -> Result<(), BuildError> {
    let config_value = config.to_context_value()?;
    convert_all_with(docs, rebuild_time, |key, doc| {
        convert_one(key, doc, docs, config, &config_value, renderer)
    })
}

/// Batch driver, factored out so orchestration is testable without a
/// converter subprocess.
pub fn convert_all_with(
    docs: &DocumentTree,
    rebuild_time: Option<f64>,
    convert: impl Fn(&str, &Document) -> Result<(), BuildError> + Sync,
) -> Result<(), BuildError> {
    let n_total = docs.len();
    let progress = AtomicUsize::new(0);
    let failures: Mutex<BTreeMap<String, BuildError>> = Mutex::new(BTreeMap::new());

    docs.par_iter().for_each(|(key, doc)| {
        let i = progress.fetch_add(1, Ordering::Relaxed) + 1;
        if skip_unmodified(rebuild_time, doc.file_meta.modified_time) {
            log!("convert"; "[{i}/{n_total}] [unmodified] {}", doc.file_meta.path_raw);
            return;
        }
        log!("convert"; "[{i}/{n_total}] [building..] {}", doc.file_meta.path_raw);
        if let Err(err) = convert(key, doc) {
            failures
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(doc.file_meta.path_raw.clone(), err);
        }
    });

    let failures = failures
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    finalize(failures, n_total)
}

/// A document is skipped only when smart rebuild is active and its source
/// has not changed since the watermark.
fn skip_unmodified(rebuild_time: Option<f64>, modified_time: f64) -> bool {
    rebuild_time.is_some_and(|t| modified_time <= t)
}

fn finalize(mut failures: BTreeMap<String, BuildError>, n_total: usize) -> Result<(), BuildError> {
    match failures.len() {
        0 => Ok(()),
        1 => {
            let (path, cause) = failures.pop_first().unwrap_or_else(|| unreachable!());
            Err(BuildError::Single {
                path,
                n_total,
                cause: Box::new(cause),
            })
        }
        _ => Err(BuildError::Multi { n_total, failures }),
    }
}
