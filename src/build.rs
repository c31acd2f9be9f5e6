//! Build orchestration.
//!
//! Ties the pipeline together: read the rebuild watermark, build the
//! document tree, convert everything, copy resources.

use crate::{
    assets::copy_content_files,
    config::SiteConfig,
    convert::convert_all,
    error::BuildError,
    log,
    render::Renderer,
    tree::build_document_tree,
};
use serde_json::Map;
use std::{fs, path::Path, time::UNIX_EPOCH};

/// Run a full site build.
///
/// With `smart_rebuild`, the build-marker mtime is read before the marker
/// is touched, and documents whose sources are not newer than that
/// watermark are skipped.
pub fn build_site(config: &SiteConfig, smart_rebuild: bool) -> Result<(), BuildError> {
    let renderer = Renderer::new(config.build.templates.clone());

    let rebuild_time = if smart_rebuild {
        let t = read_build_marker(&config.build.marker);
        match t {
            Some(t) => log!("build"; "smart rebuild: skipping sources older than watermark ({t:.0}s)"),
            None => log!("build"; "smart rebuild: no previous marker, building everything"),
        }
        t
    } else {
        None
    };
    touch_build_marker(&config.build.marker)?;

    let initial_context = Map::from_iter([("config".to_owned(), config.to_context_value()?)]);
    let docs = build_document_tree(config, &renderer, &initial_context)?;

    convert_all(&docs, config, &renderer, rebuild_time)?;

    let copied = copy_content_files(config)?;
    log!("copy"; "copied {copied} resource files");

    Ok(())
}

/// Read the previous build's watermark from the marker file's mtime.
pub fn read_build_marker(path: &Path) -> Option<f64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

/// Touch the marker so the next smart rebuild measures against this build's
/// start time.
pub fn touch_build_marker(path: &Path) -> Result<(), BuildError> {
    fs::write(path, b"").map_err(|source| BuildError::Io {
        context: "failed to touch build marker",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_marker_means_no_watermark() {
        assert!(read_build_marker(Path::new("/nonexistent/.build_time")).is_none());
    }

    #[test]
    fn touched_marker_has_recent_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join(".build_time");
        touch_build_marker(&marker).unwrap();
        let t = read_build_marker(&marker).unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs_f64();
        assert!((now - t).abs() < 60.0);
    }
}
