//! Resource copying from the content tree into the output tree.
//!
//! Non-markdown files (images, stylesheets, downloads) are copied over
//! with their relative paths preserved, filtered by the configured
//! include/exclude globs.

use crate::{config::SiteConfig, error::BuildError};
use glob::Pattern;
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Decide whether a relative path should be copied.
///
/// An explicit include match always wins. Otherwise excludes block the
/// file, and with no include patterns at all everything else is copied;
/// with include patterns present, only matches are.
pub fn should_copy(rel: &str, include: &[Pattern], exclude: &[Pattern]) -> bool {
    if include.iter().any(|p| p.matches(rel)) {
        return true;
    }
    if exclude.iter().any(|p| p.matches(rel)) {
        return false;
    }
    include.is_empty()
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, BuildError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| BuildError::InvalidGlob {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Copy matching resource files from the content directory to the output
/// directory. Returns the number of files copied.
pub fn copy_content_files(config: &SiteConfig) -> Result<usize, BuildError> {
    let include = compile_patterns(&config.build.copy_include)?;
    let exclude = compile_patterns(&config.build.copy_exclude)?;
    let content = &config.build.content;

    let mut copied = 0;
    for entry in WalkDir::new(content).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| content.clone());
            BuildError::Io {
                context: "failed to walk content directory at",
                path,
                source: err.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(content).unwrap_or(entry.path());
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !should_copy(&rel_str, &include, &exclude) {
            continue;
        }

        let dest = config.build.output.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Io {
                context: "failed to create output directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::copy(entry.path(), &dest).map_err(|source| BuildError::Io {
            context: "failed to copy resource file",
            path: entry.path().to_path_buf(),
            source,
        })?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<Pattern> {
        list.iter().map(|p| Pattern::new(p).unwrap()).collect()
    }

    #[test]
    fn default_excludes_markdown_copies_rest() {
        let include = patterns(&[]);
        let exclude = patterns(&["*.md"]);
        assert!(!should_copy("post.md", &include, &exclude));
        assert!(should_copy("style.css", &include, &exclude));
        assert!(should_copy("img/logo.png", &include, &exclude));
    }

    #[test]
    fn include_match_beats_exclude() {
        let include = patterns(&["keep/*.md"]);
        let exclude = patterns(&["*.md", "keep/*"]);
        assert!(should_copy("keep/raw.md", &include, &exclude));
        assert!(!should_copy("other.md", &include, &exclude));
    }

    #[test]
    fn nonempty_include_restricts_copying() {
        let include = patterns(&["assets/*"]);
        let exclude = patterns(&[]);
        assert!(should_copy("assets/a.png", &include, &exclude));
        assert!(!should_copy("stray.png", &include, &exclude));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = compile_patterns(&["[broken".to_owned()]).unwrap_err();
        assert!(matches!(err, BuildError::InvalidGlob { .. }));
    }
}
