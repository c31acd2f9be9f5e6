//! Build pipeline error types.
//!
//! Every failure the pipeline can produce is a [`BuildError`] variant, and
//! wrapped causes are reachable through [`std::error::Error::source`]. The
//! error reporter walks that chain with [`chain`] / [`find_in_chain`] to
//! attribute a failure to a source file and line.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing a rendered frontmatter block.
#[derive(Debug, Error)]
pub enum FrontmatterParseError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("frontmatter must be a mapping, got {0}")]
    NotAMapping(&'static str),
}

/// Failures raised anywhere in the build pipeline.
///
/// Aggregate variants (`Single`, `Multi`) are produced only by the batch
/// orchestrator; everything else bubbles up unmodified from the stage that
/// raised it.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The frontmatter delimiters are missing or the closing delimiter
    /// never recurs.
    #[error("no frontmatter found in '{}'", path.display())]
    NoFrontmatter { path: PathBuf },

    /// Both `index.md` and `_index.md` exist in the same directory while
    /// index normalization is enabled.
    #[error(
        "conflicting index files in '{directory}': {}. Remove one or set build.normalize_index = false",
        files.join(", ")
    )]
    IndexConflict {
        directory: String,
        files: Vec<String>,
    },

    /// The rendered frontmatter text failed to parse in its declared format.
    #[error("failed to parse frontmatter in '{}'", path.display())]
    FrontmatterParse {
        path: PathBuf,
        #[source]
        source: FrontmatterParseError,
    },

    /// The template engine rejected the template text (syntax error).
    #[error("error creating template")]
    TemplateCreate {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    /// The template compiled but failed during evaluation.
    #[error("error rendering template")]
    TemplateRender {
        template: String,
        context: Value,
        #[source]
        source: minijinja::Error,
    },

    /// The external converter exited non-zero or could not be invoked.
    #[error("pandoc conversion failed: {detail}")]
    Conversion { detail: String },

    /// A converter argument value is neither bool, string, nor sequence.
    #[error("invalid pandoc argument '--{key}': expected bool, string, or array")]
    PandocArg { key: String },

    /// The reserved `pandoc` frontmatter key holds something other than a
    /// mapping of converter arguments.
    #[error("frontmatter key 'pandoc' must be a mapping, got {kind}")]
    PandocOverride { kind: &'static str },

    /// A value could not be serialized into the template context.
    #[error("failed to serialize {what} for template context")]
    ContextSerialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context} '{}'", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern '{pattern}'")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Exactly one document in a batch failed.
    #[error("error converting file '{path}'")]
    Single {
        path: String,
        n_total: usize,
        #[source]
        cause: Box<BuildError>,
    },

    /// Two or more documents in a batch failed, keyed by source path.
    #[error("failed to convert {}/{n_total} files", failures.len())]
    Multi {
        n_total: usize,
        failures: BTreeMap<String, BuildError>,
    },
}

impl BuildError {
    /// Short kind name used by the reporter when a root-cause message is
    /// too terse to stand on its own.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::NoFrontmatter { .. } => "no frontmatter",
            Self::IndexConflict { .. } => "index conflict",
            Self::FrontmatterParse { .. } => "frontmatter parse",
            Self::TemplateCreate { .. } => "create template",
            Self::TemplateRender { .. } => "render template",
            Self::Conversion { .. } => "conversion",
            Self::PandocArg { .. } | Self::PandocOverride { .. } => "pandoc argument",
            Self::ContextSerialize { .. } => "context",
            Self::Io { .. } => "io",
            Self::InvalidGlob { .. } => "glob",
            Self::Single { .. } | Self::Multi { .. } => "aggregate",
        }
    }

    /// Number of failed and attempted documents this error represents.
    pub fn counts(&self) -> (usize, usize) {
        match self {
            Self::Multi { failures, n_total } => (failures.len(), *n_total),
            Self::Single { n_total, .. } => (1, *n_total),
            _ => (1, 1),
        }
    }
}

/// Iterate an error and its transitive causes, outermost first.
pub fn chain<'a>(
    err: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(err), |link| link.source())
}

/// Walk the cause chain outermost-in and return the first probe hit.
///
/// Both the line/file extraction and the root-cause message extraction in
/// the reporter go through this rather than re-implementing the walk.
pub fn find_in_chain<'e, T>(
    err: &'e (dyn std::error::Error + 'static),
    probe: impl FnMut(&'e (dyn std::error::Error + 'static)) -> Option<T>,
) -> Option<T> {
    chain(err).find_map(probe)
}

/// Downcast a chain link to [`BuildError`].
///
/// Aggregate variants box their cause, and the derived `source()` exposes
/// that link with concrete type `Box<BuildError>`, so a plain downcast to
/// `BuildError` misses it. Every chain probe goes through this instead.
pub fn as_build_error<'a>(link: &'a (dyn std::error::Error + 'static)) -> Option<&'a BuildError> {
    link.downcast_ref::<BuildError>()
        .or_else(|| link.downcast_ref::<Box<BuildError>>().map(|boxed| &**boxed))
}
