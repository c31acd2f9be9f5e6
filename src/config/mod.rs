//! Site configuration management for `mdsite.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                           |
//! |------------|---------------------------------------------------|
//! | `[build]`  | Paths, index normalization, minify, resource copy |
//! | `[pandoc]` | Converter command, formats, default arguments     |
//! | `[extra]`  | User-defined fields, exposed to templates         |
//!
//! # Example
//!
//! ```toml
//! [build]
//! content = "content"
//! output = "output"
//! normalize_index = true
//!
//! [pandoc]
//! from = "markdown+smart"
//! to = "html"
//!
//! [pandoc.args]
//! mathjax = true
//! toc = false
//!
//! [extra]
//! site_title = "My Site"
//! ```
//!
//! Config files may also be YAML or JSON; the format is chosen by file
//! extension. The whole config (minus runtime paths) is serialized into
//! every render context under the `config` key, so templates can read
//! `config.extra.site_title` and friends.

pub mod defaults;
mod error;

pub use error::ConfigError;

use crate::error::BuildError;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing mdsite.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root; all relative paths resolve against it
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    pub build: BuildConfig,

    /// External converter settings
    pub pandoc: PandocConfig,

    /// User-defined extra fields
    pub extra: Map<String, Value>,
}

/// `[build]` section - pipeline paths and switches.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Markdown source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Page template directory.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Page template used when a document has no `template` override.
    #[serde(default = "defaults::build::default_template")]
    #[educe(Default = defaults::build::default_template())]
    pub default_template: String,

    /// Directory for per-document intermediate artifacts (disabled when
    /// unset). Purely diagnostic; nothing reads these back.
    #[serde(
        default = "defaults::build::intermediates",
        skip_serializing_if = "Option::is_none"
    )]
    #[educe(Default = defaults::build::intermediates())]
    pub intermediates: Option<PathBuf>,

    /// Sentinel file whose mtime is the smart-rebuild watermark.
    #[serde(default = "defaults::build::marker")]
    #[educe(Default = defaults::build::marker())]
    pub marker: PathBuf,

    /// Minify HTML output.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Rewrite `_index.md` output paths to `index.html` and reject
    /// directories containing both spellings.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub normalize_index: bool,

    /// Resource-copy include globs (empty means everything).
    #[serde(default = "defaults::build::copy_include")]
    #[educe(Default = defaults::build::copy_include())]
    pub copy_include: Vec<String>,

    /// Resource-copy exclude globs. An explicit include wins over these.
    #[serde(default = "defaults::build::copy_exclude")]
    #[educe(Default = defaults::build::copy_exclude())]
    pub copy_exclude: Vec<String>,
}

/// `[pandoc]` section - external converter invocation.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct PandocConfig {
    /// Converter command vector; first element is the executable.
    #[serde(default = "defaults::pandoc::command")]
    #[educe(Default = defaults::pandoc::command())]
    pub command: Vec<String>,

    /// Input format passed as `--from`.
    #[serde(default = "defaults::pandoc::from")]
    #[educe(Default = defaults::pandoc::from())]
    pub from: String,

    /// Output format passed as `--to`.
    #[serde(default = "defaults::pandoc::to")]
    #[educe(Default = defaults::pandoc::to())]
    pub to: String,

    /// Default converter arguments; a document's `pandoc` frontmatter key
    /// is merged over these (document wins).
    #[serde(default = "defaults::pandoc::args")]
    #[educe(Default = defaults::pandoc::args())]
    pub args: Map<String, Value>,
}

impl SiteConfig {
    /// Parse configuration from a string in the given format.
    pub fn from_str(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        let config = match format {
            FileFormat::Toml => toml::from_str(content)?,
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Load configuration from a file path, format chosen by extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let format = FileFormat::from_extension(path)?;
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content, format)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Resolve all paths relative to the project root and normalize the
    /// root itself to an absolute path.
    pub fn resolve_paths(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.config_path = normalize_path(&root.join(
            self.config_path
                .file_name()
                .unwrap_or_else(|| "mdsite.toml".as_ref()),
        ));
        self.build.content = root.join(&self.build.content);
        self.build.templates = root.join(&self.build.templates);
        self.build.output = root.join(&self.build.output);
        self.build.marker = root.join(&self.build.marker);
        if let Some(dir) = &self.build.intermediates {
            self.build.intermediates = Some(root.join(dir));
        }
        self.root = root;
    }

    /// Validate configuration before a build.
    pub fn validate(&self) -> Result<()> {
        if !self.build.content.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.content] directory not found: {}",
                self.build.content.display()
            )));
        }
        if !self.build.templates.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.templates] directory not found: {}",
                self.build.templates.display()
            )));
        }
        if self.build.default_template.is_empty() {
            bail!(ConfigError::Validation(
                "[build.default_template] must not be empty".into()
            ));
        }
        for pattern in self.build.copy_include.iter().chain(&self.build.copy_exclude) {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid glob pattern '{pattern}': {e}"))
            })?;
        }
        check_command_installed("[pandoc.command]", &self.pandoc.command)?;
        Ok(())
    }

    /// Serialize this config for inclusion in a render context.
    pub fn to_context_value(&self) -> Result<Value, BuildError> {
        serde_json::to_value(self).map_err(|source| BuildError::ContextSerialize {
            what: "config",
            source,
        })
    }

    /// Default config rendered as TOML (for `mdsite config`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Default config rendered as YAML (for `mdsite config yaml`).
    pub fn default_yaml() -> String {
        serde_yaml::to_string(&Self::default()).unwrap_or_default()
    }
}

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_extension(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "toml" | "tml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::UnknownFormat(other.to_owned())),
        }
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Check if a command is installed and available
fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
    if command.is_empty() {
        bail!(ConfigError::Validation(format!(
            "{field} must have at least one element"
        )));
    }

    let cmd = &command[0];
    which::which(cmd).with_context(|| format!("`{cmd}` not found. Please install it first."))?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
