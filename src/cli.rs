//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// mdsite static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (where the config file lives)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name (default: mdsite.toml)
    #[arg(short = 'C', long, default_value = "mdsite.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site: render templates, convert markdown with pandoc,
    /// copy resource files
    Build {
        /// Skip documents not modified since the last build
        #[arg(short, long)]
        smart_rebuild: bool,

        /// Disable progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print a default config file to stdout
    Config {
        /// Output format for the config file
        #[arg(value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
}

/// Config file output formats for `mdsite config`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_flags_parse() {
        let cli = Cli::parse_from(["mdsite", "build", "--smart-rebuild", "-q"]);
        assert!(cli.is_build());
        match cli.command {
            Commands::Build { smart_rebuild, quiet } => {
                assert!(smart_rebuild);
                assert!(quiet);
            }
            Commands::Config { .. } => panic!("expected build"),
        }
    }

    #[test]
    fn config_format_defaults_to_toml() {
        let cli = Cli::parse_from(["mdsite", "config"]);
        match cli.command {
            Commands::Config { format } => assert_eq!(format, ConfigFormat::Toml),
            Commands::Build { .. } => panic!("expected config"),
        }
    }
}
