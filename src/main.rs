use anyhow::{Result, bail};
use clap::Parser;
use mdsite::{
    build::build_site,
    cli::{Cli, Commands, ConfigFormat},
    config::SiteConfig,
    log, logger, report,
};
use std::{path::PathBuf, process};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPT: i32 = 130;

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Config { format } => {
            let text = match format {
                ConfigFormat::Toml => SiteConfig::default_toml(),
                ConfigFormat::Yaml => SiteConfig::default_yaml(),
            };
            print!("{text}");
        }
        Commands::Build {
            smart_rebuild,
            quiet,
        } => {
            logger::set_quiet(*quiet);
            ctrlc::set_handler(|| {
                eprintln!("\ninterrupted");
                process::exit(EXIT_INTERRUPT);
            })
            .ok();

            let config = match load_config(&cli) {
                Ok(config) => config,
                Err(err) => {
                    log!("error"; "{err:#}");
                    process::exit(EXIT_FAILURE);
                }
            };

            if let Err(err) = build_site(&config, *smart_rebuild) {
                report::handle_build_error(&err, &config.root);
                process::exit(EXIT_FAILURE);
            }
            log!("build"; "site built to {}", config.build.output.display());
        }
    }
}

/// Load, resolve, and validate the site config for a build.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
    let path = root.join(&cli.config);
    if !path.is_file() {
        bail!("Config file not found: {}", path.display());
    }
    let mut config = SiteConfig::from_path(&path)?;
    config.resolve_paths(&root);
    config.validate()?;
    Ok(config)
}
