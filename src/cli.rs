//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::config::StaticConfig;
use crate::errors::Result;

/// Supplyr - ad server with per-visitor frequency capping
#[derive(Parser, Debug)]
#[command(name = "supplyr")]
#[command(version)]
#[command(about = "Ad server with per-visitor frequency capping", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true, default_value = crate::config::DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: stdout)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// `config generate`
pub fn generate_config(output_path: Option<&str>, force: bool) -> Result<()> {
    let Some(path) = output_path else {
        print!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    };

    if std::path::Path::new(path).exists() && !force {
        return Err(crate::errors::SupplyrError::file_operation(format!(
            "{} already exists, use --force to overwrite",
            path
        )));
    }

    StaticConfig::default().save_to_file(path)?;
    println!("{} {}", "Sample configuration written to".green(), path.bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["supplyr"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_config_generate_args() {
        let cli =
            Cli::try_parse_from(["supplyr", "-c", "alt.toml", "config", "generate", "out.toml"])
                .unwrap();
        assert_eq!(cli.config, "alt.toml");
        assert_eq!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommands::Generate {
                    output_path: Some("out.toml".to_string()),
                    force: false,
                }
            })
        );
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        generate_config(Some(path), false).unwrap();
        assert!(generate_config(Some(path), false).is_err());
        generate_config(Some(path), true).unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("[ad_server]"));
    }
}
