pub mod config;
pub mod token;

use clap::{Parser, Subcommand};

/// Tutorline: an English-tutoring chat gateway.
#[derive(Debug, Parser)]
#[command(name = "tutorline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the identity cookie value for a learner id (for testing).
    EncodeToken {
        /// Learner identity to encrypt.
        identity: String,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `TL_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.  A missing file yields the defaults.
///
/// [`Config`]: tl_domain::config::Config
pub fn load_config() -> anyhow::Result<(tl_domain::config::Config, String)> {
    let config_path = std::env::var("TL_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<tl_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(tl_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["tutorline"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_encode_token() {
        let cli = Cli::parse_from(["tutorline", "encode-token", "S1001"]);
        assert!(matches!(
            cli.command,
            Some(Command::EncodeToken { ref identity }) if identity == "S1001"
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config_from("/nonexistent/tutorline.toml").unwrap();
        assert_eq!(cfg.server.port, 8000);
    }
}
