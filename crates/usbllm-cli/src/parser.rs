//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;
use usbllm_core::LauncherConfig;

use crate::commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "usbllm")]
#[command(about = "Local LLM launcher with a streaming draft endpoint")]
#[command(version)]
pub struct Cli {
    /// Port for the HTTP listener (overrides PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Override the models directory for this invocation
    #[arg(long = "models-dir", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }

    /// Apply command-line overrides on top of the environment configuration.
    pub fn apply(&self, config: &mut LauncherConfig) {
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir.clone_from(dir);
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["usbllm"]);
        assert_eq!(cli.command_or_default(), Commands::Serve);
        assert_eq!(cli.default_log_filter(), "info");
    }

    #[test]
    fn global_args_override_config() {
        let cli = Cli::parse_from(["usbllm", "models", "--port", "18001", "--models-dir", "/tmp/m", "-v"]);
        assert_eq!(cli.command_or_default(), Commands::Models);
        assert_eq!(cli.default_log_filter(), "debug");

        let mut config = LauncherConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.listen_port, 18001);
        assert_eq!(config.models_dir, PathBuf::from("/tmp/m"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["usbllm", "--port", "70000"]).is_err());
    }
}
