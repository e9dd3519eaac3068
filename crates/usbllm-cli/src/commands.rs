use clap::Subcommand;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the launcher HTTP server (default)
    Serve,
    /// List the model registry and whether each file is present
    Models,
}
