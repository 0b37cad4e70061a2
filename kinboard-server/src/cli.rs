use clap::Parser;
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/kinboard.db)
  PORT        (default: 3001 or config.listen_port)

Command-line flags take precedence over environment variables.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "kinboard-server",
    version,
    about = "Kinboard family server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Listen port
    #[arg(long)]
    pub port: Option<u16>,
}
