//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// chesscal - Insert a test event and list upcoming Japan chess events
#[derive(Debug, Default, Parser)]
#[command(name = "chesscal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the OAuth client-secret JSON [default: credentials.json]
    #[arg(long, env = "CHESSCAL_CRED_PATH")]
    pub cred_path: Option<PathBuf>,

    /// Path of the credential cache [default: token.json]
    #[arg(long, env = "CHESSCAL_TOKEN_PATH")]
    pub token_path: Option<PathBuf>,

    /// Calendar to insert into and list from
    #[arg(long)]
    pub calendar_id: Option<String>,

    /// Maximum number of upcoming events to list [default: 10]
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Skip inserting the test event
    #[arg(long)]
    pub no_insert: bool,

    /// Delete the cached credential and authorize again
    #[arg(long)]
    pub force_reauth: bool,

    /// Path to configuration file
    #[arg(long, short, env = "CHESSCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,
}
