pub mod commands;

use clap::{Parser, Subcommand};
use crate::error::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "finboard")]
#[command(about = "Backend for a financial dashboard: market data and aggregated news")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FINBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the HTTP API with the scheduled news refresh
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        bind: Option<String>,

        /// Skip the refresh that normally runs at startup
        #[arg(long)]
        no_initial_refresh: bool,
    },

    /// Run one refresh cycle and store the result
    Scrape,

    /// Print the currently cached articles
    Show {
        /// Maximum number of articles to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List configured news sources
    Sources,

    /// Check whether the market data API key is accepted
    CheckKey,

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let _log_guard = commands::init_logging(self.debug, self.verbose, self.config.as_deref())?;

        match self.command {
            Commands::Init { force } => {
                commands::init(self.config, force).await
            }
            Commands::Serve { port, bind, no_initial_refresh } => {
                commands::serve(self.config, port, bind, no_initial_refresh).await
            }
            Commands::Scrape => {
                commands::scrape(self.config).await
            }
            Commands::Show { limit, json } => {
                commands::show(self.config, limit, json).await
            }
            Commands::Sources => {
                commands::list_sources(self.config).await
            }
            Commands::CheckKey => {
                commands::check_key(self.config).await
            }
            Commands::Completions { shell } => {
                commands::generate_completions(shell);
                Ok(())
            }
        }
    }
}
