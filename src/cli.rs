use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "async-classifier")]
#[command(about = "Classify runtime API calls as sync or async from declaration files and source aliases")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// File or directory used to discover the project root.
    #[arg(long, value_name = "PATH", global = true)]
    pub root: Option<PathBuf>,

    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Classify {
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },
    Resolve {
        name: String,
    },
    Alias {
        name: String,
    },
    Stats,
    /// Print the registry and alias table.
    Dump,
}
