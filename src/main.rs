use clap::{Parser, Subcommand};
use miette::{miette, Result};
use std::path::PathBuf;

use timber::cli;

#[derive(Parser)]
#[command(name = "timber")]
#[command(about = "Weave automatic parent tracking into Rust types")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite tracked types in Rust source files
    Weave {
        /// Input source files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Tracked-type index files (unioned)
        #[arg(short, long = "index", default_value = timber::weave::DEFAULT_INDEX_NAME)]
        index: Vec<PathBuf>,

        /// Allowed-parent index files (unioned)
        #[arg(short, long = "allowed-parents")]
        allowed_parents: Vec<PathBuf>,

        /// Module path of the inputs (derived from each file's location if not specified)
        #[arg(short, long)]
        module_path: Option<String>,

        /// Output directory (defaults to stdout)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the metadata record of every tracked type as JSON
    Inspect {
        /// Input source file
        input: PathBuf,

        /// Tracked-type index files (unioned)
        #[arg(short, long = "index", default_value = timber::weave::DEFAULT_INDEX_NAME)]
        index: Vec<PathBuf>,

        /// Allowed-parent index files (unioned)
        #[arg(short, long = "allowed-parents")]
        allowed_parents: Vec<PathBuf>,

        /// Module path of the input
        #[arg(short, long)]
        module_path: Option<String>,
    },

    /// Print the union of tracked-type index files
    Index {
        /// Index files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Weave {
            inputs,
            index,
            allowed_parents,
            module_path,
            out_dir,
        } => {
            let args = cli::weave::WeaveArgs {
                inputs,
                index,
                allowed_parents,
                module_path,
                out_dir,
            };
            cli::weave::weave(&args).map_err(|e| miette!("{}", e))
        }
        Commands::Inspect {
            input,
            index,
            allowed_parents,
            module_path,
        } => cli::inspect::inspect(&input, &index, &allowed_parents, module_path.as_deref())
            .map_err(|e| miette!("{}", e)),
        Commands::Index { inputs } => cli::index::index(&inputs).map_err(|e| miette!("{}", e)),
    }
}
