//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compose analysis modules from skeletons and consolidate their tree output
#[derive(Parser)]
#[command(name = "treeforge")]
#[command(about = "treeforge - Compose generated analysis modules and merge their trees", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file (defaults to ./treeforge.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render one skeleton with a fragment file
    #[command(name = "render")]
    Render {
        /// Skeleton template file
        skeleton: PathBuf,

        /// Fragment file (TOML, JSON or YAML) mapping slot names to lines
        fragments: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Name of the generated module type
        #[arg(long)]
        module_name: Option<String>,
    },

    /// Render a whole template set into a job bundle
    #[command(name = "generate")]
    Generate {
        /// Fragment file (TOML, JSON or YAML) mapping slot names to lines
        fragments: PathBuf,

        /// Directory to write the bundle into
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Built-in template set to use
        #[arg(long, conflicts_with = "template_dir")]
        template_set: Option<String>,

        /// Directory holding a custom template set
        #[arg(long)]
        template_dir: Option<PathBuf>,

        /// Content-addressed bundle cache to materialize into
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Name of the generated module type
        #[arg(long)]
        module_name: Option<String>,
    },

    /// Copy the trees under one directory of a container into a new container
    #[command(name = "merge")]
    Merge {
        /// Input container
        input: PathBuf,

        /// Directory inside the input holding the trees
        sub_path: String,

        /// Output container (replaced if it exists)
        output: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge several inputs concurrently, one output per input
    #[command(name = "merge-all")]
    MergeAll {
        /// Input containers
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory inside each input holding the trees
        #[arg(long)]
        sub_path: Option<String>,

        /// Directory receiving one output per input, named like the input
        #[arg(long)]
        out_dir: PathBuf,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the entries of a container directory
    #[command(name = "ls")]
    Ls {
        /// Container file
        container: PathBuf,

        /// Directory inside the container (defaults to the root)
        #[arg(default_value = "")]
        path: String,
    },
}
