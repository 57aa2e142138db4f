use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, trace};
use treeforge::cli::{execute_command, get_log_level, Cli};
use treeforge::config::ConfigLoader;
use treeforge::TreeforgeError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = ConfigLoader::load(&project_dir, cli.config.as_deref()).await;

    let configured_level = config.as_ref().ok().and_then(|c| c.log_level.clone());
    let log_level = get_log_level(cli.verbose, configured_level.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("treeforge started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match config {
        Ok(config) => execute_command(cli.command, &config).await,
        Err(e) => Err(TreeforgeError::Config(e)),
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }
}
