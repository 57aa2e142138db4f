//! Command routing and execution

use crate::cli::args::Commands;
use crate::cli::commands::*;
use crate::cli::help::generate_help;
use crate::config::TreeforgeConfig;
use crate::error::Result;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Option<Commands>, config: &TreeforgeConfig) -> Result<()> {
    match command {
        Some(Commands::Render {
            skeleton,
            fragments,
            output,
            module_name,
        }) => {
            run_render_command(
                &skeleton,
                &fragments,
                output.as_deref(),
                module_name,
                config,
            )
            .await
        }
        Some(Commands::Generate {
            fragments,
            output,
            template_set,
            template_dir,
            cache,
            module_name,
        }) => {
            let params = GenerateParams {
                fragments,
                output,
                template_set,
                template_dir,
                cache,
                module_name,
            };
            run_generate_command(params, config).await
        }
        Some(Commands::Merge {
            input,
            sub_path,
            output,
            json,
        }) => run_merge_command(input, sub_path, output, json).await,
        Some(Commands::MergeAll {
            inputs,
            sub_path,
            out_dir,
            json,
        }) => run_merge_all_command(inputs, sub_path, &out_dir, json, config).await,
        Some(Commands::Ls { container, path }) => run_ls_command(&container, &path).await,
        None => {
            print!("{}", generate_help());
            Ok(())
        }
    }
}
