//! `treeforge merge` and `treeforge merge-all`

use crate::config::TreeforgeConfig;
use crate::error::{Result, TreeforgeError};
use crate::merge::{merge, merge_all, MergeError, MergeJob, MergeReport};
use std::path::{Path, PathBuf};

pub async fn run_merge_command(
    input: PathBuf,
    sub_path: String,
    output: PathBuf,
    json: bool,
) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || merge(&input, &sub_path, &output))
        .await
        .map_err(|e| MergeError::Task(e.to_string()))??;
    print_report(&report, json)
}

pub async fn run_merge_all_command(
    inputs: Vec<PathBuf>,
    sub_path: Option<String>,
    out_dir: &Path,
    json: bool,
    config: &TreeforgeConfig,
) -> Result<()> {
    let sub_path = sub_path.unwrap_or_else(|| config.sub_path().to_string());
    std::fs::create_dir_all(out_dir).map_err(|e| TreeforgeError::io(out_dir, e))?;

    let jobs = inputs
        .into_iter()
        .map(|input| {
            let name = input
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "output.root".into());
            let output = out_dir.join(name);
            MergeJob::new(input, sub_path.clone(), output)
        })
        .collect();

    let mut first_error = None;
    for (job, result) in merge_all(jobs).await {
        match result {
            Ok(report) => print_report(&report, json)?,
            Err(e) => {
                eprintln!("{}: {}", job.input.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn print_report(report: &MergeReport, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report)
            .map_err(|e| TreeforgeError::Other(format!("Failed to encode report: {e}")))?;
        println!("{text}");
    } else {
        print!("{report}");
    }
    Ok(())
}
