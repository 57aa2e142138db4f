//! Running independent merges concurrently

use super::{merge, MergeError, MergeReport};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::task;
use tracing::{debug, error};

/// One input container to consolidate into one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeJob {
    pub input: PathBuf,
    pub sub_path: String,
    pub output: PathBuf,
}

impl MergeJob {
    pub fn new(input: impl Into<PathBuf>, sub_path: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            sub_path: sub_path.into(),
            output: output.into(),
        }
    }
}

/// Run every job on the blocking pool and return results in job order.
///
/// Two jobs writing the same output would race on its replacement, so all
/// jobs sharing an output path fail with [`MergeError::ConflictingOutputs`]
/// without running.
pub async fn merge_all(jobs: Vec<MergeJob>) -> Vec<(MergeJob, Result<MergeReport, MergeError>)> {
    let mut targets: HashMap<PathBuf, usize> = HashMap::new();
    for job in &jobs {
        *targets.entry(output_key(&job.output)).or_default() += 1;
    }

    let futures = jobs.into_iter().map(|job| {
        let conflicting = targets
            .get(&output_key(&job.output))
            .copied()
            .unwrap_or_default()
            > 1;
        async move {
            if conflicting {
                let output = job.output.clone();
                return (job, Err(MergeError::ConflictingOutputs { output }));
            }

            debug!(input = %job.input.display(), output = %job.output.display(), "Starting merge");
            let worker_job = job.clone();
            let result = task::spawn_blocking(move || {
                merge(&worker_job.input, &worker_job.sub_path, &worker_job.output)
            })
            .await
            .unwrap_or_else(|e| Err(MergeError::Task(e.to_string())));

            if let Err(e) = &result {
                error!(input = %job.input.display(), "Merge failed: {}", e);
            }
            (job, result)
        }
    });

    join_all(futures).await
}

/// Absolute, lexically normalized form of an output path, so that
/// `out/a.root`, `./out/a.root` and `out/x/../a.root` compare equal.
fn output_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
