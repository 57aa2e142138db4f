//! Consolidating tree outputs
//!
//! [`merge`] copies every tree found directly under one directory of an
//! input container into a freshly created output container. Trees are
//! copied whole, payload bytes unchanged, and land at the output's root under
//! their original names. Anything else in the directory is skipped and reported.

pub mod batch;

pub use batch::{merge_all, MergeJob};

use crate::container::format::{CLASS_DIRECTORY, CLASS_TREE};
use crate::container::{ContainerError, ContainerReader, ContainerWriter, EntryKind, Key};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("cannot open input: {0}")]
    InputOpen(#[source] ContainerError),

    #[error("directory '{sub_path}' not found in {}", input.display())]
    SubPathNotFound { sub_path: String, input: PathBuf },

    #[error("none of the {scanned} entries under '{sub_path}' could be read")]
    NoReadableEntries { sub_path: String, scanned: usize },

    #[error("cannot write output: {0}")]
    Output(#[source] ContainerError),

    #[error("more than one merge targets {}", output.display())]
    ConflictingOutputs { output: PathBuf },

    #[error("merge task failed: {0}")]
    Task(String),
}

/// Why an entry was not cloned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A readable entry that is not a tree
    NonTabular { class: String },
    /// Undeterminable kind or a tree that does not decode
    Unreadable { detail: String },
    /// A tree with the same name was already cloned
    DuplicateName,
}

impl SkipReason {
    pub fn is_unreadable(&self) -> bool {
        matches!(self, SkipReason::Unreadable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub name: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of one merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub input: PathBuf,
    pub sub_path: String,
    pub output: PathBuf,
    pub scanned: usize,
    pub cloned: usize,
    pub skipped: usize,
    /// Cloned tree names in enumeration order
    pub cloned_names: Vec<String>,
    pub skipped_entries: Vec<SkippedEntry>,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Merged '{}' from {} into {}",
            self.sub_path,
            self.input.display(),
            self.output.display()
        )?;
        writeln!(
            f,
            "  scanned: {}  cloned: {}  skipped: {}",
            self.scanned, self.cloned, self.skipped
        )?;
        for name in &self.cloned_names {
            writeln!(f, "  + {name}")?;
        }
        for entry in &self.skipped_entries {
            let reason = match &entry.reason {
                SkipReason::NonTabular { class } => format!("not a tree ({class})"),
                SkipReason::Unreadable { detail } => format!("unreadable: {detail}"),
                SkipReason::DuplicateName => "duplicate name".to_string(),
            };
            writeln!(f, "  - {} ({reason})", entry.name)?;
        }
        Ok(())
    }
}

/// Copy the trees directly under `sub_path` of `input` into a new container
/// at `output`.
///
/// The output is only created once every entry has been read, and it
/// replaces any existing file atomically. On any error an existing output
/// is left as it was and no new file appears.
pub fn merge(
    input: impl AsRef<Path>,
    sub_path: &str,
    output: impl AsRef<Path>,
) -> Result<MergeReport, MergeError> {
    let input = input.as_ref();
    let output = output.as_ref();

    let reader = ContainerReader::open(input).map_err(MergeError::InputOpen)?;
    let entries = reader.entries(sub_path).map_err(|e| match e {
        ContainerError::NoSuchDirectory(dir) => MergeError::SubPathNotFound {
            sub_path: dir,
            input: input.to_path_buf(),
        },
        other => MergeError::InputOpen(other),
    })?;

    let mut clones: Vec<&Key> = Vec::new();
    let mut seen_names = HashSet::new();
    let mut skipped_entries = Vec::new();

    for key in &entries {
        let skip = match key.kind() {
            EntryKind::Tree => match key.decode_tree() {
                Ok(tree) if seen_names.insert(key.name.clone()) => {
                    info!("Processing {}", key.name);
                    debug!(tree = %key.name, rows = tree.num_rows(), "Cloned tree");
                    clones.push(*key);
                    continue;
                }
                Ok(_) => SkipReason::DuplicateName,
                Err(detail) => SkipReason::Unreadable { detail },
            },
            EntryKind::Directory => SkipReason::NonTabular {
                class: CLASS_DIRECTORY.to_string(),
            },
            EntryKind::Object(class) => SkipReason::NonTabular { class },
            EntryKind::Undetermined => SkipReason::Unreadable {
                detail: format!("corrupt or unknown header on line {}", key.line),
            },
        };

        if skip.is_unreadable() {
            warn!(entry = %key.path(), reason = ?skip, "Skipping entry");
        } else {
            debug!(entry = %key.path(), reason = ?skip, "Skipping entry");
        }
        skipped_entries.push(SkippedEntry {
            name: key.name.clone(),
            reason: skip,
        });
    }

    let scanned = entries.len();
    if scanned > 0
        && clones.is_empty()
        && skipped_entries.iter().all(|s| s.reason.is_unreadable())
    {
        return Err(MergeError::NoReadableEntries {
            sub_path: sub_path.to_string(),
            scanned,
        });
    }

    // Payloads are copied verbatim; decoding above only validated them.
    let mut writer = ContainerWriter::create(output).map_err(MergeError::Output)?;
    for key in &clones {
        writer
            .write_raw("", &key.name, CLASS_TREE, &key.payload)
            .map_err(MergeError::Output)?;
    }
    writer.finish().map_err(MergeError::Output)?;
    let cloned_names: Vec<String> = clones.iter().map(|key| key.name.clone()).collect();
    drop(reader);

    let report = MergeReport {
        input: input.to_path_buf(),
        sub_path: sub_path.to_string(),
        output: output.to_path_buf(),
        scanned,
        cloned: cloned_names.len(),
        skipped: skipped_entries.len(),
        cloned_names,
        skipped_entries,
    };

    info!(
        input = %input.display(),
        output = %output.display(),
        scanned = report.scanned,
        cloned = report.cloned,
        skipped = report.skipped,
        "Merge complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Branch, LeafType, Tree};
    use serde_json::json;
    use tempfile::TempDir;

    fn tree(rows: usize) -> Tree {
        let mut t = Tree::new("ntuple", vec![Branch::new("pt_gmu", LeafType::Double)]).unwrap();
        for i in 0..rows {
            t.push_row(vec![json!(i as f64)]).unwrap();
        }
        t
    }

    #[test]
    fn test_duplicate_tree_names_skipped() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.root");
        std::fs::write(
            &input,
            format!(
                "{}\n\tdemo\tTDirectory\t{{}}\ndemo\tt\tTTree\t{}\ndemo\tt\tTTree\t{}\n",
                crate::container::format::MAGIC,
                serde_json::to_string(&tree(1)).unwrap(),
                serde_json::to_string(&tree(2)).unwrap(),
            ),
        )
        .unwrap();

        let report = merge(&input, "demo", dir.path().join("out.root")).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.cloned, 1);
        assert_eq!(report.skipped_entries[0].reason, SkipReason::DuplicateName);

        let out = ContainerReader::open(dir.path().join("out.root")).unwrap();
        assert_eq!(out.tree("t").unwrap().unwrap().num_rows(), 1);
    }

    #[test]
    fn test_tree_payloads_copied_verbatim() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.root");
        let output = dir.path().join("out.root");
        let payload = r#"{"title":"x","branches":[{"name":"pt","leaf":"D"}],"rows":[[1.50]],"entries":1,"aliases":{"pt":"a"}}"#;
        std::fs::write(
            &input,
            format!(
                "{}\n\tdemo\tTDirectory\t{{}}\ndemo\tt\tTTree\t{payload}\n",
                crate::container::format::MAGIC
            ),
        )
        .unwrap();

        merge(&input, "demo", &output).unwrap();

        let out = ContainerReader::open(&output).unwrap();
        let keys = out.entries("").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].payload, payload);
        assert_eq!(keys[0].class.as_deref(), Some(CLASS_TREE));
    }

    #[test]
    fn test_only_trees_under_sub_path() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.root");
        let mut writer = ContainerWriter::create(&input).unwrap();
        writer.mkdir("demo").unwrap();
        writer.write_tree("demo", "treegmu", &tree(2)).unwrap();
        writer.finish().unwrap();

        let report = merge(&input, "demo", dir.path().join("out.root")).unwrap();
        assert_eq!((report.scanned, report.cloned, report.skipped), (1, 1, 0));
        assert!(report.skipped_entries.is_empty());
    }

    #[test]
    fn test_directories_are_skipped_as_non_tabular() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.root");
        let mut writer = ContainerWriter::create(&input).unwrap();
        writer.mkdir("demo/nested").unwrap();
        writer.write_tree("demo", "t", &tree(3)).unwrap();
        writer.finish().unwrap();

        let report = merge(&input, "demo", dir.path().join("out.root")).unwrap();
        assert_eq!(report.cloned_names, vec!["t"]);
        assert_eq!(
            report.skipped_entries,
            vec![SkippedEntry {
                name: "nested".into(),
                reason: SkipReason::NonTabular {
                    class: "TDirectory".into()
                }
            }]
        );
    }

    #[test]
    fn test_report_display_lists_counts() {
        let report = MergeReport {
            input: "in.root".into(),
            sub_path: "demo".into(),
            output: "out.root".into(),
            scanned: 2,
            cloned: 1,
            skipped: 1,
            cloned_names: vec!["treegmu".into()],
            skipped_entries: vec![SkippedEntry {
                name: "note".into(),
                reason: SkipReason::NonTabular {
                    class: "TObjString".into(),
                },
            }],
        };
        let text = report.to_string();
        assert!(text.contains("scanned: 2  cloned: 1  skipped: 1"));
        assert!(text.contains("+ treegmu"));
        assert!(text.contains("- note (not a tree (TObjString))"));
    }
}
