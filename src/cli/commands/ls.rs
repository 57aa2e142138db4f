//! `treeforge ls`

use crate::container::{ContainerReader, EntryKind};
use crate::error::Result;
use std::path::Path;
use tracing::warn;

/// Print one line per entry: kind, name, and row count for trees.
pub async fn run_ls_command(container: &Path, path: &str) -> Result<()> {
    let reader = ContainerReader::open(container)?;
    if reader.ignored_lines() > 0 {
        warn!(
            "{} line(s) in {} name no entry",
            reader.ignored_lines(),
            container.display()
        );
    }

    for key in reader.entries(path)? {
        let line = match key.kind() {
            EntryKind::Tree => match key.decode_tree() {
                Ok(tree) => format!("TTree\t{}\t{} rows", key.name, tree.num_rows()),
                Err(detail) => format!("TTree\t{}\tunreadable: {detail}", key.name),
            },
            EntryKind::Directory => format!("TDirectory\t{}/", key.name),
            EntryKind::Object(class) => format!("{class}\t{}", key.name),
            EntryKind::Undetermined => format!("?\t{}\tcorrupt header", key.name),
        };
        println!("{line}");
    }
    Ok(())
}
