//! Read-only access to a container file

use super::format::{self, EntryKind, Key};
use super::{ContainerError, Tree};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An opened container.
///
/// The file is read completely by [`ContainerReader::open`] and the handle is
/// released before `open` returns, so nothing stays open however the caller
/// exits.
#[derive(Debug, Clone)]
pub struct ContainerReader {
    path: PathBuf,
    keys: Vec<Key>,
    directories: HashSet<String>,
    ignored_lines: usize,
}

impl ContainerReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path).map_err(|source| ContainerError::Open {
            path: path.clone(),
            source,
        })?;

        let mut lines = bytes.split(|b| *b == b'\n');
        let header = lines.next().map(String::from_utf8_lossy);
        if header.as_deref().map(str::trim_end) != Some(format::MAGIC) {
            return Err(ContainerError::NotAContainer { path });
        }

        let mut keys = Vec::new();
        let mut directories = HashSet::from([String::new()]);
        let mut ignored_lines = 0;

        for (idx, raw) in lines.enumerate() {
            let line_no = idx + 2;
            let text = String::from_utf8_lossy(raw);
            let text = text.trim_end_matches('\r');
            if text.trim().is_empty() {
                continue;
            }

            match Key::parse(text, line_no) {
                Some(key) => {
                    if key.kind() == EntryKind::Directory {
                        directories.insert(key.path());
                    }
                    keys.push(key);
                }
                None => {
                    warn!(
                        container = %path.display(),
                        line = line_no,
                        "Ignoring line that names no entry"
                    );
                    ignored_lines += 1;
                }
            }
        }

        debug!(
            container = %path.display(),
            keys = keys.len(),
            directories = directories.len(),
            "Opened container"
        );

        Ok(Self {
            path,
            keys,
            directories,
            ignored_lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines that could not be attributed to any directory.
    pub fn ignored_lines(&self) -> usize {
        self.ignored_lines
    }

    pub fn has_directory(&self, dir: &str) -> bool {
        self.directories.contains(&format::normalize_path(dir))
    }

    /// All directory paths, sorted; the root is `""`.
    pub fn directories(&self) -> Vec<&str> {
        let mut dirs: Vec<&str> = self.directories.iter().map(String::as_str).collect();
        dirs.sort_unstable();
        dirs
    }

    /// Immediate entries of `dir`, in file order.
    pub fn entries(&self, dir: &str) -> Result<Vec<&Key>, ContainerError> {
        let dir = format::normalize_path(dir);
        if !self.directories.contains(&dir) {
            return Err(ContainerError::NoSuchDirectory(dir));
        }
        Ok(self.keys.iter().filter(|key| key.dir == dir).collect())
    }

    /// Decode the tree stored at `path`, if there is one.
    pub fn tree(&self, path: &str) -> Option<Result<Tree, String>> {
        let path = format::normalize_path(path);
        let (dir, name) = format::split_parent(&path);
        self.keys
            .iter()
            .find(|key| key.dir == dir && key.name == name && key.kind() == EntryKind::Tree)
            .map(Key::decode_tree)
    }
}
