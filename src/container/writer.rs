//! Creating container files

use super::format::{self, CLASS_DIRECTORY, CLASS_TREE};
use super::{ContainerError, Tree};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes a new container, replacing whatever is at the destination.
///
/// Keys are staged in a temporary file next to the destination. Only
/// [`ContainerWriter::finish`] moves it into place; a writer dropped before
/// that removes the staging file and leaves the destination untouched.
pub struct ContainerWriter {
    path: PathBuf,
    staging: BufWriter<NamedTempFile>,
    names: HashMap<String, HashSet<String>>,
    keys_written: usize,
}

impl ContainerWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let staging = NamedTempFile::new_in(&parent).map_err(|source| ContainerError::Write {
            path: path.clone(),
            source,
        })?;

        let mut writer = Self {
            path,
            staging: BufWriter::new(staging),
            names: HashMap::from([(String::new(), HashSet::new())]),
            keys_written: 0,
        };
        writer.write_line(&format!("{}\n", format::MAGIC))?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a directory and any missing parents.
    pub fn mkdir(&mut self, dir: &str) -> Result<(), ContainerError> {
        let dir = format::normalize_path(dir);
        let mut parent = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            let full = format::join(&parent, segment);
            if !self.names.contains_key(&full) {
                self.write_key(&parent, segment, CLASS_DIRECTORY, "{}")?;
                self.names.insert(full.clone(), HashSet::new());
            }
            parent = full;
        }
        Ok(())
    }

    pub fn write_tree(&mut self, dir: &str, name: &str, tree: &Tree) -> Result<(), ContainerError> {
        tree.validate().map_err(|source| ContainerError::InvalidTree {
            name: name.to_string(),
            source,
        })?;
        let payload = serde_json::to_string(tree).map_err(|source| ContainerError::Encode {
            name: name.to_string(),
            source,
        })?;
        self.write_key(dir, name, CLASS_TREE, &payload)
    }

    /// Store an already encoded payload exactly as given.
    ///
    /// Used to copy keys between containers without re-encoding them.
    pub fn write_raw(
        &mut self,
        dir: &str,
        name: &str,
        class: &str,
        payload: &str,
    ) -> Result<(), ContainerError> {
        if payload.contains(['\n', '\r']) {
            return Err(ContainerError::MultilinePayload {
                name: name.to_string(),
            });
        }
        self.write_key(dir, name, class, payload)
    }

    /// Store a non-tabular object under an arbitrary class name.
    pub fn write_object(
        &mut self,
        dir: &str,
        name: &str,
        class: &str,
        payload: &Value,
    ) -> Result<(), ContainerError> {
        let payload = serde_json::to_string(payload).map_err(|source| ContainerError::Encode {
            name: name.to_string(),
            source,
        })?;
        self.write_key(dir, name, class, &payload)
    }

    /// Flush and move the container into place.
    pub fn finish(self) -> Result<PathBuf, ContainerError> {
        let path = self.path;
        let write_err = |source: std::io::Error| ContainerError::Write {
            path: path.clone(),
            source,
        };

        let staging = self
            .staging
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?;
        staging.as_file().sync_all().map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(staging.path(), std::fs::Permissions::from_mode(0o644))
                .map_err(write_err)?;
        }

        staging.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(
            container = %path.display(),
            keys = self.keys_written,
            "Finalized container"
        );
        Ok(path)
    }

    fn write_key(
        &mut self,
        dir: &str,
        name: &str,
        class: &str,
        payload: &str,
    ) -> Result<(), ContainerError> {
        format::validate_name(name)?;
        let dir = format::normalize_path(dir);
        let Some(names) = self.names.get_mut(&dir) else {
            return Err(ContainerError::NoSuchDirectory(dir));
        };
        if !names.insert(name.to_string()) {
            return Err(ContainerError::DuplicateKey {
                dir,
                name: name.to_string(),
            });
        }

        let line = format::encode_key(&dir, name, class, payload);
        self.write_line(&line)?;
        self.keys_written += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), ContainerError> {
        self.staging
            .write_all(line.as_bytes())
            .map_err(|source| ContainerError::Write {
                path: self.path.clone(),
                source,
            })
    }
}
