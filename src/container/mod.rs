//! Container files holding directories and named entries
//!
//! A container is a file-like aggregate of keys. Each key lives in a
//! directory and has a name and a class; trees (`TTree`) are the tabular
//! entries the merger cares about, everything else is carried as an opaque
//! object.

pub mod format;
pub mod reader;
pub mod tree;
pub mod writer;

pub use format::{EntryKind, Key};
pub use reader::ContainerReader;
pub use tree::{Branch, LeafType, Tree, TreeError};
pub use writer::ContainerWriter;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("cannot open container {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a container file (missing '{}' header)", path.display(), format::MAGIC)]
    NotAContainer { path: PathBuf },

    #[error("invalid entry name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("an entry named '{name}' already exists in directory '{dir}'")]
    DuplicateKey { dir: String, name: String },

    #[error("directory '{0}' does not exist")]
    NoSuchDirectory(String),

    #[error("invalid tree '{name}': {source}")]
    InvalidTree {
        name: String,
        #[source]
        source: TreeError,
    },

    #[error("payload of entry '{name}' spans more than one line")]
    MultilinePayload { name: String },

    #[error("failed to encode entry '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
