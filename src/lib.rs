//! # treeforge
//!
//! Generates event-processing analysis modules from skeleton templates and
//! consolidates the tree output of their runs.
//!
//! ## Usage
//!
//! ```bash
//! treeforge generate fragments.toml -o bundle/
//! treeforge merge ANALYSIS.root demo output.root
//! ```
//!
//! ## Modules
//!
//! - `compose` - Slot-based composition of module sources from skeletons and fragments
//! - `bundle` - Template sets, rendered job bundles, and the bundle cache
//! - `host` - Lifecycle contract and module registry for analysis modules
//! - `container` - Container files holding directories, trees, and other objects
//! - `merge` - Copying the trees of one container directory into a new container
//! - `config` - Configuration loading from files and environment
//! - `cli` - Command-line interface
//! - `error` - Crate-wide error type with error codes and exit codes
pub mod bundle;
pub mod cli;
pub mod compose;
pub mod config;
pub mod container;
pub mod error;
pub mod host;
pub mod merge;

pub use error::{Result, TreeforgeError};
