use crate::bundle::BundleError;
use crate::compose::ComposeError;
use crate::container::ContainerError;
use crate::merge::MergeError;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// Every failure a treeforge command can end with
#[derive(Error, Debug)]
pub enum TreeforgeError {
    #[error("Configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("Invalid input {}: {message}", path.display())]
    InvalidInput { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TreeforgeError>;

impl TreeforgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config(_) => ErrorCode::CONFIG_GENERIC,
            Self::Compose(e) => compose_code(e),
            Self::Bundle(e) => match e {
                BundleError::Compose(inner) => compose_code(inner),
                BundleError::UnknownTemplateSet { .. } => ErrorCode::TEMPLATE_SET_UNKNOWN,
                BundleError::Manifest { .. } | BundleError::MissingFile { .. } => {
                    ErrorCode::TEMPLATE_SET_INVALID
                }
                BundleError::Io { .. } | BundleError::Encode(_) => ErrorCode::BUNDLE_WRITE_FAILED,
            },
            Self::Container(e) => container_code(e),
            Self::Merge(e) => match e {
                MergeError::InputOpen(_) => ErrorCode::MERGE_INPUT_OPEN,
                MergeError::SubPathNotFound { .. } => ErrorCode::MERGE_SUB_PATH_NOT_FOUND,
                MergeError::NoReadableEntries { .. } => ErrorCode::MERGE_NO_READABLE_ENTRIES,
                MergeError::Output(_) => ErrorCode::MERGE_OUTPUT_FAILED,
                MergeError::ConflictingOutputs { .. } => ErrorCode::MERGE_CONFLICTING_OUTPUTS,
                MergeError::Task(_) => ErrorCode::MERGE_TASK_FAILED,
            },
            Self::InvalidInput { .. } => ErrorCode::OTHER_INVALID_INPUT,
            Self::Io { .. } => ErrorCode::OTHER_IO,
            Self::Other(_) => ErrorCode::OTHER_GENERIC,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            ErrorCode::CONFIG_GENERIC => 2,

            ErrorCode::COMPOSE_UNKNOWN_SLOT => 10,
            ErrorCode::COMPOSE_DUPLICATE_DECLARATION => 11,
            ErrorCode::COMPOSE_UNRESOLVED_REFERENCE => 12,
            ErrorCode::COMPOSE_DUPLICATE_COLUMN => 13,
            ErrorCode::COMPOSE_INVALID_SKELETON
            | ErrorCode::COMPOSE_TEMPLATE_ERROR
            | ErrorCode::TEMPLATE_SET_UNKNOWN
            | ErrorCode::TEMPLATE_SET_INVALID => 14,
            ErrorCode::COMPOSE_MISSING_ENTRY_POINT => 15,

            ErrorCode::MERGE_INPUT_OPEN
            | ErrorCode::CONTAINER_OPEN_FAILED
            | ErrorCode::CONTAINER_BAD_MAGIC => 20,
            ErrorCode::MERGE_SUB_PATH_NOT_FOUND | ErrorCode::CONTAINER_NO_SUCH_DIRECTORY => 21,
            ErrorCode::MERGE_NO_READABLE_ENTRIES => 22,
            ErrorCode::MERGE_OUTPUT_FAILED
            | ErrorCode::BUNDLE_WRITE_FAILED
            | ErrorCode::CONTAINER_INVALID_NAME
            | ErrorCode::CONTAINER_DUPLICATE_KEY
            | ErrorCode::CONTAINER_INVALID_TREE
            | ErrorCode::CONTAINER_ENCODE_FAILED
            | ErrorCode::CONTAINER_WRITE_FAILED
            | ErrorCode::OTHER_IO => 23,
            ErrorCode::MERGE_CONFLICTING_OUTPUTS => 24,

            _ => 1,
        }
    }

    /// Get a user-friendly error message, prefixed with the error code
    pub fn user_message(&self) -> String {
        format!("[E{:04}] {}", self.code(), self)
    }
}

fn compose_code(error: &ComposeError) -> u16 {
    match error {
        ComposeError::UnknownSlot { .. } => ErrorCode::COMPOSE_UNKNOWN_SLOT,
        ComposeError::DuplicateDeclaration { .. } => ErrorCode::COMPOSE_DUPLICATE_DECLARATION,
        ComposeError::UnresolvedReference { .. } => ErrorCode::COMPOSE_UNRESOLVED_REFERENCE,
        ComposeError::DuplicateColumn { .. } => ErrorCode::COMPOSE_DUPLICATE_COLUMN,
        ComposeError::InvalidSkeleton { .. } => ErrorCode::COMPOSE_INVALID_SKELETON,
        ComposeError::MissingEntryPoint { .. } => ErrorCode::COMPOSE_MISSING_ENTRY_POINT,
        ComposeError::Template(_) => ErrorCode::COMPOSE_TEMPLATE_ERROR,
    }
}

fn container_code(error: &ContainerError) -> u16 {
    match error {
        ContainerError::Open { .. } => ErrorCode::CONTAINER_OPEN_FAILED,
        ContainerError::NotAContainer { .. } => ErrorCode::CONTAINER_BAD_MAGIC,
        ContainerError::InvalidName { .. } => ErrorCode::CONTAINER_INVALID_NAME,
        ContainerError::DuplicateKey { .. } => ErrorCode::CONTAINER_DUPLICATE_KEY,
        ContainerError::NoSuchDirectory(_) => ErrorCode::CONTAINER_NO_SUCH_DIRECTORY,
        ContainerError::InvalidTree { .. } => ErrorCode::CONTAINER_INVALID_TREE,
        ContainerError::Encode { .. } | ContainerError::MultilinePayload { .. } => {
            ErrorCode::CONTAINER_ENCODE_FAILED
        }
        ContainerError::Write { .. } => ErrorCode::CONTAINER_WRITE_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_exit_codes_are_distinct() {
        let errors = [
            ComposeError::UnknownSlot { slot: "x".into() },
            ComposeError::DuplicateDeclaration { name: "a".into() },
            ComposeError::UnresolvedReference {
                name: "a".into(),
                slot: crate::compose::Slot::Setup,
            },
            ComposeError::DuplicateColumn {
                table: "t".into(),
                column: "c".into(),
            },
            ComposeError::InvalidSkeleton {
                name: "s".into(),
                reason: "r".into(),
            },
            ComposeError::MissingEntryPoint {
                file: "f".into(),
                entry_point: "e".into(),
            },
        ];
        let codes: Vec<i32> = errors
            .into_iter()
            .map(|e| TreeforgeError::from(e).exit_code())
            .collect();
        assert_eq!(codes, vec![10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_merge_exit_codes() {
        let sub_path_missing = TreeforgeError::from(MergeError::SubPathNotFound {
            sub_path: "demo".into(),
            input: "in.root".into(),
        });
        assert_eq!(sub_path_missing.exit_code(), 21);

        let unreadable = TreeforgeError::from(MergeError::NoReadableEntries {
            sub_path: "demo".into(),
            scanned: 3,
        });
        assert_eq!(unreadable.exit_code(), 22);

        let conflict = TreeforgeError::from(MergeError::ConflictingOutputs {
            output: "out.root".into(),
        });
        assert_eq!(conflict.exit_code(), 24);
    }

    #[test]
    fn test_bundle_compose_errors_keep_their_exit_code() {
        let err = TreeforgeError::from(BundleError::Compose(ComposeError::UnknownSlot {
            slot: "per_item".into(),
        }));
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn test_user_message_carries_code() {
        let err = TreeforgeError::Config(anyhow::anyhow!("bad value"));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.user_message(),
            "[E1000] Configuration error: bad value"
        );
        assert_eq!(TreeforgeError::Other("boom".into()).exit_code(), 1);
    }
}
