//! Line-oriented key codec
//!
//! ```text
//! TREEFORGE-CONTAINER 1
//! <dir>\t<name>\t<class>\t<payload-json>
//! ```
//!
//! The key header (directory, name, class) is readable on its own, so a
//! damaged payload only costs the entry it belongs to.

use super::{ContainerError, Tree};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAGIC: &str = "TREEFORGE-CONTAINER 1";

pub const CLASS_DIRECTORY: &str = "TDirectory";
pub const CLASS_TREE: &str = "TTree";

static CLASS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_:]*$").expect("Valid regex pattern"));

/// What a key holds, as far as its header and payload tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Tree,
    /// Any other well-formed object, identified by its class name
    Object(String),
    /// Corrupt or unknown header, or a payload that is not JSON
    Undetermined,
}

/// One entry as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub dir: String,
    pub name: String,
    pub class: Option<String>,
    pub payload: String,
    /// 1-based line in the container file
    pub line: usize,
}

impl Key {
    /// Decode one key line. `None` when the line cannot even be attributed
    /// to a directory and name.
    pub fn parse(line: &str, line_no: usize) -> Option<Key> {
        let mut fields = line.splitn(4, '\t');
        let dir = fields.next()?;
        let name = fields.next()?;
        if name.is_empty() {
            return None;
        }
        let class = fields
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let payload = fields.next().unwrap_or_default().to_string();

        Some(Key {
            dir: normalize_path(dir),
            name: name.to_string(),
            class,
            payload,
            line: line_no,
        })
    }

    pub fn kind(&self) -> EntryKind {
        let Some(class) = self.class.as_deref() else {
            return EntryKind::Undetermined;
        };
        if !CLASS_REGEX.is_match(class)
            || serde_json::from_str::<serde::de::IgnoredAny>(&self.payload).is_err()
        {
            return EntryKind::Undetermined;
        }
        match class {
            CLASS_DIRECTORY => EntryKind::Directory,
            CLASS_TREE => EntryKind::Tree,
            other => EntryKind::Object(other.to_string()),
        }
    }

    /// Decode the payload of a `TTree` key.
    pub fn decode_tree(&self) -> Result<Tree, String> {
        let tree: Tree = serde_json::from_str(&self.payload).map_err(|e| e.to_string())?;
        tree.validate().map_err(|e| e.to_string())?;
        Ok(tree)
    }

    /// Full path of this entry.
    pub fn path(&self) -> String {
        join(&self.dir, &self.name)
    }
}

pub fn encode_key(dir: &str, name: &str, class: &str, payload: &str) -> String {
    format!("{dir}\t{name}\t{class}\t{payload}\n")
}

/// Names must be usable as a single path component of a key line.
pub fn validate_name(name: &str) -> Result<(), ContainerError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('/') {
        Some("name contains '/'")
    } else if name.contains(['\t', '\n', '\r']) {
        Some("name contains a tab or line break")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ContainerError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// `"/demo//sub/"` becomes `"demo/sub"`; the root is `""`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Split a normalized path into parent directory and last component.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_key() {
        let key = Key::parse("demo\ttreegmu\tTTree\t{\"branches\":[]}", 3).unwrap();
        assert_eq!(key.dir, "demo");
        assert_eq!(key.name, "treegmu");
        assert_eq!(key.class.as_deref(), Some("TTree"));
        assert_eq!(key.line, 3);
        assert_eq!(key.kind(), EntryKind::Tree);
        assert_eq!(key.path(), "demo/treegmu");
    }

    #[test]
    fn test_payload_may_contain_tabs() {
        let key = Key::parse("\tnote\tTObjString\t\"a\tb\"", 2).unwrap();
        assert_eq!(key.payload, "\"a\tb\"");
    }

    #[test]
    fn test_unattributable_lines() {
        assert!(Key::parse("garbage", 2).is_none());
        assert!(Key::parse("demo\t", 2).is_none());
    }

    #[test]
    fn test_kind_undetermined_for_corrupt_headers() {
        let missing_class = Key::parse("demo\tbroken", 2).unwrap();
        assert_eq!(missing_class.kind(), EntryKind::Undetermined);

        let bad_class = Key::parse("demo\tbroken\t%%%\t{}", 2).unwrap();
        assert_eq!(bad_class.kind(), EntryKind::Undetermined);

        let bad_payload = Key::parse("demo\tbroken\tTTree\t{not json", 2).unwrap();
        assert_eq!(bad_payload.kind(), EntryKind::Undetermined);
    }

    #[test]
    fn test_kind_object_for_other_classes() {
        let key = Key::parse("demo\tnote\tTObjString\t\"hello\"", 2).unwrap();
        assert_eq!(key.kind(), EntryKind::Object("TObjString".into()));
    }

    #[test]
    fn test_decode_tree_rejects_inconsistent_rows() {
        let payload = r#"{"branches":[{"name":"pt","leaf":"D"}],"rows":[[1.0,2.0]]}"#;
        let key = Key::parse(&format!("demo\tt\tTTree\t{payload}"), 2).unwrap();
        assert_eq!(key.kind(), EntryKind::Tree);
        assert!(key.decode_tree().unwrap_err().contains("branches"));
    }

    #[test]
    fn test_normalize_and_split() {
        assert_eq!(normalize_path("/demo//sub/"), "demo/sub");
        assert_eq!(normalize_path(""), "");
        assert_eq!(split_parent("demo/sub"), ("demo", "sub"));
        assert_eq!(split_parent("demo"), ("", "demo"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("treegmu").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\tb").is_err());
    }
}
