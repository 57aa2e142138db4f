//! Tabular record containers ("trees")

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafType {
    #[serde(rename = "D")]
    Double,
    #[serde(rename = "F")]
    Float,
    #[serde(rename = "I")]
    Int,
    #[serde(rename = "L")]
    Long,
    #[serde(rename = "O")]
    Bool,
    #[serde(rename = "C")]
    Text,
    #[serde(rename = "V")]
    DoubleVector,
}

impl LeafType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            LeafType::Double | LeafType::Float => value.is_number(),
            LeafType::Int | LeafType::Long => value.is_i64() || value.is_u64(),
            LeafType::Bool => value.is_boolean(),
            LeafType::Text => value.is_string(),
            LeafType::DoubleVector => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_number)),
        }
    }
}

/// One named column of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub leaf: LeafType,
}

impl Branch {
    pub fn new(name: impl Into<String>, leaf: LeafType) -> Self {
        Self {
            name: name.into(),
            leaf,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("branch '{0}' appears more than once")]
    DuplicateBranch(String),

    #[error("row {row} has {found} values but the tree has {expected} branches")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}, branch '{branch}': value does not match leaf type {leaf:?}")]
    LeafMismatch {
        row: usize,
        branch: String,
        leaf: LeafType,
    },
}

/// A named, schema-bearing, row-oriented record set.
///
/// Values are kept as JSON values so a tree can be copied without any
/// knowledge of what its columns mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub title: String,
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Tree {
    pub fn new(title: impl Into<String>, branches: Vec<Branch>) -> Result<Self, TreeError> {
        let tree = Self {
            title: title.into(),
            branches,
            rows: Vec::new(),
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Append one row; its width and value types must match the branches.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TreeError> {
        self.check_row(self.rows.len(), &row)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|b| b.name.as_str())
    }

    /// Schema and row consistency.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        for branch in &self.branches {
            if !seen.insert(branch.name.as_str()) {
                return Err(TreeError::DuplicateBranch(branch.name.clone()));
            }
        }
        for (idx, row) in self.rows.iter().enumerate() {
            self.check_row(idx, row)?;
        }
        Ok(())
    }

    fn check_row(&self, idx: usize, row: &[Value]) -> Result<(), TreeError> {
        if row.len() != self.branches.len() {
            return Err(TreeError::RowWidth {
                row: idx,
                expected: self.branches.len(),
                found: row.len(),
            });
        }
        for (branch, value) in self.branches.iter().zip(row) {
            if !branch.leaf.accepts(value) {
                return Err(TreeError::LeafMismatch {
                    row: idx,
                    branch: branch.name.clone(),
                    leaf: branch.leaf,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn muon_tree() -> Tree {
        Tree::new(
            "My analysis ntuple",
            vec![
                Branch::new("pt_gmu", LeafType::Double),
                Branch::new("nRun", LeafType::Int),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_push_row_checks_width_and_types() {
        let mut tree = muon_tree();
        tree.push_row(vec![json!(41.5), json!(1)]).unwrap();
        assert_eq!(tree.num_rows(), 1);

        assert_eq!(
            tree.push_row(vec![json!(1.0)]),
            Err(TreeError::RowWidth {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            tree.push_row(vec![json!(1.0), json!(2.5)]),
            Err(TreeError::LeafMismatch { ref branch, .. }) if branch == "nRun"
        ));
        assert_eq!(tree.num_rows(), 1);
    }

    #[test]
    fn test_duplicate_branch_rejected() {
        let err = Tree::new(
            "t",
            vec![
                Branch::new("pt", LeafType::Double),
                Branch::new("pt", LeafType::Float),
            ],
        )
        .unwrap_err();
        assert_eq!(err, TreeError::DuplicateBranch("pt".into()));
    }

    #[test]
    fn test_leaf_codes_serialize_compactly() {
        let json = serde_json::to_string(&Branch::new("v", LeafType::DoubleVector)).unwrap();
        assert_eq!(json, r#"{"name":"v","leaf":"V"}"#);
    }

    #[test]
    fn test_vector_leaf_accepts_numeric_arrays_only() {
        let mut tree = Tree::new("t", vec![Branch::new("v", LeafType::DoubleVector)]).unwrap();
        assert!(tree.push_row(vec![json!([1.0, 2.0])]).is_ok());
        assert!(tree.push_row(vec![json!(["a"])]).is_err());
    }
}
