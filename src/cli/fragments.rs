//! Reading fragment files
//!
//! A fragment file maps slot names to lists of lines:
//!
//! ```toml
//! includes = ["DataFormats/MuonReco/interface/Muon.h"]
//! declarations = ["std::vector<float> pt_gmu;"]
//! ```
//!
//! The format follows the extension: `.toml`, `.json`, `.yaml` or `.yml`.

use crate::compose::Fragments;
use crate::error::{Result, TreeforgeError};
use std::collections::BTreeMap;
use std::path::Path;

type NamedLines = BTreeMap<String, Vec<String>>;

pub fn load_fragments(path: &Path) -> Result<Fragments> {
    let text = std::fs::read_to_string(path).map_err(|e| TreeforgeError::io(path, e))?;
    let invalid = |message: String| TreeforgeError::InvalidInput {
        path: path.to_path_buf(),
        message,
    };

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let named: NamedLines = match extension.as_deref() {
        Some("toml") => toml::from_str(&text).map_err(|e| invalid(e.to_string()))?,
        Some("json") => serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?,
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))?
        }
        _ => {
            return Err(invalid(
                "unrecognized extension (expected .toml, .json, .yaml or .yml)".to_string(),
            ))
        }
    };

    Ok(Fragments::from_named(named)?)
}
