use crate::bundle::DEFAULT_TEMPLATE_SET;
use crate::compose::RenderContext;
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod loader;

pub use loader::ConfigLoader;

/// File name of the per-project configuration.
pub const PROJECT_CONFIG_FILE: &str = "treeforge.toml";

pub const DEFAULT_MODULE_NAME: &str = "Analyzer";
pub const DEFAULT_SUB_PATH: &str = "demo";

/// Get the global treeforge directory for storing configuration and data
pub fn get_global_treeforge_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "treeforge", "treeforge")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Settings shared by every command. Unset fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeforgeConfig {
    pub log_level: Option<String>,
    pub module_name: Option<String>,
    pub template_set: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub sub_path: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl TreeforgeConfig {
    /// Overlay every field `other` sets.
    pub fn merge_from(&mut self, other: TreeforgeConfig) {
        let TreeforgeConfig {
            log_level,
            module_name,
            template_set,
            template_dir,
            sub_path,
            cache_dir,
        } = other;

        self.log_level = log_level.or(self.log_level.take());
        self.module_name = module_name.or(self.module_name.take());
        self.template_set = template_set.or(self.template_set.take());
        self.template_dir = template_dir.or(self.template_dir.take());
        self.sub_path = sub_path.or(self.sub_path.take());
        self.cache_dir = cache_dir.or(self.cache_dir.take());
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Like [`Self::merge_env_vars`] with a custom variable lookup.
    pub fn merge_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(log_level) = lookup("TREEFORGE_LOG_LEVEL") {
            self.log_level = Some(log_level);
        }

        if let Some(sub_path) = lookup("TREEFORGE_SUB_PATH") {
            self.sub_path = Some(sub_path);
        }

        if let Some(module_name) = lookup("TREEFORGE_MODULE_NAME") {
            self.module_name = Some(module_name);
        }

        if let Some(template_set) = lookup("TREEFORGE_TEMPLATE_SET") {
            self.template_set = Some(template_set);
        }

        if let Some(cache_dir) = lookup("TREEFORGE_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(cache_dir));
        }
    }

    pub fn module_name(&self) -> &str {
        self.module_name.as_deref().unwrap_or(DEFAULT_MODULE_NAME)
    }

    pub fn sub_path(&self) -> &str {
        self.sub_path.as_deref().unwrap_or(DEFAULT_SUB_PATH)
    }

    pub fn template_set(&self) -> &str {
        self.template_set.as_deref().unwrap_or(DEFAULT_TEMPLATE_SET)
    }

    pub fn render_context(&self) -> RenderContext {
        RenderContext {
            module_name: self.module_name().to_string(),
            sub_path: self.sub_path().to_string(),
            ..RenderContext::default()
        }
    }
}
