use super::{get_global_treeforge_dir, TreeforgeConfig, PROJECT_CONFIG_FILE};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Builds the effective configuration: defaults, then the global file, then
/// the project file, then environment variables.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: TreeforgeConfig,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `config.toml` from the global treeforge directory, if present.
    pub async fn load_global(&mut self) -> Result<()> {
        let Ok(global_dir) = get_global_treeforge_dir() else {
            return Ok(());
        };
        let config_path = global_dir.join("config.toml");

        if config_path.exists() {
            self.load_file(&config_path).await?;
        }
        Ok(())
    }

    /// Load `explicit` if given (it must exist), otherwise `treeforge.toml`
    /// in `project_path` if present.
    pub async fn load_project(&mut self, project_path: &Path, explicit: Option<&Path>) -> Result<()> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Configuration file not found: {}", path.display()));
                }
                self.load_file(path).await
            }
            None => {
                let config_path = project_path.join(PROJECT_CONFIG_FILE);
                if config_path.exists() {
                    self.load_file(&config_path).await?;
                }
                Ok(())
            }
        }
    }

    async fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let layer: TreeforgeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        debug!(path = %path.display(), "Loaded configuration");
        self.config.merge_from(layer);
        Ok(())
    }

    /// The effective configuration, environment variables applied last.
    pub fn get_config(&self) -> TreeforgeConfig {
        let mut config = self.config.clone();
        config.merge_env_vars();
        config
    }

    /// Load every layer for a command run from `project_path`.
    pub async fn load(project_path: &Path, explicit: Option<&Path>) -> Result<TreeforgeConfig> {
        let mut loader = Self::new();
        loader.load_global().await?;
        loader.load_project(project_path, explicit).await?;
        Ok(loader.get_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_project_file_is_picked_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "module_name = \"Muons\"\nsub_path = \"ntuples\"\n",
        )
        .unwrap();

        let mut loader = ConfigLoader::new();
        loader.load_project(dir.path(), None).await.unwrap();
        assert_eq!(loader.config.module_name(), "Muons");
        assert_eq!(loader.config.sub_path(), "ntuples");
    }

    #[tokio::test]
    async fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");

        let mut loader = ConfigLoader::new();
        let err = loader
            .load_project(dir.path(), Some(&missing))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "module_name = [").unwrap();

        let mut loader = ConfigLoader::new();
        let err = loader.load_project(dir.path(), Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_missing_project_file_is_fine() {
        let dir = TempDir::new().unwrap();
        let mut loader = ConfigLoader::new();
        loader.load_project(dir.path(), None).await.unwrap();
        assert_eq!(loader.config, TreeforgeConfig::default());
    }
}
