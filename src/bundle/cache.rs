//! Content-addressed storage for rendered bundles

use super::{BundleError, BundleInfo, RenderedBundle, BUNDLE_MANIFEST_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bundles stored under `<root>/<hash>/`.
#[derive(Debug, Clone)]
pub struct BundleCache {
    root: PathBuf,
}

/// A bundle directory handed out by [`BundleCache::materialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBundle {
    pub dir: PathBuf,
    pub info: BundleInfo,
    /// The directory already existed and was not rewritten
    pub reused: bool,
}

impl BundleCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    /// Write `bundle` unless an identical one is already cached.
    pub fn materialize(&self, bundle: &RenderedBundle) -> Result<CachedBundle, BundleError> {
        let hash = bundle.hash();
        let dir = self.dir_for(&hash);
        let manifest_path = dir.join(BUNDLE_MANIFEST_FILE);

        if let Some(info) = read_manifest(&manifest_path) {
            if info.hash == hash {
                debug!(bundle = %hash, dir = %dir.display(), "Reusing cached bundle");
                return Ok(CachedBundle {
                    dir,
                    info,
                    reused: true,
                });
            }
        }

        let info = bundle.write_to(&dir)?;
        info!(bundle = %hash, dir = %dir.display(), "Cached bundle");
        Ok(CachedBundle {
            dir,
            info,
            reused: false,
        })
    }
}

fn read_manifest(path: &Path) -> Option<BundleInfo> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::RenderedFile;
    use tempfile::TempDir;

    fn bundle(body: &str) -> RenderedBundle {
        RenderedBundle {
            template_set: "test".into(),
            main_script: "run.sh".into(),
            module_source: "m.cc".into(),
            files: vec![
                RenderedFile {
                    name: "m.cc".into(),
                    contents: body.into(),
                },
                RenderedFile {
                    name: "run.sh".into(),
                    contents: "#!/bin/sh\n".into(),
                },
            ],
        }
    }

    #[test]
    fn test_second_materialize_reuses_directory() {
        let dir = TempDir::new().unwrap();
        let cache = BundleCache::new(dir.path());

        let first = cache.materialize(&bundle("int x;")).unwrap();
        assert!(!first.reused);
        assert_eq!(first.dir, cache.dir_for(&first.info.hash));

        let second = cache.materialize(&bundle("int x;")).unwrap();
        assert!(second.reused);
        assert_eq!(second.dir, first.dir);

        let other = cache.materialize(&bundle("int y;")).unwrap();
        assert!(!other.reused);
        assert_ne!(other.dir, first.dir);
    }

    #[test]
    fn test_corrupt_manifest_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let cache = BundleCache::new(dir.path());
        let b = bundle("int x;");
        let target = cache.dir_for(&b.hash());
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(BUNDLE_MANIFEST_FILE), "{broken").unwrap();

        let cached = cache.materialize(&b).unwrap();
        assert!(!cached.reused);
        assert!(target.join("m.cc").is_file());
    }
}
