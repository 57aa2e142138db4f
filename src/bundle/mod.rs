//! Template sets and the bundles rendered from them
//!
//! A template set is every file a job needs: the module source, its job
//! configuration, the build file, and the runner script the container
//! executes. Rendering a set against one [`Fragments`] value yields a
//! [`RenderedBundle`], which can be written to a directory or materialized
//! in a content-addressed [`BundleCache`].

pub mod cache;

pub use cache::{BundleCache, CachedBundle};

use crate::compose::{ComposeError, Composer, Fragments, RenderContext, Skeleton};
use crate::host::LifecyclePhase;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// A file embedded in the binary at build time.
pub struct BundledFile {
    pub name: &'static str,
    pub contents: &'static str,
}

/// A template set embedded in the binary at build time.
pub struct BundledTemplateSet {
    pub manifest: &'static str,
    pub files: &'static [BundledFile],
}

// Generated by build.rs from every directory under templates/ that holds a
// template_set.toml
include!(concat!(env!("OUT_DIR"), "/bundled_templates.rs"));

pub const MANIFEST_FILE: &str = "template_set.toml";
pub const BUNDLE_MANIFEST_FILE: &str = "bundle.json";
pub const DEFAULT_TEMPLATE_SET: &str = "cms/r5";

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("unknown template set '{name}' (available: {})", available.join(", "))]
    UnknownTemplateSet { name: String, available: Vec<String> },

    #[error("invalid template set manifest {origin}: {source}")]
    Manifest {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("template set '{set}' lists '{file}' but does not contain it")]
    MissingFile { set: String, file: String },

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode bundle manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BundleError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> BundleError + '_ {
        move |source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Contents of `template_set.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub name: String,
    /// File holding the module source; must expose the lifecycle entry points
    pub module_source: String,
    /// Script the job container executes
    pub runner: String,
    /// Files in render order; empty means every file in the set
    #[serde(default)]
    pub files: Vec<String>,
    /// Phases the module source must define; all of them when absent
    #[serde(default)]
    pub entry_points: Option<Vec<LifecyclePhase>>,
}

/// A parsed template set, ready to render.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    manifest: TemplateManifest,
    skeletons: Vec<Skeleton>,
}

impl TemplateSet {
    /// Names of the sets embedded in the binary.
    pub fn builtin_names() -> Vec<String> {
        BUNDLED_TEMPLATE_SETS
            .iter()
            .filter_map(|set| toml::from_str::<TemplateManifest>(set.manifest).ok())
            .map(|manifest| manifest.name)
            .collect()
    }

    /// Look up an embedded set by name.
    pub fn builtin(name: &str) -> Result<Self, BundleError> {
        for bundled in BUNDLED_TEMPLATE_SETS {
            let manifest: TemplateManifest =
                toml::from_str(bundled.manifest).map_err(|source| BundleError::Manifest {
                    origin: "(built-in)".to_string(),
                    source,
                })?;
            if manifest.name != name {
                continue;
            }
            let sources = bundled
                .files
                .iter()
                .map(|file| (file.name.to_string(), file.contents.to_string()))
                .collect();
            return Self::from_sources(manifest, sources);
        }

        Err(BundleError::UnknownTemplateSet {
            name: name.to_string(),
            available: Self::builtin_names(),
        })
    }

    /// Load a set from a directory holding a `template_set.toml`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, BundleError> {
        let dir = dir.as_ref();
        let manifest_path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&manifest_path).map_err(BundleError::io(&manifest_path))?;
        let manifest: TemplateManifest =
            toml::from_str(&text).map_err(|source| BundleError::Manifest {
                origin: manifest_path.display().to_string(),
                source,
            })?;

        let mut sources = BTreeMap::new();
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path == manifest_path {
                continue;
            }
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            let contents = fs::read_to_string(path).map_err(BundleError::io(path))?;
            sources.insert(name, contents);
        }

        debug!(dir = %dir.display(), files = sources.len(), "Loaded template set");
        Self::from_sources(manifest, sources)
    }

    fn from_sources(
        mut manifest: TemplateManifest,
        mut sources: BTreeMap<String, String>,
    ) -> Result<Self, BundleError> {
        if manifest.files.is_empty() {
            manifest.files = sources.keys().cloned().collect();
        }
        for required in [&manifest.module_source, &manifest.runner] {
            if !manifest.files.contains(required) {
                manifest.files.push(required.clone());
            }
        }

        let mut skeletons = Vec::with_capacity(manifest.files.len());
        for file in &manifest.files {
            let source = sources.remove(file).ok_or_else(|| BundleError::MissingFile {
                set: manifest.name.clone(),
                file: file.clone(),
            })?;
            skeletons.push(Skeleton::parse(file.clone(), &source)?);
        }

        Ok(Self {
            manifest,
            skeletons,
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &TemplateManifest {
        &self.manifest
    }

    pub fn skeleton(&self, file: &str) -> Option<&Skeleton> {
        self.skeletons.iter().find(|s| s.name() == file)
    }

    /// The lifecycle phases the module source must define.
    pub fn required_phases(&self) -> Vec<LifecyclePhase> {
        self.manifest
            .entry_points
            .clone()
            .unwrap_or_else(|| LifecyclePhase::ALL.to_vec())
    }

    /// Render every file of the set.
    pub fn render(
        &self,
        fragments: &Fragments,
        context: &RenderContext,
    ) -> Result<RenderedBundle, ComposeError> {
        if let Some(slot) = fragments
            .supplied()
            .find(|slot| !self.skeletons.iter().any(|s| s.defines(*slot)))
        {
            return Err(ComposeError::UnknownSlot {
                slot: slot.to_string(),
            });
        }

        let composer = Composer::new(context.clone());
        let mut files = Vec::with_capacity(self.skeletons.len());
        for skeleton in &self.skeletons {
            let contents = composer.compose(skeleton, &fragments.restricted_to(skeleton))?;
            if skeleton.name() == self.manifest.module_source {
                self.check_entry_points(skeleton.name(), &contents, &context.module_name)?;
            }
            files.push(RenderedFile {
                name: skeleton.name().to_string(),
                contents,
            });
        }

        info!(
            template_set = %self.manifest.name,
            module = %context.module_name,
            files = files.len(),
            "Rendered bundle"
        );
        Ok(RenderedBundle {
            template_set: self.manifest.name.clone(),
            main_script: self.manifest.runner.clone(),
            module_source: self.manifest.module_source.clone(),
            files,
        })
    }

    fn check_entry_points(
        &self,
        file: &str,
        contents: &str,
        module_name: &str,
    ) -> Result<(), ComposeError> {
        for phase in self.required_phases() {
            let entry_point = phase.entry_point(module_name);
            if !contents.contains(&entry_point) {
                return Err(ComposeError::MissingEntryPoint {
                    file: file.to_string(),
                    entry_point,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFile {
    pub name: String,
    pub contents: String,
}

/// The rendered files of one template set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBundle {
    pub template_set: String,
    pub main_script: String,
    pub module_source: String,
    pub files: Vec<RenderedFile>,
}

/// What `bundle.json` records about a written bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub hash: String,
    pub template_set: String,
    pub main_script: String,
    pub files: Vec<String>,
}

impl RenderedBundle {
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.contents.as_str())
    }

    /// Content hash over file names and contents, hex encoded.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(file.contents.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn info(&self) -> BundleInfo {
        BundleInfo {
            hash: self.hash(),
            template_set: self.template_set.clone(),
            main_script: self.main_script.clone(),
            files: self.files.iter().map(|f| f.name.clone()).collect(),
        }
    }

    /// Write every file plus `bundle.json` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<BundleInfo, BundleError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(BundleError::io(dir))?;

        for file in &self.files {
            let path = dir.join(&file.name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(BundleError::io(parent))?;
            }
            fs::write(&path, &file.contents).map_err(BundleError::io(&path))?;
            debug!(file = %path.display(), "Wrote bundle file");
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let runner = dir.join(&self.main_script);
            fs::set_permissions(&runner, fs::Permissions::from_mode(0o755))
                .map_err(BundleError::io(&runner))?;
        }

        let info = self.info();
        let manifest_path = dir.join(BUNDLE_MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&info)?;
        fs::write(&manifest_path, json).map_err(BundleError::io(&manifest_path))?;

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Slot;
    use tempfile::TempDir;

    fn muon_fragments() -> Fragments {
        Fragments::new()
            .with(Slot::Includes, ["DataFormats/MuonReco/interface/Muon.h"])
            .with(Slot::Declarations, ["std::vector<float> pt_gmu;"])
            .with(
                Slot::Setup,
                [
                    "edm::Service<TFileService> fs;",
                    "myTree = fs->make<TTree>(\"treegmu\", \"ntuple\");",
                    "myTree->Branch(\"pt_gmu\", &pt_gmu);",
                ],
            )
            .with(
                Slot::PerItem,
                ["pt_gmu.clear();", "pt_gmu.push_back(1.0);", "myTree->Fill();"],
            )
    }

    #[test]
    fn test_builtin_set_is_embedded() {
        assert!(TemplateSet::builtin_names().contains(&DEFAULT_TEMPLATE_SET.to_string()));
        let set = TemplateSet::builtin(DEFAULT_TEMPLATE_SET).unwrap();
        assert_eq!(set.manifest().runner, "runner.sh");
        assert!(set.skeleton("Analyzer.cc").is_some());
    }

    #[test]
    fn test_unknown_builtin_set() {
        assert!(matches!(
            TemplateSet::builtin("nope"),
            Err(BundleError::UnknownTemplateSet { .. })
        ));
    }

    #[test]
    fn test_render_default_set() {
        let set = TemplateSet::builtin(DEFAULT_TEMPLATE_SET).unwrap();
        let bundle = set
            .render(&muon_fragments(), &RenderContext::default())
            .unwrap();

        let module = bundle.file("Analyzer.cc").unwrap();
        assert!(module.contains("#include \"DataFormats/MuonReco/interface/Muon.h\""));
        assert!(module.contains("   std::vector<float> pt_gmu;"));
        assert!(module.contains("DEFINE_FWK_MODULE(Analyzer);"));
        assert!(bundle.file("runner.sh").unwrap().contains("merge"));
        assert_eq!(bundle.main_script, "runner.sh");
    }

    #[test]
    fn test_missing_entry_point() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "name = \"tiny\"\nmodule_source = \"m.cc\"\nrunner = \"run.sh\"\nentry_points = [\"analyze\"]\n",
        )
        .unwrap();
        fs::write(dir.path().join("m.cc"), "void {{ module_name }}::setup() {}\n").unwrap();
        fs::write(dir.path().join("run.sh"), "#!/bin/sh\n").unwrap();

        let set = TemplateSet::load_dir(dir.path()).unwrap();
        let err = set
            .render(&Fragments::new(), &RenderContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::MissingEntryPoint { ref entry_point, .. } if entry_point == "Analyzer::analyze("
        ));
    }

    #[test]
    fn test_slot_missing_from_every_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "name = \"tiny\"\nmodule_source = \"m.cc\"\nrunner = \"run.sh\"\nentry_points = []\n",
        )
        .unwrap();
        fs::write(dir.path().join("m.cc"), "{# slot: includes #}\n").unwrap();
        fs::write(dir.path().join("run.sh"), "#!/bin/sh\n").unwrap();

        let set = TemplateSet::load_dir(dir.path()).unwrap();
        let fragments = Fragments::new().with(Slot::PerItem, ["x = 1;"]);
        assert!(matches!(
            set.render(&fragments, &RenderContext::default()),
            Err(ComposeError::UnknownSlot { ref slot }) if slot == "per_item"
        ));
    }

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let set = TemplateSet::builtin(DEFAULT_TEMPLATE_SET).unwrap();
        let a = set.render(&muon_fragments(), &RenderContext::default()).unwrap();
        let b = set.render(&muon_fragments(), &RenderContext::default()).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);

        let context = RenderContext {
            module_name: "Muons".into(),
            ..RenderContext::default()
        };
        let c = set.render(&muon_fragments(), &context).unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_write_to_marks_runner_executable() {
        let dir = TempDir::new().unwrap();
        let set = TemplateSet::builtin(DEFAULT_TEMPLATE_SET).unwrap();
        let bundle = set.render(&muon_fragments(), &RenderContext::default()).unwrap();

        let info = bundle.write_to(dir.path()).unwrap();
        assert_eq!(info.hash, bundle.hash());
        assert!(dir.path().join("Analyzer.cc").is_file());

        let manifest: BundleInfo = serde_json::from_str(
            &fs::read_to_string(dir.path().join(BUNDLE_MANIFEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest, info);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path().join("runner.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
