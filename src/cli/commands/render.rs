//! `treeforge render` and `treeforge generate`

use crate::bundle::{BundleCache, TemplateSet};
use crate::cli::fragments::load_fragments;
use crate::compose::{Composer, Skeleton};
use crate::config::TreeforgeConfig;
use crate::error::{Result, TreeforgeError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Render one skeleton file to stdout or `output`.
pub async fn run_render_command(
    skeleton_path: &Path,
    fragments_path: &Path,
    output: Option<&Path>,
    module_name: Option<String>,
    config: &TreeforgeConfig,
) -> Result<()> {
    let source =
        fs::read_to_string(skeleton_path).map_err(|e| TreeforgeError::io(skeleton_path, e))?;
    let name = skeleton_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| skeleton_path.display().to_string());
    let skeleton = Skeleton::parse(name, &source)?;
    let fragments = load_fragments(fragments_path)?;

    let mut context = config.render_context();
    if let Some(module_name) = module_name {
        context.module_name = module_name;
    }
    let rendered = Composer::new(context).compose(&skeleton, &fragments)?;

    match output {
        Some(path) => {
            fs::write(path, &rendered).map_err(|e| TreeforgeError::io(path, e))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

pub struct GenerateParams {
    pub fragments: PathBuf,
    pub output: Option<PathBuf>,
    pub template_set: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub module_name: Option<String>,
}

/// Render a template set into a bundle directory and/or the bundle cache.
pub async fn run_generate_command(params: GenerateParams, config: &TreeforgeConfig) -> Result<()> {
    let cache_dir = params.cache.or_else(|| config.cache_dir.clone());
    if params.output.is_none() && cache_dir.is_none() {
        return Err(TreeforgeError::Config(anyhow::anyhow!(
            "no output directory given and no cache directory configured"
        )));
    }

    let set = match (params.template_set, params.template_dir) {
        (Some(name), _) => TemplateSet::builtin(&name)?,
        (None, Some(dir)) => TemplateSet::load_dir(dir)?,
        (None, None) => match &config.template_dir {
            Some(dir) => TemplateSet::load_dir(dir)?,
            None => TemplateSet::builtin(config.template_set())?,
        },
    };

    let fragments = load_fragments(&params.fragments)?;
    let mut context = config.render_context();
    if let Some(module_name) = params.module_name {
        context.module_name = module_name;
    }
    let bundle = set.render(&fragments, &context)?;

    if let Some(dir) = &params.output {
        let info = bundle.write_to(dir)?;
        println!("{}  {}", info.hash, dir.display());
    }

    if let Some(cache_dir) = cache_dir {
        let cached = BundleCache::new(cache_dir).materialize(&bundle)?;
        let state = if cached.reused { "reused" } else { "created" };
        println!("{}  {} ({state})", cached.info.hash, cached.dir.display());
    }
    Ok(())
}
