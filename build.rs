use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=templates/");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("bundled_templates.rs");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let templates_dir = Path::new(&manifest_dir).join("templates");

    let mut set_dirs = Vec::new();
    if templates_dir.exists() {
        collect_set_dirs(&templates_dir, &mut set_dirs);
    }
    // Sort for consistent ordering
    set_dirs.sort();

    let mut generated = String::new();
    generated.push_str("pub const BUNDLED_TEMPLATE_SETS: &[BundledTemplateSet] = &[\n");

    for set_dir in &set_dirs {
        let mut files: Vec<(String, String)> = fs::read_dir(set_dir)
            .unwrap()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if !path.is_file() {
                    return None;
                }
                let file_name = path.file_name()?.to_str()?.to_string();
                if file_name == "template_set.toml" {
                    return None;
                }
                // Use absolute path for include_str!
                let absolute_path = path.canonicalize().ok()?;
                Some((file_name, absolute_path.to_str()?.replace('\\', "/")))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let manifest_path = set_dir
            .join("template_set.toml")
            .canonicalize()
            .unwrap()
            .to_str()
            .unwrap()
            .replace('\\', "/");

        generated.push_str("    BundledTemplateSet {\n");
        generated.push_str(&format!(
            "        manifest: include_str!(\"{}\"),\n",
            manifest_path
        ));
        generated.push_str("        files: &[\n");
        for (name, path) in &files {
            generated.push_str(&format!(
                "            BundledFile {{ name: \"{}\", contents: include_str!(\"{}\") }},\n",
                name, path
            ));
        }
        generated.push_str("        ],\n");
        generated.push_str("    },\n");
    }

    generated.push_str("];\n");

    fs::write(&dest_path, generated).unwrap();
}

/// Every directory holding a `template_set.toml` is one bundled template set.
fn collect_set_dirs(dir: &Path, out: &mut Vec<PathBuf>) {
    if dir.join("template_set.toml").is_file() {
        out.push(dir.to_path_buf());
    }
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_set_dirs(&path, out);
            }
        }
    }
}
