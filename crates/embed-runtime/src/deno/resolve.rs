//! CommonJS module resolution for `require`.
//!
//! Relative and absolute specifiers are resolved against the requiring
//! module's directory; bare specifiers are looked up in `node_modules` of each
//! ancestor directory.

use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    #[error("Failed to read module '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Script,
    Json,
}

/// A resolved module with its source, handed to the JS loader.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedModule {
    pub filename: String,
    pub dirname: String,
    pub kind: ModuleKind,
    pub source: String,
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

fn as_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    ["js", "json"].iter().find_map(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

fn package_main(dir: &Path) -> Option<String> {
    let manifest = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    manifest
        .get("main")
        .and_then(|main| main.as_str())
        .map(str::to_string)
}

fn as_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    if let Some(main) = package_main(dir) {
        let main = dir.join(main);
        if let Some(found) = as_file(&main).or_else(|| as_index(&main)) {
            return Some(found);
        }
    }
    as_index(dir)
}

fn as_index(dir: &Path) -> Option<PathBuf> {
    ["index.js", "index.json"]
        .iter()
        .map(|index| dir.join(index))
        .find(|candidate| candidate.is_file())
}

fn as_file_or_directory(path: &Path) -> Option<PathBuf> {
    as_file(path).or_else(|| as_directory(path))
}

/// Resolve `specifier` as required from a module living in `parent_dir`.
pub fn resolve(specifier: &str, parent_dir: &Path) -> Result<PathBuf, ResolveError> {
    let found = if is_path_specifier(specifier) {
        as_file_or_directory(&parent_dir.join(specifier))
    } else {
        parent_dir
            .ancestors()
            .map(|dir| dir.join("node_modules").join(specifier))
            .find_map(|candidate| as_file_or_directory(&candidate))
    };

    let found = found.ok_or_else(|| ResolveError::NotFound(specifier.to_string()))?;
    Ok(std::fs::canonicalize(&found).unwrap_or(found))
}

/// Resolve and read a module.
pub fn load(specifier: &str, parent_dir: &Path) -> Result<ResolvedModule, ResolveError> {
    let path = resolve(specifier, parent_dir)?;
    let source = std::fs::read_to_string(&path).map_err(|source| ResolveError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let kind = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => ModuleKind::Json,
        _ => ModuleKind::Script,
    };
    let dirname = path
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ResolvedModule {
        filename: path.to_string_lossy().into_owned(),
        dirname,
        kind,
        source,
    })
}
