use std::fs;
use std::path::{Path, PathBuf};

use hwp_host_core::{StoreError, StyleDefinition, StyleStore};
use tracing::{debug, info, instrument};

use crate::checked_name;

/// Style definitions stored as `<name>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct LocalStyleStore {
    dir: PathBuf,
}

impl LocalStyleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn style_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.json", checked_name(name)?)))
    }
}

impl StyleStore for LocalStyleStore {
    #[instrument(skip(self), level = "debug")]
    fn load(&self, name: &str) -> Result<Option<StyleDefinition>, StoreError> {
        let path = self.style_path(name)?;
        if !path.exists() {
            debug!("Style {} not found at {}", name, path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let mut style: StyleDefinition =
            serde_json::from_str(&raw).map_err(|source| StoreError::Json { path, source })?;
        if style.name.is_empty() {
            style.name = name.to_string();
        }
        Ok(Some(style))
    }

    #[instrument(skip(self, style), level = "debug", fields(style = %style.name))]
    fn save(&self, style: &StyleDefinition) -> Result<(), StoreError> {
        let path = self.style_path(&style.name)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let body = serde_json::to_string_pretty(style).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Saved style {} to {}", style.name, path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        list_stems(&self.dir, "json")
    }
}

/// File stems with the given extension, sorted. A missing directory lists as empty.
pub(crate) fn list_stems(dir: &Path, extension: &str) -> Result<Vec<String>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let read_dir = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names: Vec<String> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().to_string()))
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    Ok(names)
}
