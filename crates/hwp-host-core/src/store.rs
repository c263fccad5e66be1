use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::host::PropertyMap;

/// A named formatting definition, split into character and paragraph groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleDefinition {
    /// Defaults to the file name it was loaded from
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub character: PropertyMap,
    #[serde(default)]
    pub paragraph: PropertyMap,
}

impl StyleDefinition {
    pub fn is_empty(&self) -> bool {
        self.character.is_empty() && self.paragraph.is_empty()
    }
}

/// Style definitions addressed by name.
pub trait StyleStore: Send + Sync {
    /// Load a style; `Ok(None)` when no style has that name.
    fn load(&self, name: &str) -> Result<Option<StyleDefinition>, StoreError>;

    fn save(&self, style: &StyleDefinition) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Template documents addressed by name.
pub trait TemplateStore: Send + Sync {
    /// Where the template called `name` lives (whether or not it exists yet).
    fn template_path(&self, name: &str) -> Result<PathBuf, StoreError>;

    fn exists(&self, name: &str) -> bool;

    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Copy the template to a private working file and return its path.
    fn working_copy(&self, name: &str) -> Result<PathBuf, StoreError>;

    /// Remove a working copy made by `working_copy`.
    fn discard_working_copy(&self, path: &Path) -> Result<(), StoreError>;

    /// Path for a document generated from the template, stamped with `timestamp`.
    fn output_path(&self, name: &str, timestamp: &str) -> Result<PathBuf, StoreError>;
}
