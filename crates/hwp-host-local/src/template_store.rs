use std::fs;
use std::path::{Path, PathBuf};

use hwp_host_core::{StoreError, TemplateStore};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::checked_name;
use crate::style_store::list_stems;

/// Default extension of template documents: the format `MemoryHost` persists.
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "json";

/// Template documents stored as `<name>.<ext>` files in one directory.
///
/// Working copies go to a separate scratch directory so a template is never
/// opened in place; generated documents land in the output directory.
#[derive(Debug, Clone)]
pub struct LocalTemplateStore {
    templates_dir: PathBuf,
    output_dir: PathBuf,
    work_dir: PathBuf,
    extension: String,
}

impl LocalTemplateStore {
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            output_dir: output_dir.into(),
            work_dir: work_dir.into(),
            extension: DEFAULT_TEMPLATE_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })
    }
}

impl TemplateStore for LocalTemplateStore {
    fn template_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let name = checked_name(name)?;
        Self::ensure_dir(&self.templates_dir)?;
        Ok(self.templates_dir.join(format!("{}.{}", name, self.extension)))
    }

    fn exists(&self, name: &str) -> bool {
        checked_name(name)
            .map(|name| {
                self.templates_dir
                    .join(format!("{}.{}", name, self.extension))
                    .is_file()
            })
            .unwrap_or(false)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        list_stems(&self.templates_dir, &self.extension)
    }

    #[instrument(skip(self), level = "debug")]
    fn working_copy(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !self.exists(name) {
            return Err(StoreError::NotFound(format!("template {}", name)));
        }
        let source = self.template_path(name)?;
        Self::ensure_dir(&self.work_dir)?;
        let copy = self
            .work_dir
            .join(format!("{}_{}.{}", name, Uuid::new_v4().simple(), self.extension));
        fs::copy(&source, &copy).map_err(|source_err| StoreError::Io {
            path: copy.clone(),
            source: source_err,
        })?;
        debug!("Copied template {} to {}", source.display(), copy.display());
        Ok(copy)
    }

    fn discard_working_copy(&self, path: &Path) -> Result<(), StoreError> {
        if !path.starts_with(&self.work_dir) {
            warn!("Refusing to remove {}: not a working copy", path.display());
            return Err(StoreError::InvalidName(path.display().to_string()));
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn output_path(&self, name: &str, timestamp: &str) -> Result<PathBuf, StoreError> {
        let name = checked_name(name)?;
        Self::ensure_dir(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("{}_{}.{}", name, timestamp, self.extension));
        info!("Output for template {} goes to {}", name, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> LocalTemplateStore {
        LocalTemplateStore::new(
            temp_dir.path().join("templates"),
            temp_dir.path().join("output"),
            temp_dir.path().join("work"),
        )
    }

    #[test]
    fn test_list_only_templates_with_extension() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        assert!(store.list().unwrap().is_empty());

        let dir = temp_dir.path().join("templates");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("계약서.json"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();
        fs::write(dir.join("a.json"), "{}").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "계약서".to_string()]);
        assert!(store.exists("a"));
        assert!(!store.exists("notes"));
    }

    #[test]
    fn test_working_copy_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::write(store.template_path("t").unwrap(), "{\"paragraphs\":[]}").unwrap();

        let copy = store.working_copy("t").unwrap();
        assert!(copy.starts_with(temp_dir.path().join("work")));
        assert_eq!(fs::read_to_string(&copy).unwrap(), "{\"paragraphs\":[]}");

        store.discard_working_copy(&copy).unwrap();
        assert!(!copy.exists());
        // discarding twice is harmless
        store.discard_working_copy(&copy).unwrap();
    }

    #[test]
    fn test_working_copy_of_missing_template() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            store(&temp_dir).working_copy("nope"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_discard_outside_work_dir_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let outside = temp_dir.path().join("keep.json");
        fs::write(&outside, "{}").unwrap();
        assert!(store(&temp_dir).discard_working_copy(&outside).is_err());
        assert!(outside.exists());
    }

    #[test]
    fn test_output_path_is_stamped() {
        let temp_dir = TempDir::new().unwrap();
        let path = store(&temp_dir)
            .with_extension(".txt")
            .output_path("report", "20240301_120000")
            .unwrap();
        assert_eq!(path, temp_dir.path().join("output").join("report_20240301_120000.txt"));
        assert!(temp_dir.path().join("output").is_dir());
    }
}
