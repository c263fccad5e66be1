//! Conversion between document text and named placeholder fields.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use hwp_host_core::{DialogMode, DocumentHost, FieldSpec, HostError, MoveUnit};
use tracing::{debug, info, warn};

use crate::error::{EngineError, HostContext, Result};

/// Keeps host dialogs suppressed while alive and restores the previous mode on drop.
pub struct DialogGuard<'a, H: DocumentHost> {
    host: &'a mut H,
    previous: DialogMode,
}

impl<'a, H: DocumentHost> DialogGuard<'a, H> {
    pub fn suppress(host: &'a mut H) -> Result<Self> {
        let previous = host
            .set_dialog_mode(DialogMode::Suppressed)
            .context("suppressing dialogs")?;
        Ok(Self { host, previous })
    }
}

impl<H: DocumentHost> Deref for DialogGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: DocumentHost> DerefMut for DialogGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: DocumentHost> Drop for DialogGuard<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.host.set_dialog_mode(self.previous) {
            warn!("Failed to restore dialog mode {:?}: {}", self.previous, e);
        }
    }
}

/// Help text stored with a field created from document text.
pub fn field_help(field_name: &str) -> String {
    format!("{} 필드입니다", field_name)
}

/// Turn the first occurrence of `search_text` into a field named `field_name`.
///
/// Returns `Ok(false)` when the text is not in the document; the document is
/// unchanged in that case. A field name that already exists is rejected.
pub fn convert_text_to_field<H: DocumentHost>(
    host: &mut H,
    search_text: &str,
    field_name: &str,
) -> Result<bool> {
    if search_text.is_empty() || field_name.trim().is_empty() {
        return Err(EngineError::MalformedInput(
            "field conversion needs both text and a name".to_string(),
        ));
    }
    if host
        .field_names()
        .context("listing fields")?
        .iter()
        .any(|name| name == field_name)
    {
        return Err(EngineError::DuplicateField(field_name.to_string()));
    }

    let mut host = DialogGuard::suppress(host)?;
    host.cancel_selection();
    host.move_by(MoveUnit::DocStart).context("moving to document start")?;
    if !host.find_forward(search_text).context("searching")? {
        debug!("Text {:?} not found; no field created", search_text);
        return Ok(false);
    }
    host.create_field(&FieldSpec {
        name: field_name.to_string(),
        guide: search_text.to_string(),
        help: field_help(field_name),
    })
    .context("creating field")?;
    host.cancel_selection();
    info!(field = field_name, "Converted text to field");
    Ok(true)
}

/// Write each value into the field of the same name. Returns how many were written.
///
/// Failures are logged per field and do not stop the remaining fields.
pub fn populate_fields<H: DocumentHost>(
    host: &mut H,
    values: &BTreeMap<String, String>,
) -> usize {
    let mut written = 0;
    for (name, value) in values {
        match host.put_field_text(name, value) {
            Ok(()) => written += 1,
            Err(HostError::FieldNotFound(_)) => warn!(field = %name, "Field not in document"),
            Err(e) => warn!(field = %name, "Failed to fill field: {}", e),
        }
    }
    info!(written, requested = values.len(), "Populated fields");
    written
}

pub fn list_field_names<H: DocumentHost>(host: &mut H) -> Result<Vec<String>> {
    host.field_names().context("listing fields")
}

/// Current text of every field, by name.
pub fn field_values<H: DocumentHost>(host: &mut H) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for name in list_field_names(host)? {
        let text = host.field_text(&name).context("reading field")?;
        values.insert(name, text.trim().to_string());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwp_host_core::OpenMode;
    use hwp_host_local::MemoryHost;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn host_with(text: &str) -> (MemoryHost, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        fs::write(&path, text).unwrap();
        let mut host = MemoryHost::new();
        host.open(&path, OpenMode::Visible).unwrap();
        (host, temp_dir)
    }

    #[test]
    fn test_convert_and_restore_dialogs() {
        let (mut host, _temp_dir) = host_with("신청인: 홍길동\n연락처: 010-1234-5678");
        assert!(convert_text_to_field(&mut host, "홍길동", "applicant").unwrap());
        assert_eq!(list_field_names(&mut host).unwrap(), vec!["applicant".to_string()]);
        assert_eq!(host.dialog_mode(), DialogMode::Interactive);
    }

    #[test]
    fn test_missing_text_leaves_document_unchanged() {
        let (mut host, _temp_dir) = host_with("본문");
        let before = host.document().cloned();
        assert!(!convert_text_to_field(&mut host, "없는 글", "x").unwrap());
        assert_eq!(host.document().cloned(), before);
        assert!(list_field_names(&mut host).unwrap().is_empty());
        assert_eq!(host.dialog_mode(), DialogMode::Interactive);
    }

    #[test]
    fn test_search_starts_at_document_start() {
        let (mut host, _temp_dir) = host_with("가나다\n가나다");
        host.move_by(MoveUnit::DocEnd).unwrap();
        assert!(convert_text_to_field(&mut host, "가나다", "first").unwrap());
        assert_eq!(host.full_text().unwrap(), "\n가나다");
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let (mut host, _temp_dir) = host_with("하나 둘");
        assert!(convert_text_to_field(&mut host, "하나", "n").unwrap());
        assert!(matches!(
            convert_text_to_field(&mut host, "둘", "n"),
            Err(EngineError::DuplicateField(_))
        ));
        assert_eq!(host.full_text().unwrap(), " 둘");
    }

    #[test]
    fn test_populate_counts_partial_success() {
        let (mut host, _temp_dir) = host_with("이름: 홍길동");
        convert_text_to_field(&mut host, "홍길동", "name").unwrap();
        let values = BTreeMap::from([
            ("name".to_string(), "김철수".to_string()),
            ("missing".to_string(), "x".to_string()),
        ]);
        assert_eq!(populate_fields(&mut host, &values), 1);
        assert_eq!(field_values(&mut host).unwrap()["name"], "김철수");
    }
}
