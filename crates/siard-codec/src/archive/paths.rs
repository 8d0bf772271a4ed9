//! Entry names inside an archive container.

use std::path::PathBuf;

use crate::core::TableDescriptor;
use crate::error::{CodecError, Result};

const AUXILIARY_MARKER: &str = "../";

/// Table content: `content/<schemaFolder>/<tableFolder>/<tableFolder>.xml`.
pub fn table_content_path(table: &TableDescriptor) -> Result<String> {
    table_entry(table, "xml")
}

/// Companion schema, next to the content with an `.xsd` extension.
pub fn table_schema_path(table: &TableDescriptor) -> Result<String> {
    table_entry(table, "xsd")
}

fn table_entry(table: &TableDescriptor, extension: &str) -> Result<String> {
    let (Some(schema_folder), Some(folder)) = (&table.schema_folder, &table.folder) else {
        return Err(CodecError::structure(
            &table.id,
            "table has no folder inside the archive",
        ));
    };
    Ok(format!(
        "content/{}/{}/{}.{}",
        schema_folder, folder, folder, extension
    ))
}

/// Where a large object should be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobLocation {
    /// Entry of the archive's own container.
    Container(String),
    /// Entry of the auxiliary container, parent marker stripped.
    Auxiliary(String),
    /// Path on the local filesystem.
    Absolute(PathBuf),
}

impl LobLocation {
    /// An entry name that climbs out of its container with `..`.
    pub fn escapes_container(&self) -> bool {
        match self {
            LobLocation::Container(name) | LobLocation::Auxiliary(name) => {
                has_parent_segment(name)
            }
            LobLocation::Absolute(_) => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            LobLocation::Container(name) => name.clone(),
            LobLocation::Auxiliary(name) => format!("{}{}", AUXILIARY_MARKER, name),
            LobLocation::Absolute(path) => path.display().to_string(),
        }
    }
}

/// Join path segments with `/`, dropping empty and `.` segments.
pub fn join_segments<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `name` contains a `..` segment.
pub fn has_parent_segment(name: &str) -> bool {
    name.split('/').any(|s| s == "..")
}

/// Compose the location of a large object from the lobs root, the column's
/// own folder and the declared `file` attribute.
pub fn lob_location(lobs_root: &str, column_folder: Option<&str>, file: &str) -> LobLocation {
    if file.starts_with('/') {
        return LobLocation::Absolute(PathBuf::from(file));
    }
    if let Some(stripped) = file.strip_prefix(AUXILIARY_MARKER) {
        return LobLocation::Auxiliary(join_segments([stripped]));
    }

    let folder = column_folder.unwrap_or("");
    if folder.starts_with('/') {
        return LobLocation::Absolute(PathBuf::from(folder).join(file));
    }

    let prefix = join_segments([lobs_root, folder]);
    let composed = if !prefix.is_empty() && file.starts_with(&format!("{}/", prefix)) {
        file.to_string()
    } else {
        join_segments([prefix.as_str(), file])
    };

    // A lobs root such as `../lobs` points out of the archive.
    match composed.strip_prefix(AUXILIARY_MARKER) {
        Some(rest) => LobLocation::Auxiliary(rest.to_string()),
        None => LobLocation::Container(composed),
    }
}

/// Second-chance location: `<lobsRoot>/<column id with '.' as '/'>/<file name>`.
pub fn fallback_lob_path(lobs_root: &str, column_id: &str, file: &str) -> String {
    let bare = file.rsplit('/').next().unwrap_or(file);
    let column_dir = column_id.replace('.', "/");
    join_segments([lobs_root, column_dir.as_str(), bare])
}
