//! Large-object resolution.
//!
//! A column (or array element) carrying a `file` attribute stores its value
//! outside the content document. The attribute is resolved against the
//! archive container, the auxiliary container or the filesystem; when the
//! composed path is missing, one fallback location derived from the column
//! id is tried. Binary columns become lazily opened stream handles, anything
//! else is read to text right away.

use std::path::PathBuf;

use tracing::debug;

use super::container::Container;
use super::paths::{fallback_lob_path, has_parent_segment, lob_location, LobLocation};
use crate::config::ArchiveProfile;
use crate::core::{CellValue, ColumnDescriptor, LargeObject, LobMetadata, LobSource, Type};
use crate::error::{CodecError, Result};

/// The `file` attribute of an element plus its optional metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobReference {
    pub file: String,
    pub length: Option<u64>,
    pub digest: Option<String>,
    pub digest_type: Option<String>,
}

impl LobReference {
    /// Read a reference out of element attributes; `None` without `file`.
    ///
    /// Metadata attributes are only honoured when `profile` defines them.
    pub fn from_attributes(attributes: &[(String, String)], profile: ArchiveProfile) -> Option<Self> {
        let get = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        let file = get("file")?;
        let metadata = profile.reads_lob_metadata();
        Some(Self {
            file,
            length: get("length")
                .filter(|_| metadata)
                .and_then(|v| v.trim().parse().ok()),
            digest: get("digest").filter(|_| metadata),
            digest_type: get("digestType").filter(|_| metadata),
        })
    }

    fn metadata(&self, path: String) -> LobMetadata {
        LobMetadata {
            length: self.length,
            digest: self.digest.clone(),
            digest_type: self.digest_type.clone(),
            path: Some(path),
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLob {
    pub value: CellValue,
    /// Location the value was found at.
    pub path: String,
    /// Location composed from the reference, where the value was expected.
    pub expected: String,
    /// Found only at the fallback location.
    pub via_fallback: bool,
}

enum Found<'c> {
    Entry(&'c Container, String),
    File(PathBuf),
}

/// Resolves `file` references for one archive.
pub struct LobResolver<'a> {
    container: &'a Container,
    auxiliary: Option<&'a Container>,
    lobs_root: String,
    profile: ArchiveProfile,
    ignore_lobs: bool,
}

impl<'a> LobResolver<'a> {
    pub fn new(container: &'a Container, lobs_root: impl Into<String>) -> Self {
        Self {
            container,
            auxiliary: None,
            lobs_root: lobs_root.into(),
            profile: ArchiveProfile::default(),
            ignore_lobs: false,
        }
    }

    pub fn with_auxiliary(mut self, auxiliary: Option<&'a Container>) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    pub fn with_profile(mut self, profile: ArchiveProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Keep metadata only for binary references; containers are never
    /// probed for them. Character references are still read to text.
    pub fn ignore_lobs(mut self, ignore: bool) -> Self {
        self.ignore_lobs = ignore;
        self
    }

    pub fn profile(&self) -> ArchiveProfile {
        self.profile
    }

    /// Resolve `reference` for a cell of `column` whose value has type `ty`
    /// (the element type for array elements).
    pub fn resolve(
        &self,
        column: &ColumnDescriptor,
        ty: &Type,
        reference: &LobReference,
        cell_id: &str,
    ) -> Result<ResolvedLob> {
        if self.ignore_lobs && ty.is_binary() {
            return Ok(ResolvedLob {
                value: CellValue::LargeObject(LargeObject::detached(
                    reference.metadata(reference.file.clone()),
                )),
                path: reference.file.clone(),
                expected: reference.file.clone(),
                via_fallback: false,
            });
        }

        let location = lob_location(
            &self.lobs_root,
            column.lob_folder.as_deref(),
            &reference.file,
        );
        if location.escapes_container() {
            return Err(CodecError::lob(
                cell_id,
                format!("{} points outside its container", location.display()),
            ));
        }
        let mut via_fallback = false;
        let found = match self.locate(&location, cell_id)? {
            Some(found) => found,
            None if self.profile.uses_lob_fallback() => {
                let fallback = fallback_lob_path(&self.lobs_root, &column.id, &reference.file);
                debug!(
                    "{}: {} not found, trying {}",
                    cell_id,
                    location.display(),
                    fallback
                );
                if has_parent_segment(&fallback) || !self.container.has_entry(&fallback) {
                    return Err(CodecError::lob(
                        cell_id,
                        format!("not found at {} or {}", location.display(), fallback),
                    ));
                }
                via_fallback = true;
                Found::Entry(self.container, fallback)
            }
            None => {
                return Err(CodecError::lob(
                    cell_id,
                    format!("not found at {}", location.display()),
                ))
            }
        };

        let path = match &found {
            Found::Entry(_, name) => name.clone(),
            Found::File(path) => path.display().to_string(),
        };

        let value = if ty.is_binary() {
            let source = match found {
                Found::Entry(container, name) => container.lob_source(&name)?,
                Found::File(path) => LobSource::File(path),
            };
            CellValue::LargeObject(LargeObject {
                source,
                metadata: reference.metadata(path.clone()),
            })
        } else {
            let text = match found {
                Found::Entry(container, name) => container.read_to_string(&name)?,
                Found::File(path) => std::fs::read_to_string(path)?,
            };
            CellValue::Scalar(text)
        };

        Ok(ResolvedLob {
            value,
            path,
            expected: location.display(),
            via_fallback,
        })
    }

    fn locate(&self, location: &LobLocation, cell_id: &str) -> Result<Option<Found<'a>>> {
        Ok(match location {
            LobLocation::Container(name) => self
                .container
                .has_entry(name)
                .then(|| Found::Entry(self.container, name.clone())),
            LobLocation::Auxiliary(name) => {
                let auxiliary = self.auxiliary.ok_or_else(|| {
                    CodecError::lob(
                        cell_id,
                        format!("{} refers outside the archive but no auxiliary container is configured", location.display()),
                    )
                })?;
                auxiliary
                    .has_entry(name)
                    .then(|| Found::Entry(auxiliary, name.clone()))
            }
            LobLocation::Absolute(path) => path.is_file().then(|| Found::File(path.clone())),
        })
    }
}
