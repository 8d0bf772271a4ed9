//! Archive containers: a zip file or an extracted folder.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use zip::ZipArchive;

use crate::core::LobSource;
use crate::error::{CodecError, Result};

/// File reader that tracks its own offset, so clones of one open file can
/// read different regions without disturbing each other.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    file: Arc<File>,
    pos: u64,
}

impl ArchiveFile {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(file),
            pos: 0,
        }
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8]) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(&*self.file, buf, self.pos)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8]) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(&*self.file, buf, self.pos)
    }
}

impl Read for ArchiveFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ArchiveFile {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match target {
            SeekFrom::Start(pos) => {
                self.pos = pos;
                return Ok(pos);
            }
            SeekFrom::Current(offset) => (self.pos, offset),
            SeekFrom::End(offset) => (self.file.metadata()?.len(), offset),
        };
        self.pos = base.checked_add_signed(offset).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        Ok(self.pos)
    }
}

/// A zip file whose central directory is parsed once. Clones share the
/// parsed directory and the open file.
#[derive(Clone)]
pub struct SharedZip {
    path: Arc<PathBuf>,
    zip: ZipArchive<ArchiveFile>,
}

impl SharedZip {
    pub fn open(path: &Path) -> Result<Self> {
        let zip = ZipArchive::new(ArchiveFile::new(File::open(path)?))?;
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            zip,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.zip.file_names()
    }

    /// Run `f` over a buffered reader of entry `name`. Several entries may be
    /// open at once.
    pub fn with_entry<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut dyn BufRead) -> Result<T>,
    ) -> Result<T> {
        let mut zip = self.zip.clone();
        let entry = zip.by_name(name)?;
        let mut reader = BufReader::new(entry);
        f(&mut reader)
    }
}

impl fmt::Debug for SharedZip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedZip")
            .field("path", &self.path)
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl PartialEq for SharedZip {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

/// A read-only set of named entries.
#[derive(Debug)]
pub enum Container {
    Zip {
        zip: SharedZip,
        names: HashSet<String>,
    },
    Folder(PathBuf),
}

impl Container {
    /// Open `path` as a folder when it is a directory, otherwise as a zip file.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            debug!("Opening archive folder {}", path.display());
            return Ok(Container::Folder(path.to_path_buf()));
        }
        let zip = SharedZip::open(path)?;
        let names = zip.file_names().map(str::to_string).collect();
        debug!("Opened zip archive {} ({} entries)", path.display(), zip.len());
        Ok(Container::Zip { zip, names })
    }

    pub fn path(&self) -> &Path {
        match self {
            Container::Zip { zip, .. } => zip.path(),
            Container::Folder(path) => path,
        }
    }

    pub fn has_entry(&self, name: &str) -> bool {
        match self {
            Container::Zip { names, .. } => names.contains(name),
            Container::Folder(root) => root.join(name).is_file(),
        }
    }

    /// Run `f` over a buffered reader of entry `name`.
    pub fn with_entry<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut dyn BufRead) -> Result<T>,
    ) -> Result<T> {
        match self {
            Container::Zip { zip, .. } => zip.with_entry(name, f),
            Container::Folder(root) => {
                let mut reader = BufReader::new(File::open(root.join(name))?);
                f(&mut reader)
            }
        }
    }

    /// Read a whole entry as UTF-8 text.
    pub fn read_to_string(&self, name: &str) -> Result<String> {
        self.with_entry(name, |reader| {
            let mut text = String::new();
            reader.read_to_string(&mut text)?;
            Ok(text)
        })
    }

    /// Lazily opened source for entry `name`.
    pub fn lob_source(&self, name: &str) -> Result<LobSource> {
        if !self.has_entry(name) {
            return Err(CodecError::lob(name, "entry not found in archive"));
        }
        Ok(match self {
            Container::Zip { zip, .. } => LobSource::ZipEntry {
                archive: zip.clone(),
                name: name.to_string(),
            },
            Container::Folder(root) => LobSource::File(root.join(name)),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Write `entries` into a folder tree under `root`.
    pub fn make_folder(root: &Path, entries: &[(&str, &[u8])]) {
        for (name, bytes) in entries {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        }
    }

    /// Write `entries` into a deflated zip file at `path`.
    pub fn make_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(std::fs::File::create(path).unwrap());
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{make_folder, make_zip};
    use super::*;
    use crate::core::LargeObject;

    const ENTRIES: &[(&str, &[u8])] = &[
        ("content/schema1/table1/table1.xml", b"<table/>"),
        ("lobs/seg1/record1.bin", &[0xde, 0xad]),
    ];

    #[test]
    fn test_folder_container() {
        let dir = tempfile::tempdir().unwrap();
        make_folder(dir.path(), ENTRIES);
        let container = Container::open(dir.path()).unwrap();

        assert!(matches!(container, Container::Folder(_)));
        assert!(container.has_entry("lobs/seg1/record1.bin"));
        assert!(!container.has_entry("lobs/seg1/missing.bin"));
        assert_eq!(
            container
                .read_to_string("content/schema1/table1/table1.xml")
                .unwrap(),
            "<table/>"
        );
    }

    #[test]
    fn test_zip_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.siard");
        make_zip(&path, ENTRIES);
        let container = Container::open(&path).unwrap();

        assert!(container.has_entry("content/schema1/table1/table1.xml"));
        assert!(!container.has_entry("content/schema1/table2/table2.xml"));

        let source = container.lob_source("lobs/seg1/record1.bin").unwrap();
        let mut bytes = Vec::new();
        LargeObject {
            source,
            metadata: Default::default(),
        }
        .open()
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
        assert_eq!(bytes, vec![0xde, 0xad]);
    }

    #[test]
    fn test_zip_entries_read_while_another_is_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.siard");
        make_zip(
            &path,
            &[
                ("content/schema1/table1/table1.xml", b"<table><row/></table>"),
                ("lobs/seg1/r1.txt", b"clob text"),
            ],
        );
        let container = Container::open(&path).unwrap();

        let (head, clob, tail) = container
            .with_entry("content/schema1/table1/table1.xml", |reader| {
                let mut head = [0u8; 7];
                reader.read_exact(&mut head)?;
                let clob = container.read_to_string("lobs/seg1/r1.txt")?;
                let mut tail = String::new();
                reader.read_to_string(&mut tail)?;
                Ok((head, clob, tail))
            })
            .unwrap();
        assert_eq!(&head, b"<table>");
        assert_eq!(clob, "clob text");
        assert_eq!(tail, "<row/></table>");
    }

    #[test]
    fn test_zip_lob_source_compares_by_archive_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.siard");
        make_zip(&path, ENTRIES);
        let container = Container::open(&path).unwrap();

        let first = container.lob_source("lobs/seg1/record1.bin").unwrap();
        let again = container.lob_source("lobs/seg1/record1.bin").unwrap();
        let other = container
            .lob_source("content/schema1/table1/table1.xml")
            .unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_missing_entry_is_error() {
        let dir = tempfile::tempdir().unwrap();
        make_folder(dir.path(), ENTRIES);
        let container = Container::open(dir.path()).unwrap();
        assert!(container.read_to_string("nope.xml").is_err());
        assert!(container.lob_source("nope.bin").is_err());
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "not a zip").unwrap();
        assert!(matches!(
            Container::open(&path),
            Err(CodecError::Zip(_))
        ));
    }
}
