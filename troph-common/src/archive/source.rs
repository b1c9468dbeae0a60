//! Archive source resolution
//!
//! Every way of naming a payload (raw `.msgpack` file, entry of a `.zip`
//! archive, already-open stream) is normalized to bytes here, before any
//! deserialization runs.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::archive::codec::entry_name_for;
use crate::archive::naming::{ARCHIVE_EXTENSION, PAYLOAD_EXTENSION};
use crate::{Error, Result};

/// Where a row payload comes from
pub enum ArchiveSource {
    /// Raw payload file
    FilePath(PathBuf),
    /// Named entry inside a zip archive
    ArchiveEntry { archive: PathBuf, entry: String },
    /// Stream positioned at the start of a payload
    OpenStream {
        label: String,
        reader: Box<dyn Read + Send>,
    },
}

impl ArchiveSource {
    /// Classify a path by extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if extension == ARCHIVE_EXTENSION {
            Ok(ArchiveSource::ArchiveEntry {
                archive: path.to_path_buf(),
                entry: entry_name_for(path)?,
            })
        } else if extension == PAYLOAD_EXTENSION {
            Ok(ArchiveSource::FilePath(path.to_path_buf()))
        } else {
            Err(Error::InvalidInput(format!(
                "Unsupported archive source: {}",
                path.display()
            )))
        }
    }

    /// Wrap an already-open stream
    pub fn from_reader(label: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        ArchiveSource::OpenStream {
            label: label.into(),
            reader: Box::new(reader),
        }
    }

    /// Read the full payload
    pub fn read_payload(self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match self {
            ArchiveSource::FilePath(path) => {
                BufReader::new(File::open(&path)?).read_to_end(&mut bytes)?;
            }
            ArchiveSource::ArchiveEntry { archive, entry } => {
                let mut zip = ZipArchive::new(BufReader::new(File::open(&archive)?))?;
                let mut file = zip.by_name(&entry)?;
                file.read_to_end(&mut bytes)?;
            }
            ArchiveSource::OpenStream { mut reader, .. } => {
                reader.read_to_end(&mut bytes)?;
            }
        }
        Ok(bytes)
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveSource::FilePath(path) => write!(f, "{}", path.display()),
            ArchiveSource::ArchiveEntry { archive, entry } => {
                write!(f, "{}!{}", archive.display(), entry)
            }
            ArchiveSource::OpenStream { label, .. } => write!(f, "<stream {}>", label),
        }
    }
}

impl fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveSource({})", self)
    }
}
