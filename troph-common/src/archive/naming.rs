//! Archive file naming and directory index
//!
//! `prefilter.<cam_id>_<begin>_<end>.zip` holds one entry
//! `prefilter.<cam_id>_<begin>_<end>.msgpack`. Timestamps use
//! `YYYY-MM-DD HH:MM:SS`; a trailing `+...` zone suffix is ignored when parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::types::Window;
use crate::{Error, Result};

pub const ARCHIVE_PREFIX: &str = "prefilter.";
pub const ARCHIVE_EXTENSION: &str = "zip";
pub const PAYLOAD_EXTENSION: &str = "msgpack";
/// Appended to the archive path for the frames-without-candidates record
pub const FAILED_RECORD_SUFFIX: &str = ".failed.msgpack";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Window identity as encoded in an archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub cam_id: u16,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ArchiveName {
    pub fn for_window(window: &Window) -> Self {
        Self {
            cam_id: window.cam_id,
            begin: window.start,
            end: window.end,
        }
    }

    /// Name without extension, shared by the archive and its entry
    pub fn stem(&self) -> String {
        format!(
            "{}{}_{}_{}",
            ARCHIVE_PREFIX,
            self.cam_id,
            self.begin.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT)
        )
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), ARCHIVE_EXTENSION)
    }

    pub fn entry_name(&self) -> String {
        format!("{}.{}", self.stem(), PAYLOAD_EXTENSION)
    }

    /// Parse an archive file name (no directory part)
    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("Not an archive name: {}", file_name));

        let infos = file_name
            .strip_prefix(ARCHIVE_PREFIX)
            .and_then(|rest| rest.strip_suffix(&format!(".{}", ARCHIVE_EXTENSION)))
            .ok_or_else(invalid)?;

        let parts: Vec<&str> = infos.split('_').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let cam_id = parts[0].parse::<u16>().map_err(|_| invalid())?;
        let begin = parse_timestamp(parts[1]).ok_or_else(invalid)?;
        let end = parse_timestamp(parts[2]).ok_or_else(invalid)?;

        Ok(Self { cam_id, begin, end })
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.split('+').next().unwrap_or(text);
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Archive path for `window` inside `dir`
pub fn archive_path(dir: &Path, window: &Window) -> PathBuf {
    dir.join(ArchiveName::for_window(window).file_name())
}

/// Side file next to an archive listing frames that produced no candidates
pub fn failed_record_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path.as_os_str().to_os_string();
    name.push(FAILED_RECORD_SUFFIX);
    PathBuf::from(name)
}

/// Row of the archive directory index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndexEntry {
    pub cam_id: u16,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub filename: PathBuf,
}

/// Index of the archives directly inside `base_dir`, sorted by filename
///
/// Files that look like archives but whose name does not parse are logged
/// and left out.
pub fn list_available(base_dir: &Path) -> Result<Vec<ArchiveIndexEntry>> {
    if !base_dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Not a directory: {}",
            base_dir.display()
        )));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(base_dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.starts_with(ARCHIVE_PREFIX)
            || !file_name.ends_with(&format!(".{}", ARCHIVE_EXTENSION))
        {
            continue;
        }

        match ArchiveName::parse(&file_name) {
            Ok(name) => entries.push(ArchiveIndexEntry {
                cam_id: name.cam_id,
                begin: name.begin,
                end: name.end,
                filename: entry.path().to_path_buf(),
            }),
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(entries)
}
