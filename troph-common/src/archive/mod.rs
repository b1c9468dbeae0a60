//! Result archives
//!
//! One zip archive per camera-day window, holding the window's candidate
//! rows. An archive's existence marks its window as done; it is written once
//! and never modified.

pub mod codec;
pub mod loader;
pub mod naming;
pub mod source;

pub use codec::{write_archive, write_failed_record};
pub use loader::{load, load_many, read_candidates, LoadOptions};
pub use naming::{archive_path, failed_record_path, list_available, ArchiveIndexEntry, ArchiveName};
pub use source::ArchiveSource;
