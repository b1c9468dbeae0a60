//! Row payload encoding and archive writing
//!
//! Rows are a MessagePack array of `[frame_id, bee_id0, bee_id1]` arrays,
//! stored deflated as the single entry of a zip container.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::naming::PAYLOAD_EXTENSION;
use crate::types::{FrameTask, InteractionCandidate};
use crate::{Error, Result};

/// Serialize the row sequence
pub fn encode_rows(rows: &[InteractionCandidate]) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(rows)?)
}

/// Deserialize a row sequence
pub fn decode_rows(bytes: &[u8]) -> Result<Vec<InteractionCandidate>> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Entry name inside the archive at `archive_path`: its file name with the
/// payload extension in place of `.zip`, zone suffix and all
pub fn entry_name_for(archive_path: &Path) -> Result<String> {
    let file_name = archive_path.file_name().ok_or_else(|| {
        Error::InvalidInput(format!("No file name in {}", archive_path.display()))
    })?;
    Ok(Path::new(file_name)
        .with_extension(PAYLOAD_EXTENSION)
        .to_string_lossy()
        .into_owned())
}

/// Write `rows` as a deflated single-entry zip at `archive_path`
pub fn write_archive(archive_path: &Path, rows: &[InteractionCandidate]) -> Result<()> {
    let entry_name = entry_name_for(archive_path)?;
    let payload = encode_rows(rows)?;

    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    zip.write_all(&payload)?;
    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

/// Write the frames-without-candidates debug record
pub fn write_failed_record(path: &Path, tasks: &[FrameTask]) -> Result<()> {
    let payload = rmp_serde::to_vec(tasks)?;
    std::fs::write(path, payload)?;
    Ok(())
}

/// Read a frames-without-candidates record, for inspection tooling
pub fn read_failed_record(path: &Path) -> Result<Vec<FrameTask>> {
    let bytes = std::fs::read(path)?;
    Ok(rmp_serde::from_slice(&bytes)?)
}
