//! Archive loading for analysis consumers
//!
//! Reconstitutes candidate rows from one or many archives and inner-joins
//! them with frame metadata from the tracking database.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::archive::codec::decode_rows;
use crate::archive::source::ArchiveSource;
use crate::tracking::FrameMetadataSource;
use crate::types::{epoch_to_datetime, InteractionCandidate, MergedRow};
use crate::{Error, Result};

/// Default concurrent reads for [`load_many`]
pub const DEFAULT_LOAD_WORKERS: usize = 4;

/// Loader behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Fail when metadata lacks some archived frame ids instead of
    /// dropping their rows with a warning
    pub warnings_as_errors: bool,
}

/// Read and decode the rows of one source.
///
/// Unreadable or undecodable payloads are logged and yield `None`, as does a
/// payload holding zero rows.
pub fn read_candidates(source: ArchiveSource) -> Option<Vec<InteractionCandidate>> {
    let label = source.to_string();
    let bytes = match source.read_payload() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Error reading {}: {}", label, e);
            return None;
        }
    };

    match decode_rows(&bytes) {
        Ok(rows) if rows.is_empty() => {
            debug!("{} holds no rows", label);
            None
        }
        Ok(rows) => Some(rows),
        Err(e) => {
            warn!("Error decoding {}: {}", label, e);
            None
        }
    }
}

/// Load one source and join it with frame metadata.
///
/// Returns `Ok(None)` when the source cannot be read or holds no rows.
/// Metadata lookup failures propagate. Rows whose frame id has no metadata
/// are dropped (inner join) unless `warnings_as_errors` is set.
pub async fn load<M>(
    source: ArchiveSource,
    metadata: &M,
    options: LoadOptions,
) -> Result<Option<Vec<MergedRow>>>
where
    M: FrameMetadataSource + ?Sized,
{
    let rows = match tokio::task::spawn_blocking(move || read_candidates(source)).await? {
        Some(rows) => rows,
        None => return Ok(None),
    };

    let frame_ids: BTreeSet<u64> = rows.iter().map(|r| r.frame_id).collect();
    let frames = metadata.metadata_for(&frame_ids).await?;
    let timestamps: HashMap<u64, f64> = frames.iter().map(|m| (m.frame_id, m.timestamp)).collect();

    let missing = frame_ids
        .iter()
        .filter(|id| !timestamps.contains_key(id))
        .count();
    if missing > 0 {
        let message = format!(
            "{} of {} frame ids have no metadata",
            missing,
            frame_ids.len()
        );
        if options.warnings_as_errors {
            return Err(Error::MetadataMismatch(message));
        }
        warn!("{}; dropping their rows", message);
    }

    let mut merged = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(&timestamp) = timestamps.get(&row.frame_id) else {
            continue;
        };
        let datetime = epoch_to_datetime(timestamp).ok_or_else(|| {
            Error::MetadataMismatch(format!(
                "frame {} has invalid timestamp {}",
                row.frame_id, timestamp
            ))
        })?;
        merged.push(MergedRow {
            frame_id: row.frame_id,
            bee_id0: row.bee_id0,
            bee_id1: row.bee_id1,
            timestamp,
            datetime,
        });
    }
    Ok(Some(merged))
}

/// Load many sources with at most `workers` reads in flight.
///
/// Sources yielding `None` are skipped; the rest are concatenated in
/// completion order. Every source runs to completion before the first
/// metadata error, if any, is returned.
pub async fn load_many<M>(
    sources: Vec<ArchiveSource>,
    metadata: &M,
    workers: usize,
    options: LoadOptions,
) -> Result<Vec<MergedRow>>
where
    M: FrameMetadataSource + ?Sized,
{
    let total = sources.len();
    let results: Vec<Result<Option<Vec<MergedRow>>>> = stream::iter(sources)
        .map(|source| load(source, metadata, options))
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut combined = Vec::new();
    let mut skipped = 0usize;
    for result in results {
        match result? {
            Some(rows) => combined.extend(rows),
            None => skipped += 1,
        }
    }

    debug!(
        sources = total,
        skipped,
        rows = combined.len(),
        "Loaded archives"
    );
    Ok(combined)
}
