//! SQLite tracking database adapter
//!
//! Stores per-frame detections and answers the three tracking contracts:
//! frame enumeration, per-frame pair scoring and frame metadata lookup.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::model::{PairScorer, Pose};
use crate::tracking::{
    FrameIndex, FrameMetadataSource, InteractionRow, InteractionSource, PoseFeature,
};
use crate::types::{FrameMetadata, FrameTask};
use crate::{Error, Result};

/// Bound parameters per metadata lookup statement
const METADATA_CHUNK: usize = 500;

/// Tracking database backed by a SQLite connection pool
#[derive(Clone)]
pub struct TrackingDb {
    pool: SqlitePool,
}

impl TrackingDb {
    /// Open (or create) the tracking database at `db_path`
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_millis(5000));
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        if newly_created {
            info!("Initialized new tracking database: {}", db_path.display());
        } else {
            info!("Opened tracking database: {}", db_path.display());
        }

        let db = Self { pool };
        db.create_schema().await?;
        Ok(db)
    }

    /// Open an existing tracking database read-only.
    ///
    /// Unlike [`connect`](Self::connect) this never creates the file or the
    /// schema, so a wrong path fails here instead of reading as an empty
    /// database.
    pub async fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.is_file() {
            return Err(Error::InvalidInput(format!(
                "Tracking database not found: {}",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(false)
            .read_only(true)
            .busy_timeout(std::time::Duration::from_millis(5000));
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        info!("Opened tracking database read-only: {}", db_path.display());
        Ok(Self { pool })
    }

    /// Single-connection in-memory database with schema, for tests and fixtures
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.create_schema().await?;
        Ok(db)
    }

    /// Create tables and indexes if missing (idempotent)
    pub async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS frames (
                frame_id INTEGER PRIMARY KEY,
                cam_id INTEGER NOT NULL,
                timestamp REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS detections (
                frame_id INTEGER NOT NULL REFERENCES frames(frame_id),
                bee_id INTEGER NOT NULL,
                x_pos_hive REAL NOT NULL,
                y_pos_hive REAL NOT NULL,
                orientation_hive REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_frames_cam_time ON frames(cam_id, timestamp)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_detections_frame ON detections(frame_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record a captured frame
    pub async fn insert_frame(&self, frame: &FrameTask) -> Result<()> {
        sqlx::query("INSERT INTO frames (frame_id, cam_id, timestamp) VALUES (?, ?, ?)")
            .bind(to_sql_id(frame.frame_id)?)
            .bind(frame.cam_id as i64)
            .bind(frame.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record one detection of `bee_id` in `frame_id`
    pub async fn insert_detection(&self, frame_id: u64, bee_id: u64, pose: &Pose) -> Result<()> {
        sqlx::query(
            "INSERT INTO detections (frame_id, bee_id, x_pos_hive, y_pos_hive, orientation_hive)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(to_sql_id(frame_id)?)
        .bind(to_sql_id(bee_id)?)
        .bind(pose.x)
        .bind(pose.y)
        .bind(pose.orientation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_detections(
        &self,
        frame_id: u64,
        features: &[PoseFeature],
    ) -> Result<Vec<(u64, Pose)>> {
        let columns: Vec<&str> = features.iter().map(PoseFeature::column).collect();
        let mut sql = String::from("SELECT bee_id");
        for column in &columns {
            sql.push_str(", ");
            sql.push_str(column);
        }
        sql.push_str(" FROM detections WHERE frame_id = ? ORDER BY bee_id");

        let rows = sqlx::query(&sql)
            .bind(to_sql_id(frame_id)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(u64, Pose)> {
                let bee_id = from_sql_id(row.try_get::<i64, _>(0)?)?;
                let mut pose = Pose::new(0.0, 0.0, 0.0);
                for (idx, feature) in features.iter().enumerate() {
                    let value: f64 = row.try_get(idx + 1)?;
                    match feature {
                        PoseFeature::XPosHive => pose.x = value,
                        PoseFeature::YPosHive => pose.y = value,
                        PoseFeature::OrientationHive => pose.orientation = value,
                    }
                }
                Ok((bee_id, pose))
            })
            .collect()
    }
}

fn to_sql_id(id: u64) -> Result<i64> {
    i64::try_from(id)
        .map_err(|_| Error::InvalidInput(format!("id {} exceeds SQLite INTEGER", id)))
}

fn from_sql_id(id: i64) -> Result<u64> {
    u64::try_from(id)
        .map_err(|_| Error::InvalidInput(format!("negative id {} in tracking database", id)))
}

/// Score every unordered pair once, keeping scores within `[min, max]`
fn score_pairs(
    frame_id: u64,
    detections: &[(u64, Pose)],
    scorer: &dyn PairScorer,
    min_distance: f64,
    max_distance: f64,
) -> Vec<InteractionRow> {
    let mut rows = Vec::new();
    for (i, (bee_id0, pose0)) in detections.iter().enumerate() {
        for (bee_id1, pose1) in &detections[i + 1..] {
            let score = scorer.score(pose0, pose1);
            if score >= min_distance && score <= max_distance {
                rows.push(InteractionRow {
                    frame_id,
                    bee_id0: *bee_id0,
                    bee_id1: *bee_id1,
                    pose0: *pose0,
                    pose1: *pose1,
                    score,
                });
            }
        }
    }
    rows
}

#[async_trait]
impl InteractionSource for TrackingDb {
    async fn find_interactions(
        &self,
        frame_id: u64,
        max_distance: f64,
        min_distance: f64,
        scorer: Arc<dyn PairScorer>,
        features: &[PoseFeature],
    ) -> Result<Vec<InteractionRow>> {
        let detections = self.load_detections(frame_id, features).await?;
        debug!(frame_id, detections = detections.len(), "Scoring frame");

        // Pair scoring is quadratic in detections; keep it off the async workers
        let rows = tokio::task::spawn_blocking(move || {
            score_pairs(frame_id, &detections, scorer.as_ref(), min_distance, max_distance)
        })
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl FrameIndex for TrackingDb {
    async fn frames_in_window(
        &self,
        cam_id: u16,
        from_ts: f64,
        to_ts: f64,
    ) -> Result<Vec<FrameTask>> {
        let rows = sqlx::query(
            "SELECT timestamp, frame_id, cam_id FROM frames
             WHERE cam_id = ? AND timestamp >= ? AND timestamp < ?
             ORDER BY timestamp, frame_id",
        )
        .bind(cam_id as i64)
        .bind(from_ts)
        .bind(to_ts)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<FrameTask> {
                let cam: i64 = row.try_get("cam_id")?;
                let cam_id = u16::try_from(cam)
                    .map_err(|_| Error::InvalidInput(format!("cam_id {} out of range", cam)))?;
                Ok(FrameTask {
                    timestamp: row.try_get("timestamp")?,
                    frame_id: from_sql_id(row.try_get("frame_id")?)?,
                    cam_id,
                })
            })
            .collect()
    }
}

#[async_trait]
impl FrameMetadataSource for TrackingDb {
    async fn metadata_for(&self, frame_ids: &BTreeSet<u64>) -> Result<Vec<FrameMetadata>> {
        let ids = frame_ids
            .iter()
            .map(|id| to_sql_id(*id))
            .collect::<Result<Vec<i64>>>()?;

        let mut metadata = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(METADATA_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT frame_id, timestamp FROM frames WHERE frame_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in &rows {
                metadata.push(FrameMetadata {
                    frame_id: from_sql_id(row.try_get("frame_id")?)?,
                    timestamp: row.try_get("timestamp")?,
                });
            }
        }
        Ok(metadata)
    }
}
