//! Refresh context: single-flight refresh and snapshot publication.

use arc_swap::ArcSwap;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{Artifact, NotReady, RefreshError};
use crate::acquisition::RecordSource;
use crate::config::SyncConfig;
use crate::export::export;
use crate::geo::normalize_all;
use crate::payload::{has_valid_position, Payload};
use crate::types::{NormalizedRecord, Snapshot, StatusCounts};

/// Holds the current snapshot and runs refreshes against one record source.
///
/// Share it behind an `Arc` with whatever serves the data; nothing in here
/// is global.
pub struct RefreshContext<S> {
    source: S,
    config: Arc<SyncConfig>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    /// Held from the start of a refresh until its snapshot is published
    refresh_gate: Arc<Mutex<()>>,
}

impl<S: RecordSource> RefreshContext<S> {
    pub fn new(source: S, config: Arc<SyncConfig>) -> Self {
        let initial = Snapshot::initial(&config.payload.not_updated_marker);
        Self {
            source,
            config,
            snapshot: Arc::new(ArcSwap::from_pointee(initial)),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Last published snapshot. Never blocks on a running refresh.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Client payload for the last published snapshot.
    pub fn payload(&self) -> Payload {
        Payload::from_snapshot(&self.snapshot.load(), &self.config.payload)
    }

    /// Spreadsheet produced by the last successful refresh.
    pub fn excel_path(&self) -> Result<PathBuf, NotReady> {
        Self::ready(self.snapshot.load().excel_path.clone(), Artifact::Excel)
    }

    /// Overlay produced by the last successful refresh.
    pub fn kml_path(&self) -> Result<PathBuf, NotReady> {
        Self::ready(self.snapshot.load().kml_path.clone(), Artifact::Kml)
    }

    fn ready(path: Option<PathBuf>, artifact: Artifact) -> Result<PathBuf, NotReady> {
        path.filter(|p| p.is_file()).ok_or(NotReady { artifact })
    }

    /// Run the full pipeline and publish the result.
    ///
    /// If another refresh is already running, waits for it and returns its
    /// snapshot rather than starting a second cycle.
    ///
    /// Once the fetch has returned, export and publication run on the
    /// blocking pool and finish even if this future is dropped, so the files
    /// on disk always belong to the published snapshot.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let observed = self.snapshot.load().generation;
        let gate = Arc::clone(&self.refresh_gate).lock_owned().await;

        let current = self.snapshot.load_full();
        if current.generation > observed {
            debug!(generation = current.generation, "Joined concurrent refresh");
            return Ok(current);
        }

        let started = Instant::now();
        let normalized = self.collect().await;

        let cycle = PublishCycle {
            generation: current.generation + 1,
            config: Arc::clone(&self.config),
            published: Arc::clone(&self.snapshot),
            started,
        };
        tokio::task::spawn_blocking(move || {
            let _gate = gate;
            cycle.run(normalized)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Export task aborted");
            RefreshError::Join(e.to_string())
        })?
    }

    /// Fetch and normalize. Never fails; upstream trouble is an empty batch.
    async fn collect(&self) -> Vec<NormalizedRecord> {
        let outcome = self.source.fetch().await;
        if let Some(failure) = &outcome.failure {
            warn!(source = self.source.source_name(), error = %failure, "Fetch degraded to empty dataset");
        }
        normalize_all(outcome.records)
    }
}

/// Export and publication for one generation. Runs on the blocking pool.
struct PublishCycle {
    generation: u64,
    config: Arc<SyncConfig>,
    published: Arc<ArcSwap<Snapshot>>,
    started: Instant,
}

impl PublishCycle {
    fn run(self, normalized: Vec<NormalizedRecord>) -> Result<Arc<Snapshot>, RefreshError> {
        let status_counts = StatusCounts::from_records(&normalized);

        let artifacts = match export(&normalized, &self.config.export) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!(
                    error = %e,
                    generation = self.generation - 1,
                    "Refresh failed, keeping previous snapshot"
                );
                return Err(e.into());
            }
        };

        let records: Vec<_> = normalized.into_iter().filter(has_valid_position).collect();
        let updated = Local::now().format(&self.config.payload.timestamp_format).to_string();

        let snapshot = Arc::new(Snapshot {
            generation: self.generation,
            updated,
            count: records.len(),
            records,
            excel_path: Some(artifacts.excel_path),
            kml_path: Some(artifacts.kml_path),
            status_counts,
            placemarks: artifacts.placemarks,
        });
        self.published.store(Arc::clone(&snapshot));

        info!(
            generation = snapshot.generation,
            count = snapshot.count,
            placemarks = snapshot.placemarks,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Published snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{FetchOutcome, StaticSource};
    use crate::types::RawRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn config_in(dir: &std::path::Path) -> Arc<SyncConfig> {
        let mut config = SyncConfig::default();
        config.export.out_dir = dir.to_path_buf();
        Arc::new(config)
    }

    /// Counts fetches and sleeps so overlapping refreshes actually overlap.
    struct SlowSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl RecordSource for SlowSource {
        async fn fetch(&self) -> FetchOutcome {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            FetchOutcome::ok(vec![RawRecord::with_position("a", json!(121.5), json!(25.0))])
        }

        fn source_name(&self) -> &str {
            "slow"
        }
    }

    /// Signals once its fetch has returned.
    struct SignalSource {
        fetched: Arc<Notify>,
    }

    #[async_trait]
    impl RecordSource for SignalSource {
        async fn fetch(&self) -> FetchOutcome {
            let records = vec![
                RawRecord::with_position("a", json!(121.5), json!(25.0)),
                RawRecord::with_position("b", json!(302000), json!(2770000)),
            ];
            self.fetched.notify_one();
            FetchOutcome::ok(records)
        }

        fn source_name(&self) -> &str {
            "signal"
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RefreshContext::new(StaticSource::default(), config_in(dir.path()));

        let snapshot = ctx.current_snapshot();
        assert_eq!(snapshot.generation, 0);
        assert_eq!(snapshot.updated, "尚未更新");
        assert_eq!(ctx.payload().count, 0);
        assert_eq!(ctx.excel_path(), Err(NotReady { artifact: Artifact::Excel }));
        assert_eq!(ctx.kml_path(), Err(NotReady { artifact: Artifact::Kml }));
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource::new(vec![
            RawRecord::with_position("a", json!(121.5), json!(25.0)),
            RawRecord::with_position("b", json!(0), json!(0)),
        ]);
        let ctx = RefreshContext::new(source, config_in(dir.path()));

        let snapshot = ctx.refresh().await.unwrap();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.status_counts.total(), 2);
        assert_eq!(snapshot.placemarks, 1);
        assert!(Arc::ptr_eq(&snapshot, &ctx.current_snapshot()));
        assert!(ctx.excel_path().unwrap().is_file());
        assert!(ctx.kml_path().unwrap().is_file());

        let second = ctx.refresh().await.unwrap();
        assert_eq!(second.generation, 2);
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_share_one_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(RefreshContext::new(
            SlowSource {
                fetches: AtomicUsize::new(0),
            },
            config_in(dir.path()),
        ));

        let (a, b) = tokio::join!(ctx.refresh(), ctx.refresh());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(ctx.source().fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.generation, 1);
    }

    #[tokio::test]
    async fn test_failed_export_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RefreshContext::new(
            StaticSource::new(vec![RawRecord::with_position("a", json!(121.5), json!(25.0))]),
            config_in(dir.path()),
        );
        let first = ctx.refresh().await.unwrap();

        // Block the spreadsheet path with a directory so the rename fails
        let excel = first.excel_path.clone().unwrap();
        std::fs::remove_file(&excel).unwrap();
        std::fs::create_dir(&excel).unwrap();
        std::fs::write(excel.join("keep"), b"x").unwrap();

        let err = ctx.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Export(_)));
        assert!(Arc::ptr_eq(&first, &ctx.current_snapshot()));
        assert_eq!(ctx.excel_path(), Err(NotReady { artifact: Artifact::Excel }));
        assert!(ctx.kml_path().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_refresh_still_publishes_its_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let fetched = Arc::new(Notify::new());
        let ctx = Arc::new(RefreshContext::new(
            SignalSource {
                fetched: Arc::clone(&fetched),
            },
            config_in(dir.path()),
        ));

        let task = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { ctx.refresh().await }
        });

        // The fetch has returned, so the export is already on the blocking pool
        fetched.notified().await;
        task.abort();
        let _ = task.await;

        // The gate is released once the cycle has published
        let _gate = ctx.refresh_gate.lock().await;
        let snapshot = ctx.current_snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.count, 2);

        let kml = std::fs::read_to_string(ctx.kml_path().unwrap()).unwrap();
        assert_eq!(kml.matches("<Placemark>").count(), snapshot.placemarks);
        assert!(ctx.excel_path().is_ok());
    }
}
