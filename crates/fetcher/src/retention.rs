//! Retention sweep
//!
//! Per source, keep everything newer than the cutoff, or the `keep_min`
//! most recent records if fewer than that are newer.

use chrono::{Duration, NaiveDate};
use potd_common::db::{models::Picture, PictureStore};
use potd_common::{metrics, Source};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::PipelineResult;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub days: i64,
    pub keep_min: usize,
}

impl RetentionPolicy {
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days)
    }
}

/// Records to delete, given one source's records ordered newest first
pub fn plan_deletions<'a>(
    newest_first: &'a [Picture],
    cutoff: NaiveDate,
    keep_min: usize,
) -> Vec<&'a Picture> {
    let recent = newest_first.iter().filter(|p| p.date >= cutoff).count();

    if recent < keep_min {
        newest_first.iter().skip(keep_min).collect()
    } else {
        newest_first.iter().filter(|p| p.date < cutoff).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SourceSweep {
    pub source: Source,
    pub total: usize,
    pub deleted: u64,
    /// Date and title of what was (or would be) removed
    pub removed: Vec<(NaiveDate, String)>,
}

impl SourceSweep {
    pub fn kept(&self) -> usize {
        self.total.saturating_sub(self.removed.len())
    }
}

#[instrument(skip(store, policy), fields(days = policy.days, keep_min = policy.keep_min))]
pub async fn sweep(
    store: &dyn PictureStore,
    sources: &[Source],
    policy: RetentionPolicy,
    today: NaiveDate,
    dry_run: bool,
) -> PipelineResult<Vec<SourceSweep>> {
    let cutoff = policy.cutoff(today);
    info!(cutoff = %cutoff, dry_run, "Starting picture cleanup");

    let mut results = Vec::with_capacity(sources.len());
    for &source in sources {
        let records = store.recent_pictures(source, None).await?;
        let doomed = plan_deletions(&records, cutoff, policy.keep_min);

        let removed: Vec<(NaiveDate, String)> =
            doomed.iter().map(|p| (p.date, p.title.clone())).collect();

        let deleted = if dry_run || doomed.is_empty() {
            0
        } else {
            let ids: Vec<Uuid> = doomed.iter().map(|p| p.id).collect();
            let deleted = store.delete_pictures(&ids).await?;
            if deleted != ids.len() as u64 {
                warn!(source = %source, planned = ids.len(), deleted, "Deleted fewer pictures than planned");
            }
            metrics::record_cleanup(source.as_str(), deleted);
            deleted
        };

        info!(
            source = %source,
            total = records.len(),
            planned = removed.len(),
            deleted,
            "Source cleanup finished"
        );

        results.push(SourceSweep {
            source,
            total: records.len(),
            deleted,
            removed,
        });
    }

    Ok(results)
}
