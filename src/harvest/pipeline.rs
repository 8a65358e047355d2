use crate::harvest::audit::{self, AuditEvent};
use crate::harvest::clock::Clock;
use crate::harvest::extract::{Extractor, Harvested, SkipReason};
use crate::harvest::fetch::Fetcher;
use crate::harvest::paging::{self, PageRequest};
use crate::harvest::record::{CommentRecord, TextMatch};
use crate::harvest::reconcile::{reconcile, reconcile_stored, settle_degraded};
use crate::harvest::source::Source;
use crate::harvest::store;
use crate::harvest::timestamp::TimestampNormalizer;
use crate::harvest::warn::{self, WarnEvent};
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use scraper::Html;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Extracting,
    Reconciling,
    Persisting,
    Recovered,
    Done,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Reconciling => "reconciling",
            Stage::Persisting => "persisting",
            Stage::Recovered => "recovered",
            Stage::Done => "done",
        }
    }
}

/// Why a source fell back to its stored archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryCause {
    FetchFailed(String),
    NoThread,
    NoComments,
}

impl RecoveryCause {
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryCause::FetchFailed(_) => "fetch-failed",
            RecoveryCause::NoThread => "no-thread",
            RecoveryCause::NoComments => "no-comments",
        }
    }

    fn warn_code(&self) -> &'static str {
        match self {
            RecoveryCause::FetchFailed(_) => "FETCH_FAILED",
            RecoveryCause::NoThread => "NO_THREAD",
            RecoveryCause::NoComments => "NO_COMMENTS",
        }
    }

    fn detail(&self) -> &str {
        match self {
            RecoveryCause::FetchFailed(err) => err,
            RecoveryCause::NoThread => "thread container absent",
            RecoveryCause::NoComments => "thread container holds no comments",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub url: String,
    pub archive_path: PathBuf,
    pub fresh: usize,
    pub current: usize,
    pub legacy: usize,
    pub merged: usize,
    pub degraded: usize,
    pub skipped: Vec<SkipReason>,
    pub recovered: Option<RecoveryCause>,
    pub stages: Vec<Stage>,
}

impl SourceOutcome {
    pub fn status(&self) -> &'static str {
        if self.recovered.is_some() {
            "recovered"
        } else {
            "persisted"
        }
    }

    /// Stages walked, e.g. `fetching>recovered>done`.
    pub fn trail(&self) -> String {
        self.stages
            .iter()
            .map(|stage| stage.label())
            .collect::<Vec<_>>()
            .join(">")
    }
}

pub struct PipelineContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub clock: &'a dyn Clock,
    pub zone: Tz,
    pub text_match: TextMatch,
    pub max_pages: usize,
    pub page_size: usize,
    pub max_in_flight: usize,
    /// Audit events are skipped when unset.
    pub logs_dir: Option<&'a Path>,
}

fn extract_fresh(
    ctx: &PipelineContext<'_>,
    source: &Source,
    body: &str,
) -> Result<Harvested, RecoveryCause> {
    let extractor = Extractor::new(TimestampNormalizer::new(ctx.zone, ctx.clock));
    let document = Html::parse_document(body);
    let Some(scan) = extractor.scan(&document) else {
        return Err(RecoveryCause::NoThread);
    };
    let mut harvested = scan.harvest();

    if ctx.max_pages > 1 {
        if let Some(endpoint) = paging::render_endpoint(body) {
            let more = paging::collect_pages(
                ctx.fetcher,
                &extractor,
                &PageRequest {
                    source_url: &source.url,
                    endpoint: &endpoint,
                    start: harvested.records.len() + harvested.skipped.len(),
                    page_size: ctx.page_size,
                    max_extra_pages: ctx.max_pages - 1,
                },
            );
            harvested.absorb(more);
        }
    }

    for reason in &harvested.skipped {
        warn::emit(WarnEvent {
            code: "COMMENT_SKIPPED",
            stage: "extracting",
            source: &source.url,
            reason: "structural-anomaly",
            err: &reason.to_string(),
        });
    }
    let degraded = harvested.degraded();
    if degraded > 0 {
        warn::emit(WarnEvent {
            code: "TIMESTAMP_DEGRADED",
            stage: "extracting",
            source: &source.url,
            reason: "unparseable-date-replaced-by-clock",
            err: &format!("{degraded} records"),
        });
    }

    if harvested.records.is_empty() {
        return Err(RecoveryCause::NoComments);
    }
    Ok(harvested)
}

fn record_audit(ctx: &PipelineContext<'_>, outcome: &SourceOutcome) {
    let Some(logs_dir) = ctx.logs_dir else {
        return;
    };
    let event = AuditEvent {
        at_epoch_secs: ctx.clock.now().timestamp(),
        phase: "harvest".to_string(),
        status: outcome.status().to_string(),
        message: format!(
            "url={} fresh={} current={} legacy={} merged={} stages={} reason={}",
            outcome.url,
            outcome.fresh,
            outcome.current,
            outcome.legacy,
            outcome.merged,
            outcome.trail(),
            outcome.recovered.as_ref().map_or("none", RecoveryCause::label),
        ),
    };
    if let Err(err) = audit::append_event(logs_dir, &event) {
        warn::emit(WarnEvent {
            code: "AUDIT_WRITE_FAILED",
            stage: "done",
            source: &outcome.url,
            reason: "audit-append-failed",
            err: &format!("{err:#}"),
        });
    }
}

/// Fetch, extract, reconcile and persist one source.
///
/// Fetch and extraction problems never surface as errors: the source falls
/// back to re-persisting its stored records. Only failing to lock or write
/// the archive is returned as an error.
pub fn run_source(ctx: &PipelineContext<'_>, source: &Source) -> Result<SourceOutcome> {
    let mut stages = vec![Stage::Fetching];
    let fresh = match ctx.fetcher.fetch(&source.url) {
        Ok(body) => {
            stages.push(Stage::Extracting);
            extract_fresh(ctx, source, &body)
        }
        Err(err) => Err(RecoveryCause::FetchFailed(err.to_string())),
    };

    let _lock = store::lock(&source.archive_path)?;
    let current = store::load(&source.archive_path, ctx.zone);
    let legacy = source
        .legacy_path
        .as_deref()
        .map(|path| store::load(path, ctx.zone));
    let legacy_records: &[CommentRecord] = legacy
        .as_ref()
        .map(|loaded| loaded.records.as_slice())
        .unwrap_or_default();

    let (merged, harvested, recovered) = match fresh {
        Ok(mut harvested) => {
            stages.push(Stage::Reconciling);
            settle_degraded(
                &mut harvested.records,
                &[current.records.as_slice(), legacy_records],
                ctx.text_match,
            );
            let merged = reconcile(
                &harvested.records,
                &current.records,
                legacy_records,
                ctx.text_match,
            );
            stages.push(Stage::Persisting);
            (merged, harvested, None)
        }
        Err(cause) => {
            warn::emit(WarnEvent {
                code: cause.warn_code(),
                stage: "recovering",
                source: &source.url,
                reason: cause.label(),
                err: cause.detail(),
            });
            stages.push(Stage::Recovered);
            let merged = reconcile_stored(&current.records, legacy_records, ctx.text_match);
            (merged, Harvested::default(), Some(cause))
        }
    };

    store::save(&source.archive_path, &merged)?;
    stages.push(Stage::Done);

    let outcome = SourceOutcome {
        url: source.url.clone(),
        archive_path: source.archive_path.clone(),
        fresh: harvested.records.len(),
        current: current.records.len(),
        legacy: legacy_records.len(),
        merged: merged.len(),
        degraded: harvested.degraded(),
        skipped: harvested.skipped,
        recovered,
        stages,
    };
    record_audit(ctx, &outcome);
    Ok(outcome)
}

/// Run every source on a bounded pool of workers. Results come back in
/// source order; one source failing does not stop the others.
pub fn run_all(ctx: &PipelineContext<'_>, sources: &[Source]) -> Vec<Result<SourceOutcome>> {
    if sources.is_empty() {
        return Vec::new();
    }
    let workers = ctx.max_in_flight.clamp(1, sources.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<SourceOutcome>)>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                loop {
                    let idx = next.fetch_add(1, Ordering::Relaxed);
                    let Some(source) = sources.get(idx) else {
                        break;
                    };
                    if tx.send((idx, run_source(ctx, source))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx); // workers are done; close the channel

    let mut slots: Vec<Option<Result<SourceOutcome>>> = (0..sources.len()).map(|_| None).collect();
    for (idx, result) in rx {
        slots[idx] = Some(result);
    }
    slots
        .into_iter()
        .zip(sources)
        .map(|(slot, source)| {
            slot.unwrap_or_else(|| Err(anyhow!("no result recorded for {}", source.url)))
        })
        .collect()
}
