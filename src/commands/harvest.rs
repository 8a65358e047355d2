use anyhow::Result;

use crate::commands::CommandReport;
use crate::harvest::clock::SystemClock;
use crate::harvest::config::load_config;
use crate::harvest::fetch::HttpFetcher;
use crate::harvest::paths::resolve_paths;
use crate::harvest::pipeline::{PipelineContext, SourceOutcome, run_all};
use crate::harvest::source::resolve_sources;

fn describe(index: usize, outcome: &SourceOutcome) -> String {
    let mut line = format!(
        "source[{index}] url={} archive={} fresh={} current={} legacy={} merged={} degraded={} skipped={} stages={} status={}",
        outcome.url,
        outcome.archive_path.display(),
        outcome.fresh,
        outcome.current,
        outcome.legacy,
        outcome.merged,
        outcome.degraded,
        outcome.skipped.len(),
        outcome.trail(),
        outcome.status(),
    );
    if let Some(cause) = &outcome.recovered {
        line.push_str(&format!(" reason={}", cause.label()));
    }
    line
}

pub fn run(url_override: Option<&str>) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let zone = cfg.zone()?;
    let sources = resolve_sources(&cfg.sources, url_override, &paths);

    let mut report = CommandReport::new("harvest");
    report.detail(format!("archives_dir={}", paths.archives_dir.display()));
    report.detail(format!("source_tz={zone}"));
    report.detail(format!("sources={}", sources.len()));
    if sources.is_empty() {
        report.detail("no enabled sources; nothing to harvest");
        return Ok(report);
    }

    let fetcher = HttpFetcher::new(cfg.fetch.timeout_secs, &cfg.fetch.user_agent)?;
    let clock = SystemClock;
    let ctx = PipelineContext {
        fetcher: &fetcher,
        clock: &clock,
        zone,
        text_match: cfg.text_match(),
        max_pages: cfg.fetch.max_pages,
        page_size: cfg.fetch.page_size,
        max_in_flight: cfg.fetch.max_in_flight,
        logs_dir: Some(&paths.logs_dir),
    };

    let results = run_all(&ctx, &sources);
    for (i, (source, result)) in sources.iter().zip(results).enumerate() {
        match result {
            Ok(outcome) => report.detail(describe(i + 1, &outcome)),
            Err(err) => report.issue(format!(
                "source[{}] url={} archive={} failed: {err:#}",
                i + 1,
                source.url,
                source.archive_path.display()
            )),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::pipeline::{RecoveryCause, Stage};
    use std::path::PathBuf;

    #[test]
    fn recovered_outcome_line_names_the_reason() {
        let outcome = SourceOutcome {
            url: "https://example.test/a".to_string(),
            archive_path: PathBuf::from("/data/comments_1.json"),
            fresh: 0,
            current: 3,
            legacy: 1,
            merged: 4,
            degraded: 0,
            skipped: Vec::new(),
            recovered: Some(RecoveryCause::NoThread),
            stages: vec![Stage::Fetching, Stage::Extracting, Stage::Recovered, Stage::Done],
        };
        let line = describe(2, &outcome);
        assert!(line.starts_with("source[2] url=https://example.test/a "));
        assert!(line.contains("fresh=0 current=3 legacy=1 merged=4"));
        assert!(line.contains(" stages=fetching>extracting>recovered>done "));
        assert!(line.ends_with("status=recovered reason=no-thread"));
    }
}
