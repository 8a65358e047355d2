use anyhow::Result;

use crate::commands::CommandReport;
use crate::harvest::config::load_config;
use crate::harvest::paths::resolve_paths;
use crate::harvest::source::resolve_sources;
use crate::harvest::store::{self, StoreShape};

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("harvest_home={}", paths.harvest_home.display()));
    report.detail(format!("archives_dir={}", paths.archives_dir.display()));
    report.detail(format!("legacy_dir={}", paths.legacy_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "config_file={} present={}",
        paths.config_file.display(),
        paths.config_file.is_file()
    ));

    if paths.archives_dir.exists() && !paths.archives_dir.is_dir() {
        report.issue(format!(
            "archives path is not a directory: {}",
            paths.archives_dir.display()
        ));
    }

    let cfg = load_config(&paths)?;
    let zone = cfg.zone()?;
    report.detail(format!("source_tz={zone}"));
    report.detail(format!("match_text_prefix={}", cfg.archive.match_text_prefix));
    report.detail(format!(
        "fetch timeout_secs={} max_in_flight={} max_pages={} page_size={}",
        cfg.fetch.timeout_secs, cfg.fetch.max_in_flight, cfg.fetch.max_pages, cfg.fetch.page_size
    ));

    for (i, source) in resolve_sources(&cfg.sources, None, &paths).iter().enumerate() {
        let current = store::load(&source.archive_path, zone);
        let mut line = format!(
            "source[{}] url={} archive={} shape={} records={} dropped={}",
            i + 1,
            source.url,
            source.archive_path.display(),
            current.shape.label(),
            current.records.len(),
            current.dropped
        );
        if let Some(legacy_path) = &source.legacy_path {
            let legacy = store::load(legacy_path, zone);
            line.push_str(&format!(
                " legacy_shape={} legacy_records={} legacy_dropped={}",
                legacy.shape.label(),
                legacy.records.len(),
                legacy.dropped
            ));
        }
        report.detail(line);
        if current.shape == StoreShape::Unreadable {
            report.issue(format!(
                "archive unreadable; next harvest will rewrite it: {}",
                source.archive_path.display()
            ));
        }
    }

    Ok(report)
}
