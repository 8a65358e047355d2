use crate::error::HarvestError;
use crate::harvest::paths::HarvestPaths;
use crate::harvest::record::{TEXT_PREFIX_CHARS, TextMatch};
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

const DEFAULT_SOURCE_URLS: &[&str] = &[
    "https://steamcommunity.com/sharedfiles/filedetails/?id=3476068089",
    "https://steamcommunity.com/sharedfiles/filedetails/?id=3438530146",
    "https://steamcommunity.com/sharedfiles/filedetails/?id=3478574794",
    "https://steamcommunity.com/sharedfiles/filedetails/?id=3478642806",
    "https://steamcommunity.com/sharedfiles/filedetails/?id=3553528011",
];

/// Only the first few default pages are harvested unless enabled in config.
const DEFAULT_ENABLED_SOURCES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_in_flight: usize,
    pub max_pages: usize,
    pub page_size: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_in_flight: 4,
            max_pages: 1,
            page_size: 50,
            user_agent: format!("comment-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// IANA zone applied to date text that carries no zone.
    pub source_tz: String,
    pub match_text_prefix: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            source_tz: "UTC".to_string(),
            match_text_prefix: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    /// Relative names resolve against the archives dir.
    pub archive: String,
    /// Relative names resolve against the legacy dir.
    #[serde(default)]
    pub legacy: Option<String>,
    #[serde(default = "default_source_enabled")]
    pub enabled: bool,
}

fn default_source_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    pub fetch: FetchConfig,
    pub archive: ArchiveConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let sources = DEFAULT_SOURCE_URLS
            .iter()
            .enumerate()
            .map(|(i, url)| SourceConfig {
                url: (*url).to_string(),
                archive: format!("comments_{}.json", i + 1),
                legacy: Some(format!("comments_{}.json", i + 1)),
                enabled: i < DEFAULT_ENABLED_SOURCES,
            })
            .collect();
        Self {
            fetch: FetchConfig::default(),
            archive: ArchiveConfig::default(),
            sources,
        }
    }
}

impl HarvestConfig {
    pub fn zone(&self) -> Result<Tz> {
        parse_zone(&self.archive.source_tz)
    }

    pub fn text_match(&self) -> TextMatch {
        if self.archive.match_text_prefix {
            TextMatch::Prefix(TEXT_PREFIX_CHARS)
        } else {
            TextMatch::Exact
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialHarvestConfig {
    fetch: Option<FetchConfig>,
    archive: Option<ArchiveConfig>,
    sources: Option<Vec<SourceConfig>>,
}

fn parse_zone(name: &str) -> Result<Tz> {
    name.trim().parse::<Tz>().map_err(|_| {
        HarvestError::InvalidConfig(format!("unknown source time zone `{name}`")).into()
    })
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

pub fn validate(cfg: &HarvestConfig) -> Result<()> {
    let invalid = |msg: &str| -> anyhow::Error { HarvestError::InvalidConfig(msg.to_string()).into() };

    if cfg.fetch.timeout_secs == 0 {
        return Err(invalid("fetch timeout must be >= 1 second"));
    }
    if cfg.fetch.max_in_flight == 0 {
        return Err(invalid("max in-flight fetches must be >= 1"));
    }
    if cfg.fetch.max_pages == 0 {
        return Err(invalid("max pages must be >= 1"));
    }
    if cfg.fetch.page_size == 0 {
        return Err(invalid("page size must be >= 1"));
    }
    parse_zone(&cfg.archive.source_tz)?;
    for (i, source) in cfg.sources.iter().enumerate() {
        if source.url.trim().is_empty() {
            return Err(invalid(&format!("source #{} has an empty url", i + 1)));
        }
        if source.archive.trim().is_empty() {
            return Err(invalid(&format!("source #{} has no archive file", i + 1)));
        }
    }
    Ok(())
}

fn merge_file_config(base: &mut HarvestConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialHarvestConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse harvest config {}: {err}", path.display()))?;
    if let Some(fetch) = parsed.fetch {
        base.fetch = fetch;
    }
    if let Some(archive) = parsed.archive {
        base.archive = archive;
    }
    if let Some(sources) = parsed.sources {
        base.sources = sources;
    }
    Ok(())
}

pub fn load_config(paths: &HarvestPaths) -> Result<HarvestConfig> {
    let mut cfg = HarvestConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;

    cfg.fetch.timeout_secs = env_or_u64("HARVEST_FETCH_TIMEOUT_SECS", cfg.fetch.timeout_secs);
    cfg.fetch.max_in_flight = env_or_usize("HARVEST_MAX_IN_FLIGHT", cfg.fetch.max_in_flight);
    cfg.fetch.max_pages = env_or_usize("HARVEST_MAX_PAGES", cfg.fetch.max_pages);
    cfg.fetch.page_size = env_or_usize("HARVEST_PAGE_SIZE", cfg.fetch.page_size);
    cfg.fetch.user_agent = env_or_string("HARVEST_USER_AGENT", &cfg.fetch.user_agent);
    cfg.archive.source_tz = env_or_string("HARVEST_SOURCE_TZ", &cfg.archive.source_tz);
    cfg.archive.match_text_prefix =
        env_or_bool("HARVEST_MATCH_TEXT_PREFIX", cfg.archive.match_text_prefix);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid_and_enable_four_sources() {
        let cfg = HarvestConfig::default();
        validate(&cfg).expect("defaults validate");
        assert_eq!(cfg.sources.len(), 5);
        assert_eq!(cfg.sources.iter().filter(|s| s.enabled).count(), 4);
        assert_eq!(cfg.sources[0].archive, "comments_1.json");
        assert_eq!(cfg.zone().expect("zone"), Tz::UTC);
        assert_eq!(cfg.text_match(), TextMatch::Exact);
    }

    #[test]
    fn validate_rejects_zero_limits_and_bad_zone() {
        let mut cfg = HarvestConfig::default();
        cfg.fetch.timeout_secs = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = HarvestConfig::default();
        cfg.fetch.max_in_flight = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = HarvestConfig::default();
        cfg.archive.source_tz = "Mars/Olympus".to_string();
        let err = validate(&cfg).expect_err("bad zone");
        assert!(err.to_string().contains("Mars/Olympus"));

        let mut cfg = HarvestConfig::default();
        cfg.sources[2].archive = "  ".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn file_config_replaces_sections_it_names() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("harvest.toml");
        fs::write(
            &path,
            r#"
[fetch]
max_pages = 3

[archive]
source_tz = "America/Los_Angeles"
match_text_prefix = true

[[sources]]
url = "https://steamcommunity.com/sharedfiles/filedetails/?id=1"
archive = "one.json"
"#,
        )
        .expect("write config");

        let mut cfg = HarvestConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        assert_eq!(cfg.fetch.max_pages, 3);
        assert_eq!(cfg.fetch.max_in_flight, 4);
        assert_eq!(cfg.zone().expect("zone"), chrono_tz::America::Los_Angeles);
        assert_eq!(cfg.text_match(), TextMatch::Prefix(TEXT_PREFIX_CHARS));
        assert_eq!(cfg.sources.len(), 1);
        assert!(cfg.sources[0].enabled);
        assert!(cfg.sources[0].legacy.is_none());
    }

    #[test]
    fn malformed_file_config_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("harvest.toml");
        fs::write(&path, "[fetch\nmax_pages = ").expect("write config");
        let mut cfg = HarvestConfig::default();
        assert!(merge_file_config(&mut cfg, &path).is_err());
    }
}
